//! Reusable frame storage.
//!
//! A [`FramePool`] keeps up to `capacity` idle values around so the decode and
//! convert paths do not allocate a new engine frame for every packet. Values
//! are handed out as [`Pooled`] and go back to the pool when dropped.

use std::{
    mem::ManuallyDrop,
    ops::{Deref, DerefMut},
    sync::{
        Arc, Mutex, Weak,
        atomic::{AtomicUsize, Ordering},
    },
};

/// Resets a value before it is handed out again.
pub trait Recycle {
    fn recycle(&mut self);
}

struct Shared<T> {
    capacity: AtomicUsize,
    ready: Mutex<Vec<T>>,
}

pub struct FramePool<T: Recycle + Default> {
    shared: Arc<Shared<T>>,
}

impl<T: Recycle + Default> FramePool<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                capacity: AtomicUsize::new(capacity),
                ready: Mutex::new(Vec::with_capacity(capacity)),
            }),
        }
    }

    pub fn configure(&self, capacity: usize) {
        self.shared.capacity.store(capacity, Ordering::Relaxed);
        let mut ready = self.shared.ready.lock().unwrap();
        ready.truncate(capacity);
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity.load(Ordering::Relaxed)
    }

    /// Idle values waiting to be reused.
    pub fn available(&self) -> usize {
        self.shared.ready.lock().unwrap().len()
    }

    /// Never blocks: falls back to a fresh allocation when nothing is idle.
    pub fn obtain(&self) -> Pooled<T> {
        let reused = self.shared.ready.lock().unwrap().pop();
        let value = match reused {
            Some(mut value) => {
                value.recycle();
                value
            }
            None => T::default(),
        };
        Pooled {
            value: ManuallyDrop::new(value),
            pool: Arc::downgrade(&self.shared),
        }
    }
}

pub struct Pooled<T> {
    value: ManuallyDrop<T>,
    pool: Weak<Shared<T>>,
}

impl<T> Deref for Pooled<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> DerefMut for Pooled<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

impl<T> Drop for Pooled<T> {
    fn drop(&mut self) {
        // SAFETY: `value` is never touched again after this point.
        let value = unsafe { ManuallyDrop::take(&mut self.value) };
        if let Some(shared) = self.pool.upgrade() {
            let capacity = shared.capacity.load(Ordering::Relaxed);
            let mut ready = shared.ready.lock().unwrap();
            if ready.len() < capacity {
                ready.push(value);
            }
        }
    }
}
