use std::sync::{Arc, Mutex};

use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::{codec::TrackType, engine::CodecEngine, frame::Frame, transcode::Transcode};

/// Runs a [`Transcode`] behind one bounded queue per track type.
///
/// Each track type gets its own worker that feeds frames to the pipeline on
/// the blocking pool one at a time, so audio and video progress independently
/// while frames of one type stay in order.
pub struct TranscodeTask<E: CodecEngine> {
    transcode: Arc<Transcode<E>>,
    cancel: CancellationToken,
    audio_tx: mpsc::Sender<Frame>,
    video_tx: mpsc::Sender<Frame>,
    pending: Mutex<Vec<(TrackType, mpsc::Receiver<Frame>)>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl<E: CodecEngine> TranscodeTask<E> {
    pub fn new(transcode: Arc<Transcode<E>>, capacity: usize) -> Self {
        let (audio_tx, audio_rx) = mpsc::channel(capacity.max(1));
        let (video_tx, video_rx) = mpsc::channel(capacity.max(1));
        Self {
            transcode,
            cancel: CancellationToken::new(),
            audio_tx,
            video_tx,
            pending: Mutex::new(vec![
                (TrackType::Audio, audio_rx),
                (TrackType::Video, video_rx),
            ]),
            handles: Mutex::new(Vec::new()),
        }
    }

    pub fn transcode(&self) -> &Arc<Transcode<E>> {
        &self.transcode
    }

    /// Spawns the workers on the current tokio runtime. Calling it again does
    /// nothing.
    pub fn start(&self) {
        let pending = std::mem::take(&mut *self.pending.lock().unwrap());
        let mut handles = self.handles.lock().unwrap();
        for (track_type, rx) in pending {
            let handle = tokio::spawn(Self::worker(
                track_type,
                self.transcode.clone(),
                self.cancel.clone(),
                rx,
            ));
            handles.push(handle);
        }
    }

    /// Queues a frame for its track type, waiting while the queue is full.
    pub async fn input_frame(&self, frame: Frame) -> anyhow::Result<()> {
        let tx = match frame.track_type() {
            TrackType::Audio => &self.audio_tx,
            TrackType::Video => &self.video_tx,
        };
        if self.cancel.is_cancelled() {
            anyhow::bail!("transcode task stopped");
        }
        tx.send(frame)
            .await
            .map_err(|e| anyhow::anyhow!("{} queue closed, frame {} dropped", e.0.track_type(), e.0))
    }

    /// Stops the workers. Queued frames are discarded.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Waits until every worker has exited.
    pub async fn wait(&self) {
        let handles = std::mem::take(&mut *self.handles.lock().unwrap());
        for handle in handles {
            if let Err(e) = handle.await {
                log::warn!("transcode worker join error: {}", e);
            }
        }
    }

    async fn worker(
        track_type: TrackType,
        transcode: Arc<Transcode<E>>,
        cancel: CancellationToken,
        mut rx: mpsc::Receiver<Frame>,
    ) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    break;
                }
                frame = rx.recv() => {
                    let Some(frame) = frame else {
                        break;
                    };
                    let transcode = transcode.clone();
                    match tokio::task::spawn_blocking(move || transcode.input_frame(&frame)).await {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => log::warn!("{} transcode error: {}", track_type, e),
                        Err(e) => {
                            log::error!("{} transcode worker panicked: {}", track_type, e);
                            break;
                        }
                    }
                }
            }
        }
        log::debug!("{} transcode worker exit", track_type);
    }
}

impl<E: CodecEngine> Drop for TranscodeTask<E> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
