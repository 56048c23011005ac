use ffmpeg_next::{Rational, Rescale, format::Sample, frame::Audio};

use crate::util::channel_layout;

/// Sample queue in front of encoders that only take frames of a fixed size
/// (AAC, Opus). Samples are kept in the encoder's own format, one byte queue
/// per plane.
pub struct AudioFifo {
    format: Sample,
    rate: u32,
    channels: u32,
    time_base: Rational,
    planes: Vec<Vec<u8>>,
    /// Bytes of one sample within one plane.
    stride: usize,
    /// Timestamp of the first queued sample, in `time_base`.
    next_pts: Option<i64>,
}

impl AudioFifo {
    pub fn new(format: Sample, rate: u32, channels: u32, time_base: Rational) -> Self {
        let channels = channels.max(1);
        let (planes, stride) = if format.is_planar() {
            (channels as usize, format.bytes())
        } else {
            (1, format.bytes() * channels as usize)
        };
        Self {
            format,
            rate,
            channels,
            time_base,
            planes: vec![Vec::new(); planes],
            stride,
            next_pts: None,
        }
    }

    /// Samples queued per channel.
    pub fn len(&self) -> usize {
        self.planes[0].len() / self.stride
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Queues the samples of `frame`, which must already be in the FIFO's
    /// layout. `pts` is in the FIFO's time base.
    pub fn push(&mut self, frame: &Audio, pts: Option<i64>) -> anyhow::Result<()> {
        let channels = unsafe { (*frame.as_ptr()).ch_layout.nb_channels.max(1) as u32 };
        if frame.format() != self.format || channels != self.channels {
            anyhow::bail!(
                "fifo holds {:?} x {} ch, got {:?} x {} ch",
                self.format,
                self.channels,
                frame.format(),
                channels
            );
        }
        let samples = frame.samples();
        if samples == 0 {
            return Ok(());
        }
        if self.is_empty() {
            self.next_pts = pts;
        }
        let bytes = samples * self.stride;
        for (index, plane) in self.planes.iter_mut().enumerate() {
            let data = frame.data(index);
            if data.len() < bytes {
                anyhow::bail!("plane {} holds {} bytes, expected {}", index, data.len(), bytes);
            }
            plane.extend_from_slice(&data[..bytes]);
        }
        Ok(())
    }

    /// Takes `samples` samples off the front. Missing samples at the end of
    /// the stream are filled with zeros.
    pub fn pop(&mut self, samples: usize) -> Audio {
        let available = self.len().min(samples);
        let mut frame = Audio::new(self.format, samples, channel_layout(self.channels));
        frame.set_rate(self.rate);
        frame.set_pts(self.next_pts);

        let taken = available * self.stride;
        let size = samples * self.stride;
        for (index, plane) in self.planes.iter_mut().enumerate() {
            let dst = frame.data_mut(index);
            dst[..taken].copy_from_slice(&plane[..taken]);
            dst[taken..size].fill(0);
            plane.drain(..taken);
        }

        let duration = (samples as i64).rescale(Rational(1, self.rate as i32), self.time_base);
        self.next_pts = self.next_pts.map(|pts| pts + duration);
        frame
    }
}
