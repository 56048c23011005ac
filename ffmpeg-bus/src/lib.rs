//! FFmpeg backed [`lite_transcode::CodecEngine`], plus a demuxer that feeds
//! container streams into a [`lite_transcode::Transcode`].

/// Registers FFmpeg components (format, device, etc.). Call once at startup
/// before using device inputs like x11grab or v4l2.
pub fn init() -> anyhow::Result<()> {
    ffmpeg_next::init().map_err(|e| anyhow::anyhow!("ffmpeg_next init: {}", e))
}

pub mod bsf;
pub mod decoder;
pub mod encoder;
pub mod fifo;
pub mod engine;
pub mod format;
pub mod frame;
pub mod hw;
pub mod input;
pub mod scaler;
pub mod stream;
pub mod util;

pub use engine::{FfmpegCodec, FfmpegEngine};
pub use input::AvInput;
