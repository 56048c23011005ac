//! Per-track media transcoding.
//!
//! [`Transcode`] sits in front of a [`MediaSink`]. Tracks already in the target
//! codec pass through untouched; every other track is decoded, converted to a
//! pixel format the encoder takes, and re-encoded. The codec work itself is
//! done by a [`CodecEngine`]; `ffmpeg-bus` provides one backed by FFmpeg.

pub mod codec;
pub mod config;
pub mod converter;
pub mod decoder;
pub mod encoder;
pub mod engine;
pub mod error;
pub mod frame;
pub mod pool;
pub mod raw;
pub mod sink;
pub mod task;
pub mod transcode;

#[cfg(test)]
pub(crate) mod mock;

pub use codec::{CodecId, PixelFormat, SampleFormat, TrackType};
pub use config::TranscodeConfig;
pub use converter::FormatConverter;
pub use decoder::Decoder;
pub use encoder::{Encoder, EncoderSettings};
pub use engine::{
    CodecEngine, ConvertContext, DecodeContext, EncodeContext, EncodedPacket, EngineFrame, Lookup,
    PacketView,
};
pub use error::{Error, Result};
pub use frame::{Frame, Track};
pub use pool::{FramePool, Pooled, Recycle};
pub use raw::RawFrame;
pub use sink::{LogSink, MediaSink};
pub use task::TranscodeTask;
pub use transcode::Transcode;
