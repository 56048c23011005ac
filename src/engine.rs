//! The codec engine seam.
//!
//! The pipeline never touches bitstreams or pixels itself. It drives an engine
//! through these traits: look an implementation up, open a context, and push
//! packets or frames through it. `ffmpeg-bus` provides the production engine.

use std::fmt::Display;

use bytes::Bytes;

use crate::{
    codec::{CodecId, PixelFormat, SampleFormat},
    encoder::EncoderSettings,
    frame::Track,
    pool::Recycle,
};

/// How an implementation is looked up: by its registered name, or the engine's
/// generic implementation for a codec.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lookup<'a> {
    Name(&'a str),
    Id(CodecId),
}

/// Borrowed view of an encoded frame handed to a decoder.
#[derive(Clone, Copy, Debug)]
pub struct PacketView<'a> {
    pub data: &'a [u8],
    pub dts: i64,
    pub pts: i64,
}

/// Output of one successful encode call. Key and config flags are read from
/// the payload when it becomes a [`crate::Frame`].
#[derive(Clone, Debug, PartialEq)]
pub struct EncodedPacket {
    pub data: Bytes,
    pub pts: Option<i64>,
    pub dts: Option<i64>,
}

/// A decoded picture or block of samples owned by the engine.
pub trait EngineFrame: Recycle + Default + Send + 'static {
    /// `None` for audio frames.
    fn pixel_format(&self) -> Option<PixelFormat>;
    /// `None` for video frames.
    fn sample_format(&self) -> Option<SampleFormat>;
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn sample_rate(&self) -> u32;
    fn channels(&self) -> u32;
    fn samples(&self) -> usize;
    fn pts(&self) -> Option<i64>;
    fn set_pts(&mut self, pts: Option<i64>);
    fn dts(&self) -> Option<i64>;
    fn set_dts(&mut self, dts: Option<i64>);
}

pub trait DecodeContext<F>: Send {
    /// Feeds one packet. Returns `true` when `out` now holds a decoded frame.
    fn decode(&mut self, packet: &PacketView<'_>, out: &mut F) -> anyhow::Result<bool>;

    /// Signals end of stream and pulls one buffered frame. Returns `false` once
    /// the decoder is empty.
    fn drain(&mut self, out: &mut F) -> anyhow::Result<bool>;
}

pub trait EncodeContext<F>: Send {
    /// Pixel formats the opened encoder accepts. Empty for audio encoders.
    fn supported_pixel_formats(&self) -> Vec<PixelFormat>;

    /// Feeds one frame. `None` while the encoder is still buffering.
    fn encode(&mut self, frame: &F) -> anyhow::Result<Option<EncodedPacket>>;

    /// Signals end of stream and pulls one buffered packet.
    fn drain(&mut self) -> anyhow::Result<Option<EncodedPacket>>;
}

pub trait ConvertContext<F>: Send {
    /// Writes `src` converted to the context's target format into `dst`,
    /// allocating `dst`'s buffer if it has none yet.
    fn convert(&mut self, src: &F, dst: &mut F) -> anyhow::Result<()>;
}

pub trait CodecEngine: Send + Sync + 'static {
    type Frame: EngineFrame;
    type Codec: Display;
    type Decoder: DecodeContext<Self::Frame>;
    type Encoder: EncodeContext<Self::Frame>;
    type Converter: ConvertContext<Self::Frame>;

    fn find_decoder(&self, lookup: Lookup<'_>) -> Option<Self::Codec>;

    fn find_encoder(&self, lookup: Lookup<'_>) -> Option<Self::Codec>;

    fn open_decoder(&self, codec: &Self::Codec, track: &Track) -> anyhow::Result<Self::Decoder>;

    fn open_encoder(
        &self,
        codec: &Self::Codec,
        settings: &EncoderSettings,
    ) -> anyhow::Result<Self::Encoder>;

    fn open_converter(
        &self,
        source: PixelFormat,
        target: PixelFormat,
        width: u32,
        height: u32,
    ) -> anyhow::Result<Self::Converter>;
}

/// Outcome of trying a codec's implementations in preference order.
pub(crate) enum Selection<T> {
    Opened { context: T, implementation: String },
    Unavailable,
    InitFailed {
        implementation: String,
        source: anyhow::Error,
    },
}

/// Tries every preferred implementation name, then the generic id lookup, and
/// keeps the first one that opens.
pub(crate) fn select<C: Display, T>(
    codec: CodecId,
    preferred: &[&str],
    find: impl Fn(Lookup<'_>) -> Option<C>,
    mut open: impl FnMut(&C) -> anyhow::Result<T>,
) -> Selection<T> {
    let lookups = preferred
        .iter()
        .map(|name| Lookup::Name(name))
        .chain(std::iter::once(Lookup::Id(codec)));

    let mut last_failure: Option<(String, anyhow::Error)> = None;
    let mut tried: Vec<String> = Vec::new();
    for lookup in lookups {
        let Some(found) = find(lookup) else {
            continue;
        };
        let implementation = found.to_string();
        if tried.contains(&implementation) {
            continue;
        }
        match open(&found) {
            Ok(context) => {
                log::info!("{} opened with implementation: {}", codec, implementation);
                return Selection::Opened {
                    context,
                    implementation,
                };
            }
            Err(e) => {
                log::warn!(
                    "{} implementation {} failed to open: {}, trying next",
                    codec,
                    implementation,
                    e
                );
                tried.push(implementation.clone());
                last_failure = Some((implementation, e));
            }
        }
    }

    match last_failure {
        Some((implementation, source)) => Selection::InitFailed {
            implementation,
            source,
        },
        None => Selection::Unavailable,
    }
}
