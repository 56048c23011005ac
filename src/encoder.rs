use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    codec::{CodecId, PixelFormat, SampleFormat, TrackType},
    config::DEFAULT_POOL_SIZE,
    converter::FormatConverter,
    engine::{self, CodecEngine, EncodeContext, EncodedPacket, Selection},
    error::{Error, Result},
    frame::{Frame, Track},
    raw::RawFrame,
};

/// Encoder parameters. Fixed for the lifetime of an [`Encoder`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncoderSettings {
    pub codec: CodecId,
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    pub gop_size: u32,
    pub max_b_frames: u32,
    pub bit_rate: usize,
    /// (numerator, denominator)
    pub time_base: (i32, i32),
    pub pixel_format: PixelFormat,
    pub sample_format: SampleFormat,
    pub sample_rate: u32,
    pub channels: u32,
    pub profile: Option<String>,
}

impl EncoderSettings {
    /// Compiled-in defaults for `codec`.
    pub fn for_codec(codec: CodecId) -> Self {
        let video = Self {
            codec,
            width: 1280,
            height: 720,
            frame_rate: 25,
            gop_size: 50,
            max_b_frames: 0,
            bit_rate: 2_000_000,
            time_base: (1, 1000),
            pixel_format: PixelFormat::DEFAULT,
            sample_format: SampleFormat::S16,
            sample_rate: 0,
            channels: 0,
            profile: None,
        };
        match codec {
            CodecId::H264 | CodecId::H265 => video,
            CodecId::G711A | CodecId::G711U => Self {
                width: 0,
                height: 0,
                frame_rate: 0,
                gop_size: 0,
                bit_rate: 64_000,
                time_base: (1, 8000),
                sample_format: SampleFormat::S16,
                sample_rate: 8000,
                channels: 1,
                ..video
            },
            CodecId::Aac => Self {
                width: 0,
                height: 0,
                frame_rate: 0,
                gop_size: 0,
                bit_rate: 64_000,
                time_base: (1, 44100),
                sample_format: SampleFormat::Fltp,
                sample_rate: 44100,
                channels: 2,
                ..video
            },
            CodecId::Opus => Self {
                width: 0,
                height: 0,
                frame_rate: 0,
                gop_size: 0,
                bit_rate: 64_000,
                time_base: (1, 48000),
                sample_format: SampleFormat::Fltp,
                sample_rate: 48000,
                channels: 2,
                ..video
            },
        }
    }

    /// Defaults for `codec`, with the output geometry taken from the source
    /// track when it is known.
    pub fn for_track(codec: CodecId, source: &Track) -> Self {
        let mut settings = Self::for_codec(codec);
        if codec.is_video() && source.width > 0 && source.height > 0 {
            settings.width = source.width;
            settings.height = source.height;
            if source.fps > 0.0 {
                settings.frame_rate = source.fps.round() as u32;
            }
        }
        settings
    }

    pub fn track_type(&self) -> TrackType {
        self.codec.track_type()
    }

    /// Track descriptor announced downstream for this encoder's output.
    pub fn to_track(&self) -> Track {
        match self.track_type() {
            TrackType::Video => Track::video(
                self.codec,
                self.width,
                self.height,
                self.frame_rate as f32,
            ),
            TrackType::Audio => Track::audio(self.codec, self.sample_rate, self.channels),
        }
    }
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self::for_codec(CodecId::H264)
    }
}

pub type OnEncode = Box<dyn FnMut(Frame) -> Result<()> + Send>;

/// Encode stage bound to one target codec.
pub struct Encoder<E: CodecEngine> {
    engine: Arc<E>,
    settings: EncoderSettings,
    implementation: String,
    context: E::Encoder,
    supported_formats: Vec<PixelFormat>,
    converter: Option<FormatConverter<E>>,
    pool_size: usize,
    on_encode: Option<OnEncode>,
}

impl<E: CodecEngine> Encoder<E> {
    pub fn new(engine: Arc<E>, settings: EncoderSettings) -> Result<Self> {
        Self::with_pool_size(engine, settings, DEFAULT_POOL_SIZE)
    }

    pub fn with_pool_size(
        engine: Arc<E>,
        settings: EncoderSettings,
        pool_size: usize,
    ) -> Result<Self> {
        let codec = settings.codec;
        let (context, implementation) = match engine::select(
            codec,
            codec.info().encoders,
            |lookup| engine.find_encoder(lookup),
            |found| engine.open_encoder(found, &settings),
        ) {
            Selection::Opened {
                context,
                implementation,
            } => (context, implementation),
            Selection::Unavailable => return Err(Error::EncoderUnavailable { codec }),
            Selection::InitFailed {
                implementation,
                source,
            } => {
                return Err(Error::EncoderInitFailed {
                    codec,
                    implementation,
                    source,
                });
            }
        };

        let supported_formats = if codec.is_video() {
            let formats = context.supported_pixel_formats();
            if formats.is_empty() {
                return Err(Error::EncoderInitFailed {
                    codec,
                    implementation,
                    source: anyhow::anyhow!("encoder reports no supported pixel formats"),
                });
            }
            formats
        } else {
            Vec::new()
        };

        Ok(Self {
            engine,
            settings,
            implementation,
            context,
            supported_formats,
            converter: None,
            pool_size,
            on_encode: None,
        })
    }

    pub fn codec_id(&self) -> CodecId {
        self.settings.codec
    }

    pub fn track_type(&self) -> TrackType {
        self.settings.track_type()
    }

    pub fn settings(&self) -> &EncoderSettings {
        &self.settings
    }

    pub fn implementation(&self) -> &str {
        &self.implementation
    }

    pub fn supported_pixel_formats(&self) -> &[PixelFormat] {
        &self.supported_formats
    }

    /// Target format chosen on the first video frame, if any.
    pub fn negotiated_format(&self) -> Option<PixelFormat> {
        self.converter.as_ref().map(|c| c.target())
    }

    pub fn set_on_encode(&mut self, cb: impl FnMut(Frame) -> Result<()> + Send + 'static) {
        self.on_encode = Some(Box::new(cb));
    }

    /// Encodes one decoded frame; the callback fires when a packet comes out.
    pub fn input(&mut self, frame: RawFrame<E::Frame>) -> Result<()> {
        let found = frame.track_type();
        if found != self.track_type() {
            return Err(Error::TrackTypeMismatch {
                expected: self.track_type(),
                found,
            });
        }

        let frame = match (frame.track_type(), frame.pixel_format()) {
            (TrackType::Video, Some(native)) => self.converter_for(native).convert(frame),
            (TrackType::Video, None) => {
                log::warn!(
                    "{} encoder got a {}x{} frame in a pixel format it cannot negotiate, frame dropped",
                    self.codec_id(),
                    frame.width(),
                    frame.height()
                );
                return Ok(());
            }
            (TrackType::Audio, _) => frame,
        };

        match self.context.encode(frame.inner()) {
            Ok(Some(packet)) => self.emit(packet, &frame),
            Ok(None) => Ok(()),
            Err(e) => {
                log::warn!("{} encode failed: {}, frame dropped", self.codec_id(), e);
                Ok(())
            }
        }
    }

    /// Drains packets still buffered in the encoder.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.context.drain() {
                Ok(Some(packet)) => {
                    let pts = packet.pts.unwrap_or(0);
                    let dts = packet.dts.unwrap_or(pts);
                    self.deliver(Frame::new(self.codec_id(), dts, pts, packet.data))?;
                }
                Ok(None) => return Ok(()),
                Err(e) => {
                    log::warn!("{} encoder flush failed: {}", self.codec_id(), e);
                    return Ok(());
                }
            }
        }
    }

    /// Returns the converter, choosing its target format on first use: the
    /// frame's own format if the encoder takes it, else the YUV default, else
    /// anything the encoder supports.
    fn converter_for(&mut self, native: PixelFormat) -> &mut FormatConverter<E> {
        let Self {
            engine,
            settings,
            supported_formats,
            converter,
            pool_size,
            ..
        } = self;
        converter.get_or_insert_with(|| {
            let target = if supported_formats.contains(&native) {
                native
            } else if supported_formats.contains(&PixelFormat::DEFAULT) {
                PixelFormat::DEFAULT
            } else {
                supported_formats
                    .first()
                    .copied()
                    .unwrap_or(settings.pixel_format)
            };
            log::debug!(
                "{} encoder input format {:?}, negotiated {:?}",
                settings.codec,
                native,
                target
            );
            FormatConverter::with_pool_size(engine.clone(), target, *pool_size)
        })
    }

    fn emit(&mut self, packet: EncodedPacket, source: &RawFrame<E::Frame>) -> Result<()> {
        let pts = packet.pts.or(source.pts()).unwrap_or(0);
        let dts = packet.dts.or(source.dts()).unwrap_or(pts);
        self.deliver(Frame::new(self.codec_id(), dts, pts, packet.data))
    }

    fn deliver(&mut self, frame: Frame) -> Result<()> {
        match self.on_encode.as_mut() {
            Some(cb) => cb(frame),
            None => Ok(()),
        }
    }
}
