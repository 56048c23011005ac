use std::fmt::{Display, Formatter};

use lite_transcode::{CodecEngine, EncoderSettings, Lookup, PixelFormat, Track};

use crate::{
    decoder::Decoder, encoder::Encoder, format::to_pixel, frame::AvFrame, hw, scaler::Scaler,
};

/// A codec implementation found in the linked FFmpeg build.
#[derive(Clone, Copy)]
pub struct FfmpegCodec(pub ffmpeg_next::Codec);

impl Display for FfmpegCodec {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0.name())
    }
}

#[derive(Debug, Clone)]
pub struct FfmpegEngine {
    /// Try the hardware implementations listed for each codec before the
    /// software ones.
    pub hardware: bool,
}

impl Default for FfmpegEngine {
    fn default() -> Self {
        Self { hardware: true }
    }
}

impl FfmpegEngine {
    pub fn software() -> Self {
        Self { hardware: false }
    }
}

impl CodecEngine for FfmpegEngine {
    type Frame = AvFrame;
    type Codec = FfmpegCodec;
    type Decoder = Decoder;
    type Encoder = Encoder;
    type Converter = Scaler;

    fn find_decoder(&self, lookup: Lookup<'_>) -> Option<FfmpegCodec> {
        hw::find_decoder(lookup, self.hardware).map(FfmpegCodec)
    }

    fn find_encoder(&self, lookup: Lookup<'_>) -> Option<FfmpegCodec> {
        hw::find_encoder(lookup, self.hardware).map(FfmpegCodec)
    }

    fn open_decoder(&self, codec: &FfmpegCodec, track: &Track) -> anyhow::Result<Decoder> {
        Decoder::new(codec.0, track)
    }

    fn open_encoder(
        &self,
        codec: &FfmpegCodec,
        settings: &EncoderSettings,
    ) -> anyhow::Result<Encoder> {
        Encoder::new(codec.0, settings, None)
    }

    fn open_converter(
        &self,
        source: PixelFormat,
        target: PixelFormat,
        width: u32,
        height: u32,
    ) -> anyhow::Result<Scaler> {
        if width == 0 || height == 0 {
            anyhow::bail!("invalid video size {}x{}", width, height);
        }
        Scaler::new(to_pixel(source), to_pixel(target), width, height)
    }
}
