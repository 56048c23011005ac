//! Mapping between the pipeline's codec and format enums and FFmpeg's.

use ffmpeg_next::{
    codec::Id,
    format::{Pixel, Sample, sample::Type},
};
use lite_transcode::{CodecId, PixelFormat, SampleFormat};

pub fn to_codec_id(codec: CodecId) -> Id {
    match codec {
        CodecId::H264 => Id::H264,
        CodecId::H265 => Id::HEVC,
        CodecId::Aac => Id::AAC,
        CodecId::G711A => Id::PCM_ALAW,
        CodecId::G711U => Id::PCM_MULAW,
        CodecId::Opus => Id::OPUS,
    }
}

pub fn from_codec_id(id: Id) -> Option<CodecId> {
    match id {
        Id::H264 => Some(CodecId::H264),
        Id::HEVC => Some(CodecId::H265),
        Id::AAC => Some(CodecId::Aac),
        Id::PCM_ALAW => Some(CodecId::G711A),
        Id::PCM_MULAW => Some(CodecId::G711U),
        Id::OPUS => Some(CodecId::Opus),
        _ => None,
    }
}

pub fn to_pixel(format: PixelFormat) -> Pixel {
    match format {
        PixelFormat::Yuv420p => Pixel::YUV420P,
        PixelFormat::Yuvj420p => Pixel::YUVJ420P,
        PixelFormat::Nv12 => Pixel::NV12,
        PixelFormat::Nv21 => Pixel::NV21,
        PixelFormat::Yuv422p => Pixel::YUV422P,
        PixelFormat::Yuv444p => Pixel::YUV444P,
        PixelFormat::Yuv420p10le => Pixel::YUV420P10LE,
        PixelFormat::Yuvj422p => Pixel::YUVJ422P,
        PixelFormat::Yuvj444p => Pixel::YUVJ444P,
        PixelFormat::Yuv422p10le => Pixel::YUV422P10LE,
        PixelFormat::Yuv444p10le => Pixel::YUV444P10LE,
        PixelFormat::P010le => Pixel::P010LE,
        PixelFormat::Gray8 => Pixel::GRAY8,
        PixelFormat::Rgb24 => Pixel::RGB24,
        PixelFormat::Bgr24 => Pixel::BGR24,
        PixelFormat::Rgba => Pixel::RGBA,
        PixelFormat::Bgra => Pixel::BGRA,
    }
}

/// `None` for formats the pipeline does not negotiate, including hardware
/// surface formats.
pub fn from_pixel(format: Pixel) -> Option<PixelFormat> {
    match format {
        Pixel::YUV420P => Some(PixelFormat::Yuv420p),
        Pixel::YUVJ420P => Some(PixelFormat::Yuvj420p),
        Pixel::NV12 => Some(PixelFormat::Nv12),
        Pixel::NV21 => Some(PixelFormat::Nv21),
        Pixel::YUV422P => Some(PixelFormat::Yuv422p),
        Pixel::YUV444P => Some(PixelFormat::Yuv444p),
        Pixel::YUV420P10LE => Some(PixelFormat::Yuv420p10le),
        Pixel::YUVJ422P => Some(PixelFormat::Yuvj422p),
        Pixel::YUVJ444P => Some(PixelFormat::Yuvj444p),
        Pixel::YUV422P10LE => Some(PixelFormat::Yuv422p10le),
        Pixel::YUV444P10LE => Some(PixelFormat::Yuv444p10le),
        Pixel::P010LE => Some(PixelFormat::P010le),
        Pixel::GRAY8 => Some(PixelFormat::Gray8),
        Pixel::RGB24 => Some(PixelFormat::Rgb24),
        Pixel::BGR24 => Some(PixelFormat::Bgr24),
        Pixel::RGBA => Some(PixelFormat::Rgba),
        Pixel::BGRA => Some(PixelFormat::Bgra),
        _ => None,
    }
}

pub fn to_sample(format: SampleFormat) -> Sample {
    match format {
        SampleFormat::U8 => Sample::U8(Type::Packed),
        SampleFormat::S16 => Sample::I16(Type::Packed),
        SampleFormat::S32 => Sample::I32(Type::Packed),
        SampleFormat::Flt => Sample::F32(Type::Packed),
        SampleFormat::Dbl => Sample::F64(Type::Packed),
        SampleFormat::S16p => Sample::I16(Type::Planar),
        SampleFormat::S32p => Sample::I32(Type::Planar),
        SampleFormat::Fltp => Sample::F32(Type::Planar),
        SampleFormat::Dblp => Sample::F64(Type::Planar),
    }
}

pub fn from_sample(format: Sample) -> Option<SampleFormat> {
    match format {
        Sample::U8(Type::Packed) => Some(SampleFormat::U8),
        Sample::I16(Type::Packed) => Some(SampleFormat::S16),
        Sample::I32(Type::Packed) => Some(SampleFormat::S32),
        Sample::F32(Type::Packed) => Some(SampleFormat::Flt),
        Sample::F64(Type::Packed) => Some(SampleFormat::Dbl),
        Sample::I16(Type::Planar) => Some(SampleFormat::S16p),
        Sample::I32(Type::Planar) => Some(SampleFormat::S32p),
        Sample::F32(Type::Planar) => Some(SampleFormat::Fltp),
        Sample::F64(Type::Planar) => Some(SampleFormat::Dblp),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_ids_map_both_ways() {
        for codec in CodecId::ALL {
            assert_eq!(from_codec_id(to_codec_id(codec)), Some(codec));
        }
        assert_eq!(from_codec_id(Id::VP9), None);
    }

    #[test]
    fn test_pixel_formats() {
        assert_eq!(to_pixel(PixelFormat::DEFAULT), Pixel::YUV420P);
        assert_eq!(from_pixel(Pixel::NV12), Some(PixelFormat::Nv12));
        assert_eq!(from_pixel(Pixel::CUDA), None);
    }

    #[test]
    fn test_decoder_output_formats_are_negotiable() {
        for pixel in [
            Pixel::YUVJ422P,
            Pixel::YUV422P10LE,
            Pixel::YUV444P10LE,
            Pixel::P010LE,
            Pixel::GRAY8,
        ] {
            let format = from_pixel(pixel).expect("mapped");
            assert_eq!(to_pixel(format), pixel);
        }
    }

    #[test]
    fn test_sample_formats() {
        assert_eq!(to_sample(SampleFormat::Fltp), Sample::F32(Type::Planar));
        assert_eq!(from_sample(Sample::I16(Type::Packed)), Some(SampleFormat::S16));
        assert_eq!(from_sample(Sample::None), None);
    }
}
