use std::fmt::{Display, Formatter};

use bytes::Bytes;

use crate::codec::{CodecId, FrameProps, TrackType};

/// Descriptor of one elementary stream.
///
/// Geometry and sample layout are optional hints; zero means unknown.
#[derive(Clone, Debug, PartialEq)]
pub struct Track {
    codec: CodecId,
    pub width: u32,
    pub height: u32,
    pub fps: f32,
    pub sample_rate: u32,
    pub channels: u32,
    /// Codec configuration record (avcC/hvcC, AudioSpecificConfig, ...).
    pub extra_data: Option<Bytes>,
}

impl Track {
    pub fn new(codec: CodecId) -> Self {
        Self {
            codec,
            width: 0,
            height: 0,
            fps: 0.0,
            sample_rate: 0,
            channels: 0,
            extra_data: None,
        }
    }

    pub fn video(codec: CodecId, width: u32, height: u32, fps: f32) -> Self {
        Self {
            width,
            height,
            fps,
            ..Self::new(codec)
        }
    }

    pub fn audio(codec: CodecId, sample_rate: u32, channels: u32) -> Self {
        Self {
            sample_rate,
            channels,
            ..Self::new(codec)
        }
    }

    pub fn with_extra_data(mut self, extra_data: impl Into<Bytes>) -> Self {
        self.extra_data = Some(extra_data.into());
        self
    }

    pub fn codec_id(&self) -> CodecId {
        self.codec
    }

    pub fn track_type(&self) -> TrackType {
        self.codec_id().track_type()
    }
}

impl Display for Track {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        match self.track_type() {
            TrackType::Video => write!(
                f,
                "Track {{ codec: {}, {}x{} @ {} fps }}",
                self.codec_id(),
                self.width,
                self.height,
                self.fps
            ),
            TrackType::Audio => write!(
                f,
                "Track {{ codec: {}, {} Hz, {} ch }}",
                self.codec_id(),
                self.sample_rate,
                self.channels
            ),
        }
    }
}

/// One encoded access unit.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    codec: CodecId,
    dts: i64,
    pts: i64,
    data: Bytes,
    props: FrameProps,
}

impl Frame {
    /// Builds a frame and classifies its payload with the codec's bitstream rules.
    pub fn new(codec: CodecId, dts: i64, pts: i64, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        let props = codec.info().classify(&data);
        Self {
            codec,
            dts,
            pts,
            data,
            props,
        }
    }

    pub fn codec_id(&self) -> CodecId {
        self.codec
    }

    pub fn track_type(&self) -> TrackType {
        self.codec.track_type()
    }

    pub fn dts(&self) -> i64 {
        self.dts
    }

    pub fn pts(&self) -> i64 {
        self.pts
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn prefix_size(&self) -> usize {
        self.props.prefix_size
    }

    pub fn is_key(&self) -> bool {
        self.props.key
    }

    pub fn is_config(&self) -> bool {
        self.props.config
    }
}

impl Display for Frame {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(
            f,
            "Frame codec: {}, dts: {}, pts: {}, size: {}, key: {}, config: {}",
            self.codec,
            self.dts,
            self.pts,
            self.data.len(),
            self.props.key,
            self.props.config
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_classifies_payload() {
        let frame = Frame::new(CodecId::H264, 40, 80, vec![0, 0, 0, 1, 0x65, 0x88]);
        assert_eq!(frame.codec_id(), CodecId::H264);
        assert_eq!(frame.track_type(), TrackType::Video);
        assert_eq!(frame.dts(), 40);
        assert_eq!(frame.pts(), 80);
        assert_eq!(frame.size(), 6);
        assert_eq!(frame.prefix_size(), 4);
        assert!(frame.is_key());
        assert!(!frame.is_config());
    }

    #[test]
    fn test_track_constructors() {
        let video = Track::video(CodecId::H265, 1920, 1080, 25.0);
        assert_eq!(video.track_type(), TrackType::Video);
        assert_eq!(video.width, 1920);

        let audio = Track::audio(CodecId::G711A, 8000, 1);
        assert_eq!(audio.track_type(), TrackType::Audio);
        assert_eq!(audio.sample_rate, 8000);
        assert!(audio.extra_data.is_none());

        let with_config = Track::new(CodecId::Aac).with_extra_data(vec![0x12, 0x10]);
        assert_eq!(with_config.extra_data.as_deref(), Some(&[0x12, 0x10][..]));
    }
}
