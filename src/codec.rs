//! Closed codec table.
//!
//! Every codec the pipeline knows about has exactly one [`CodecInfo`] entry in
//! [`CODECS`]. Decoder/encoder selection, track classification and bitstream
//! inspection all dispatch through that table instead of matching on the codec
//! id in several places.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackType {
    Audio,
    Video,
}

impl TrackType {
    pub const ALL: [TrackType; 2] = [TrackType::Audio, TrackType::Video];
}

impl Display for TrackType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackType::Audio => write!(f, "audio"),
            TrackType::Video => write!(f, "video"),
        }
    }
}

/// Codecs handled by the pipeline. The discriminant indexes [`CODECS`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecId {
    H264 = 0,
    H265 = 1,
    Aac = 2,
    G711A = 3,
    G711U = 4,
    Opus = 5,
}

impl CodecId {
    pub const ALL: [CodecId; 6] = [
        CodecId::H264,
        CodecId::H265,
        CodecId::Aac,
        CodecId::G711A,
        CodecId::G711U,
        CodecId::Opus,
    ];

    pub fn info(self) -> &'static CodecInfo {
        &CODECS[self as usize]
    }

    pub fn name(self) -> &'static str {
        self.info().name
    }

    pub fn track_type(self) -> TrackType {
        self.info().track_type
    }

    pub fn is_video(self) -> bool {
        self.track_type() == TrackType::Video
    }

    pub fn is_audio(self) -> bool {
        self.track_type() == TrackType::Audio
    }

    pub fn from_name(name: &str) -> Option<CodecId> {
        let name = name.to_ascii_lowercase();
        CODECS
            .iter()
            .find(|info| info.name == name || info.aliases.contains(&name.as_str()))
            .map(|info| info.id)
    }
}

impl Display for CodecId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Bitstream properties derived from one encoded access unit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameProps {
    /// Length of the start code (Annex B) or ADTS header in front of the payload.
    pub prefix_size: usize,
    pub key: bool,
    /// Parameter sets only (SPS/PPS/VPS).
    pub config: bool,
}

pub struct CodecInfo {
    pub id: CodecId,
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub track_type: TrackType,
    /// Named decoder implementations, tried in order before the generic id lookup.
    pub decoders: &'static [&'static str],
    /// Named encoder implementations, tried in order before the generic id lookup.
    pub encoders: &'static [&'static str],
    classify: fn(&[u8]) -> FrameProps,
}

impl CodecInfo {
    pub fn classify(&self, data: &[u8]) -> FrameProps {
        (self.classify)(data)
    }
}

pub static CODECS: [CodecInfo; 6] = [
    CodecInfo {
        id: CodecId::H264,
        name: "h264",
        aliases: &["avc", "libx264"],
        track_type: TrackType::Video,
        decoders: &["h264_cuvid", "h264_qsv", "h264_v4l2m2m"],
        encoders: &[
            "h264_nvenc",
            "h264_qsv",
            "h264_videotoolbox",
            "h264_v4l2m2m",
            "libx264",
        ],
        classify: classify_h264,
    },
    CodecInfo {
        id: CodecId::H265,
        name: "h265",
        aliases: &["hevc", "libx265"],
        track_type: TrackType::Video,
        decoders: &["hevc_cuvid", "hevc_qsv", "hevc_v4l2m2m"],
        encoders: &[
            "hevc_nvenc",
            "hevc_qsv",
            "hevc_videotoolbox",
            "hevc_v4l2m2m",
            "libx265",
        ],
        classify: classify_h265,
    },
    CodecInfo {
        id: CodecId::Aac,
        name: "aac",
        aliases: &["mpeg4-generic"],
        track_type: TrackType::Audio,
        decoders: &[],
        encoders: &["libfdk_aac"],
        classify: classify_aac,
    },
    CodecInfo {
        id: CodecId::G711A,
        name: "g711a",
        aliases: &["pcma", "pcm_alaw"],
        track_type: TrackType::Audio,
        decoders: &[],
        encoders: &[],
        classify: classify_plain_audio,
    },
    CodecInfo {
        id: CodecId::G711U,
        name: "g711u",
        aliases: &["pcmu", "pcm_mulaw"],
        track_type: TrackType::Audio,
        decoders: &[],
        encoders: &[],
        classify: classify_plain_audio,
    },
    CodecInfo {
        id: CodecId::Opus,
        name: "opus",
        aliases: &[],
        track_type: TrackType::Audio,
        decoders: &["libopus"],
        encoders: &["libopus"],
        classify: classify_plain_audio,
    },
];

/// Returns the length of the Annex B start code at the beginning of `data`, if any.
pub fn start_code_len(data: &[u8]) -> usize {
    if data.len() >= 4 && data[..4] == [0x00, 0x00, 0x00, 0x01] {
        4
    } else if data.len() >= 3 && data[..3] == [0x00, 0x00, 0x01] {
        3
    } else {
        0
    }
}

/// Iterates the first header byte of every NAL unit in an Annex B buffer.
/// A buffer without start codes is treated as a single NAL unit.
fn nal_headers(data: &[u8]) -> impl Iterator<Item = u8> + '_ {
    let mut pos = 0usize;
    let mut first = true;
    std::iter::from_fn(move || {
        loop {
            if pos >= data.len() {
                return None;
            }
            let rest = &data[pos..];
            let prefix = start_code_len(rest);
            if prefix == 0 {
                if first {
                    first = false;
                    pos = data.len();
                    return rest.first().copied();
                }
                pos += 1;
                continue;
            }
            first = false;
            pos += prefix;
            if pos < data.len() {
                return Some(data[pos]);
            }
        }
    })
}

fn classify_h264(data: &[u8]) -> FrameProps {
    let mut props = FrameProps {
        prefix_size: start_code_len(data),
        ..Default::default()
    };
    let mut first = true;
    for header in nal_headers(data) {
        let nal_type = header & 0x1F;
        if first {
            props.config = matches!(nal_type, 7 | 8);
            first = false;
        }
        if nal_type == 5 {
            props.key = true;
        }
    }
    props
}

fn classify_h265(data: &[u8]) -> FrameProps {
    let mut props = FrameProps {
        prefix_size: start_code_len(data),
        ..Default::default()
    };
    let mut first = true;
    for header in nal_headers(data) {
        let nal_type = (header >> 1) & 0x3F;
        if first {
            props.config = matches!(nal_type, 32..=34);
            first = false;
        }
        if (16..=21).contains(&nal_type) {
            props.key = true;
        }
    }
    props
}

fn classify_aac(data: &[u8]) -> FrameProps {
    // ADTS sync word 0xFFF; header is 9 bytes when a CRC follows.
    let prefix_size = if data.len() >= 7 && data[0] == 0xFF && data[1] & 0xF0 == 0xF0 {
        if data[1] & 0x01 == 0 { 9 } else { 7 }
    } else {
        0
    };
    FrameProps {
        prefix_size,
        key: true,
        config: false,
    }
}

fn classify_plain_audio(_data: &[u8]) -> FrameProps {
    FrameProps {
        prefix_size: 0,
        key: true,
        config: false,
    }
}

/// Pixel formats the pipeline negotiates with encoders and converters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    Yuv420p,
    Yuvj420p,
    Nv12,
    Nv21,
    Yuv422p,
    Yuv444p,
    Yuv420p10le,
    Yuvj422p,
    Yuvj444p,
    Yuv422p10le,
    Yuv444p10le,
    P010le,
    Gray8,
    Rgb24,
    Bgr24,
    Rgba,
    Bgra,
}

impl PixelFormat {
    /// The YUV-family format preferred when an encoder does not accept the
    /// decoder's native format.
    pub const DEFAULT: PixelFormat = PixelFormat::Yuv420p;

    pub fn is_yuv(self) -> bool {
        !matches!(
            self,
            PixelFormat::Rgb24 | PixelFormat::Bgr24 | PixelFormat::Rgba | PixelFormat::Bgra
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleFormat {
    U8,
    S16,
    S32,
    Flt,
    Dbl,
    S16p,
    S32p,
    Fltp,
    Dblp,
}

impl SampleFormat {
    pub fn is_planar(self) -> bool {
        matches!(
            self,
            SampleFormat::S16p | SampleFormat::S32p | SampleFormat::Fltp | SampleFormat::Dblp
        )
    }
}
