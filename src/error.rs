use thiserror::Error;

use crate::codec::{CodecId, TrackType};

#[derive(Error, Debug)]
pub enum Error {
    #[error("no decoder found for {codec}")]
    DecoderUnavailable { codec: CodecId },

    #[error("failed to open {codec} decoder {implementation}: {source}")]
    DecoderInitFailed {
        codec: CodecId,
        implementation: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("no encoder found for {codec}")]
    EncoderUnavailable { codec: CodecId },

    #[error("failed to open {codec} encoder {implementation}: {source}")]
    EncoderInitFailed {
        codec: CodecId,
        implementation: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("{found} frame routed to a {expected} encoder")]
    TrackTypeMismatch {
        expected: TrackType,
        found: TrackType,
    },

    #[error("{codec} frame received before its track was added")]
    TrackNotReady { codec: CodecId },

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("sink error: {0}")]
    Sink(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = Error::DecoderUnavailable {
            codec: CodecId::H265,
        };
        assert_eq!(e.to_string(), "no decoder found for h265");

        let e = Error::TrackTypeMismatch {
            expected: TrackType::Video,
            found: TrackType::Audio,
        };
        assert_eq!(e.to_string(), "audio frame routed to a video encoder");

        let e = Error::EncoderInitFailed {
            codec: CodecId::H264,
            implementation: "libx264".to_string(),
            source: anyhow::anyhow!("invalid width"),
        };
        assert_eq!(
            e.to_string(),
            "failed to open h264 encoder libx264: invalid width"
        );
    }

    #[test]
    fn test_sink_error_from_anyhow() {
        let e: Error = anyhow::anyhow!("disk full").into();
        assert!(matches!(e, Error::Sink(_)));
    }
}
