use serde::{Deserialize, Serialize};

use crate::{
    codec::{CodecId, TrackType},
    error::{Error, Result},
};

/// Frames kept per stage pool; matches the decoder lookahead.
pub const DEFAULT_POOL_SIZE: usize = 8;

/// Target codec per track type, fixed before the first track is added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscodeConfig {
    pub audio_target: CodecId,
    pub video_target: CodecId,
    pub pool_size: usize,
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            audio_target: CodecId::G711A,
            video_target: CodecId::H264,
            pool_size: DEFAULT_POOL_SIZE,
        }
    }
}

impl TranscodeConfig {
    pub fn new(audio_target: CodecId, video_target: CodecId) -> Self {
        Self {
            audio_target,
            video_target,
            ..Default::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: TranscodeConfig =
            serde_json::from_str(json).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn target(&self, track_type: TrackType) -> CodecId {
        match track_type {
            TrackType::Audio => self.audio_target,
            TrackType::Video => self.video_target,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.audio_target.is_audio() {
            return Err(Error::InvalidConfig(format!(
                "audio target {} is not an audio codec",
                self.audio_target
            )));
        }
        if !self.video_target.is_video() {
            return Err(Error::InvalidConfig(format!(
                "video target {} is not a video codec",
                self.video_target
            )));
        }
        if self.pool_size == 0 {
            return Err(Error::InvalidConfig("pool_size must be positive".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_targets() {
        let config = TranscodeConfig::default();
        assert_eq!(config.target(TrackType::Audio), CodecId::G711A);
        assert_eq!(config.target(TrackType::Video), CodecId::H264);
        assert_eq!(config.pool_size, DEFAULT_POOL_SIZE);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_partial() {
        let config = TranscodeConfig::from_json(r#"{ "video_target": "h265" }"#).unwrap();
        assert_eq!(config.video_target, CodecId::H265);
        assert_eq!(config.audio_target, CodecId::G711A);
    }

    #[test]
    fn test_from_json_rejects_swapped_targets() {
        let err = TranscodeConfig::from_json(r#"{ "audio_target": "h264" }"#).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));

        let err = TranscodeConfig::from_json(r#"{ "video_target": "vp9" }"#).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn test_json_round_trip_of_defaults() {
        let json = serde_json::to_string(&TranscodeConfig::default()).unwrap();
        assert_eq!(TranscodeConfig::from_json(&json).unwrap(), TranscodeConfig::default());
    }
}
