use std::sync::{Arc, Mutex};

use crate::{
    codec::{CodecId, TrackType},
    config::TranscodeConfig,
    decoder::Decoder,
    encoder::{Encoder, EncoderSettings},
    engine::CodecEngine,
    error::{Error, Result},
    frame::{Frame, Track},
    sink::MediaSink,
};

/// Decode and encode stages of one transcoded track.
struct Stages<E: CodecEngine> {
    decoder: Decoder<E>,
    encoder: Arc<Mutex<Encoder<E>>>,
}

struct Slot<E: CodecEngine> {
    target: CodecId,
    /// `None` while the track is forwarded as-is or not added yet.
    stages: Option<Stages<E>>,
}

/// Per-track transcoding in front of a [`MediaSink`].
///
/// Tracks already in the target codec are forwarded untouched. Any other track
/// gets a decoder and an encoder, chained through their callbacks so that one
/// `input_frame` call runs the whole chain on the caller's thread. Audio and
/// video are locked independently.
pub struct Transcode<E: CodecEngine> {
    engine: Arc<E>,
    config: TranscodeConfig,
    sink: Arc<dyn MediaSink>,
    audio: Mutex<Slot<E>>,
    video: Mutex<Slot<E>>,
}

impl<E: CodecEngine> Transcode<E> {
    pub fn new(engine: Arc<E>, config: TranscodeConfig, sink: Arc<dyn MediaSink>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            engine,
            audio: Mutex::new(Slot {
                target: config.audio_target,
                stages: None,
            }),
            video: Mutex::new(Slot {
                target: config.video_target,
                stages: None,
            }),
            config,
            sink,
        })
    }

    pub fn config(&self) -> &TranscodeConfig {
        &self.config
    }

    pub fn target(&self, track_type: TrackType) -> CodecId {
        self.config.target(track_type)
    }

    pub fn is_transcoding(&self, track_type: TrackType) -> bool {
        self.slot(track_type).lock().unwrap().stages.is_some()
    }

    /// Names of the decoder and encoder implementations in use for `track_type`.
    pub fn implementations(&self, track_type: TrackType) -> Option<(String, String)> {
        let slot = self.slot(track_type).lock().unwrap();
        slot.stages.as_ref().map(|stages| {
            (
                stages.decoder.implementation().to_string(),
                stages.encoder.lock().unwrap().implementation().to_string(),
            )
        })
    }

    /// Registers a source track. Tracks that need transcoding are announced to
    /// the sink with the target codec.
    pub fn add_track(&self, track: &Track) -> Result<()> {
        let track_type = track.track_type();
        let mut slot = self.slot(track_type).lock().unwrap();

        if track.codec_id() == slot.target {
            log::info!("{} forwarded as-is", track);
            slot.stages = None;
            return self.sink.add_track(track);
        }

        slot.stages = None;
        let settings = EncoderSettings::for_track(slot.target, track);
        let output = settings.to_track();
        let stages = self.build(track, settings)?;
        log::info!(
            "{} track {} -> {} ({} -> {})",
            track_type,
            track.codec_id(),
            slot.target,
            stages.decoder.implementation(),
            stages.encoder.lock().unwrap().implementation()
        );
        slot.stages = Some(stages);
        self.sink.add_track(&output)
    }

    /// Forwards or transcodes one source frame.
    pub fn input_frame(&self, frame: &Frame) -> Result<()> {
        let mut slot = self.slot(frame.track_type()).lock().unwrap();
        if frame.codec_id() == slot.target {
            drop(slot);
            return self.sink.input_frame(frame);
        }

        match slot.stages.as_mut() {
            Some(stages) if stages.decoder.codec_id() == frame.codec_id() => {
                stages.decoder.input(frame)
            }
            _ => {
                log::error!(
                    "{} frame needs transcoding to {} but no such track was added",
                    frame.codec_id(),
                    slot.target
                );
                Err(Error::TrackNotReady {
                    codec: frame.codec_id(),
                })
            }
        }
    }

    pub fn add_track_completed(&self) {
        self.sink.add_track_completed();
    }

    /// Drops every decoder and encoder, then resets the sink.
    pub fn reset_tracks(&self) {
        for track_type in TrackType::ALL {
            self.slot(track_type).lock().unwrap().stages = None;
        }
        self.sink.reset_tracks();
    }

    /// Drains frames still buffered in the decoders and encoders into the sink.
    ///
    /// A drained stage pair is end of stream for good, so it is dropped: later
    /// frames of that track type get [`Error::TrackNotReady`] until the track
    /// is added again.
    pub fn flush(&self) -> Result<()> {
        for track_type in TrackType::ALL {
            let mut slot = self.slot(track_type).lock().unwrap();
            if let Some(mut stages) = slot.stages.take() {
                stages.decoder.flush()?;
                stages.encoder.lock().unwrap().flush()?;
                log::info!("{} track {} flushed", track_type, stages.decoder.codec_id());
            }
        }
        Ok(())
    }

    fn slot(&self, track_type: TrackType) -> &Mutex<Slot<E>> {
        match track_type {
            TrackType::Audio => &self.audio,
            TrackType::Video => &self.video,
        }
    }

    fn build(&self, track: &Track, settings: EncoderSettings) -> Result<Stages<E>> {
        let pool_size = self.config.pool_size;
        let mut decoder = Decoder::with_pool_size(self.engine.as_ref(), track, pool_size)?;
        let mut encoder = Encoder::with_pool_size(self.engine.clone(), settings, pool_size)?;

        let sink = self.sink.clone();
        encoder.set_on_encode(move |frame| sink.input_frame(&frame));

        let encoder = Arc::new(Mutex::new(encoder));
        let downstream = encoder.clone();
        decoder.set_on_decode(move |frame| downstream.lock().unwrap().input(frame));

        Ok(Stages { decoder, encoder })
    }
}

impl<E: CodecEngine> MediaSink for Transcode<E> {
    fn add_track(&self, track: &Track) -> Result<()> {
        Transcode::add_track(self, track)
    }

    fn input_frame(&self, frame: &Frame) -> Result<()> {
        Transcode::input_frame(self, frame)
    }

    fn add_track_completed(&self) {
        Transcode::add_track_completed(self)
    }

    fn reset_tracks(&self) {
        Transcode::reset_tracks(self)
    }
}

#[cfg(test)]
#[path = "transcode_test.rs"]
mod transcode_test;
