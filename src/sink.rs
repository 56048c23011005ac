use std::sync::Arc;

use crate::{
    error::Result,
    frame::{Frame, Track},
};

/// Downstream consumer of tracks and encoded frames.
///
/// Upstream announces every track with `add_track` before sending its frames.
/// `Transcode` implements this trait too, so pipelines can be stacked.
pub trait MediaSink: Send + Sync {
    fn add_track(&self, track: &Track) -> Result<()>;

    fn input_frame(&self, frame: &Frame) -> Result<()>;

    /// All tracks of the current source have been announced.
    fn add_track_completed(&self) {}

    /// The source is gone; forget every track.
    fn reset_tracks(&self) {}
}

impl<S: MediaSink + ?Sized> MediaSink for Arc<S> {
    fn add_track(&self, track: &Track) -> Result<()> {
        (**self).add_track(track)
    }

    fn input_frame(&self, frame: &Frame) -> Result<()> {
        (**self).input_frame(frame)
    }

    fn add_track_completed(&self) {
        (**self).add_track_completed()
    }

    fn reset_tracks(&self) {
        (**self).reset_tracks()
    }
}

/// Sink that only logs what it receives.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl MediaSink for LogSink {
    fn add_track(&self, track: &Track) -> Result<()> {
        log::info!("add track: {}", track);
        Ok(())
    }

    fn input_frame(&self, frame: &Frame) -> Result<()> {
        log::debug!("frame: {}", frame);
        Ok(())
    }

    fn add_track_completed(&self) {
        log::info!("all tracks added");
    }

    fn reset_tracks(&self) {
        log::info!("tracks reset");
    }
}
