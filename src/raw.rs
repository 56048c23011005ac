use std::fmt::{Display, Formatter};

use crate::{
    codec::{CodecId, PixelFormat, SampleFormat, TrackType},
    engine::EngineFrame,
    pool::Pooled,
};

/// A decoded frame on its way through the pipeline.
///
/// Wraps a pooled engine frame together with the codec it was decoded from.
/// Ownership moves from stage to stage; dropping the handle returns the engine
/// frame to the pool of the stage that produced it.
pub struct RawFrame<F> {
    frame: Pooled<F>,
    source_codec: Option<CodecId>,
}

impl<F: EngineFrame> RawFrame<F> {
    pub(crate) fn new(frame: Pooled<F>, source_codec: Option<CodecId>) -> Self {
        Self {
            frame,
            source_codec,
        }
    }

    pub fn source_codec(&self) -> Option<CodecId> {
        self.source_codec
    }

    pub(crate) fn set_source_codec(&mut self, codec: CodecId) {
        self.source_codec = Some(codec);
    }

    /// Track type of the originating codec, or of the buffer itself when the
    /// frame has no provenance.
    pub fn track_type(&self) -> TrackType {
        match self.source_codec {
            Some(codec) => codec.track_type(),
            None if self.frame.pixel_format().is_some() => TrackType::Video,
            None => TrackType::Audio,
        }
    }

    pub fn pixel_format(&self) -> Option<PixelFormat> {
        self.frame.pixel_format()
    }

    pub fn sample_format(&self) -> Option<SampleFormat> {
        self.frame.sample_format()
    }

    pub fn width(&self) -> u32 {
        self.frame.width()
    }

    pub fn height(&self) -> u32 {
        self.frame.height()
    }

    pub fn sample_rate(&self) -> u32 {
        self.frame.sample_rate()
    }

    pub fn channels(&self) -> u32 {
        self.frame.channels()
    }

    pub fn samples(&self) -> usize {
        self.frame.samples()
    }

    pub fn pts(&self) -> Option<i64> {
        self.frame.pts()
    }

    pub fn dts(&self) -> Option<i64> {
        self.frame.dts()
    }

    pub fn inner(&self) -> &F {
        &self.frame
    }

    pub(crate) fn inner_mut(&mut self) -> &mut F {
        &mut self.frame
    }
}

impl<F: EngineFrame> Display for RawFrame<F> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        match self.track_type() {
            TrackType::Video => write!(
                f,
                "RawFrame video {:?} {}x{}, pts: {:?}",
                self.pixel_format(),
                self.width(),
                self.height(),
                self.pts()
            ),
            TrackType::Audio => write!(
                f,
                "RawFrame audio {:?} {} Hz x {} ch, samples: {}, pts: {:?}",
                self.sample_format(),
                self.sample_rate(),
                self.channels(),
                self.samples(),
                self.pts()
            ),
        }
    }
}
