use ffmpeg_next::{Rational, codec::Parameters, format::stream};
use lite_transcode::{CodecId, Track};

use crate::{bsf::AnnexB, format::from_codec_id};

unsafe impl Send for AvStream {}
unsafe impl Sync for AvStream {}

#[derive(Clone)]
pub struct AvStream {
    index: usize,
    parameters: Parameters,
    time_base: Rational,
    rate: Rational,
}

impl AvStream {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn time_base(&self) -> Rational {
        self.time_base
    }

    pub fn codec_id(&self) -> Option<CodecId> {
        from_codec_id(self.parameters.id())
    }

    fn raw(&self) -> &ffmpeg_next::ffi::AVCodecParameters {
        unsafe { &*(self.parameters.as_ptr() as *const ffmpeg_next::ffi::AVCodecParameters) }
    }

    pub fn width(&self) -> u32 {
        self.raw().width.max(0) as u32
    }

    pub fn height(&self) -> u32 {
        self.raw().height.max(0) as u32
    }

    pub fn fps(&self) -> f32 {
        if self.rate.denominator() == 0 {
            return 0.0;
        }
        self.rate.numerator() as f32 / self.rate.denominator() as f32
    }

    pub fn sample_rate(&self) -> u32 {
        self.raw().sample_rate.max(0) as u32
    }

    pub fn channels(&self) -> u32 {
        self.raw().ch_layout.nb_channels.max(0) as u32
    }

    /// Codec configuration record, if the container carried one.
    pub fn extradata(&self) -> Option<&[u8]> {
        let raw = self.raw();
        if raw.extradata.is_null() || raw.extradata_size <= 0 {
            return None;
        }
        unsafe {
            Some(std::slice::from_raw_parts(
                raw.extradata,
                raw.extradata_size as usize,
            ))
        }
    }

    /// Track description for the pipeline, or `None` for codecs it does not
    /// handle. H.264/H.265 configuration records are turned into Annex B
    /// parameter sets to match the payloads [`crate::input::AvInput`] emits.
    pub fn track(&self) -> Option<Track> {
        let codec = self.codec_id()?;
        let mut track = match codec.track_type() {
            lite_transcode::TrackType::Video => {
                Track::video(codec, self.width(), self.height(), self.fps())
            }
            lite_transcode::TrackType::Audio => {
                Track::audio(codec, self.sample_rate(), self.channels())
            }
        };
        let extradata = self.extradata();
        let annexb = AnnexB::new(codec, extradata);
        if let Some(sets) = annexb.parameter_sets() {
            track.extra_data = Some(sets.clone());
        } else if let Some(data) = extradata {
            track.extra_data = Some(bytes::Bytes::copy_from_slice(data));
        }
        Some(track)
    }
}

impl From<stream::Stream<'_>> for AvStream {
    fn from(stream: stream::Stream<'_>) -> Self {
        Self {
            index: stream.index(),
            parameters: stream.parameters(),
            time_base: stream.time_base(),
            rate: stream.avg_frame_rate(),
        }
    }
}
