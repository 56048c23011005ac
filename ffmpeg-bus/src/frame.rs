use ffmpeg_next::frame::{Audio, Video};
use lite_transcode::{EngineFrame, PixelFormat, Recycle, SampleFormat};

use crate::format::{from_pixel, from_sample};

/// Decoded FFmpeg frame as it travels between the pipeline's stages. Holds at
/// most one of a video or an audio frame.
#[derive(Default)]
pub struct AvFrame {
    video: Option<Video>,
    audio: Option<Audio>,
}

unsafe impl Send for AvFrame {}

impl AvFrame {
    pub fn video_mut(&mut self) -> &mut Video {
        self.audio = None;
        self.video.get_or_insert_with(Video::empty)
    }

    pub fn audio_mut(&mut self) -> &mut Audio {
        self.video = None;
        self.audio.get_or_insert_with(Audio::empty)
    }

    /// Drops the current video frame so the next writer allocates a fresh one.
    pub fn reset_video(&mut self) {
        self.video = None;
    }

    pub fn as_video(&self) -> Option<&Video> {
        self.video.as_ref()
    }

    pub fn as_audio(&self) -> Option<&Audio> {
        self.audio.as_ref()
    }

    fn as_ptr(&self) -> Option<*const ffmpeg_next::ffi::AVFrame> {
        match (&self.video, &self.audio) {
            (Some(frame), _) => Some(unsafe { frame.as_ptr() }),
            (_, Some(frame)) => Some(unsafe { frame.as_ptr() }),
            _ => None,
        }
    }

    fn as_mut_ptr(&mut self) -> Option<*mut ffmpeg_next::ffi::AVFrame> {
        match (&mut self.video, &mut self.audio) {
            (Some(frame), _) => Some(unsafe { frame.as_mut_ptr() }),
            (_, Some(frame)) => Some(unsafe { frame.as_mut_ptr() }),
            _ => None,
        }
    }
}

impl Recycle for AvFrame {
    /// Buffers stay attached so converters can write into them again; the
    /// decoder unreferences its output frame itself on every receive.
    fn recycle(&mut self) {
        self.set_pts(None);
        self.set_dts(None);
    }
}

impl EngineFrame for AvFrame {
    fn pixel_format(&self) -> Option<PixelFormat> {
        self.as_video().and_then(|frame| from_pixel(frame.format()))
    }

    fn sample_format(&self) -> Option<SampleFormat> {
        self.as_audio().and_then(|frame| from_sample(frame.format()))
    }

    fn width(&self) -> u32 {
        self.as_video().map(|frame| frame.width()).unwrap_or(0)
    }

    fn height(&self) -> u32 {
        self.as_video().map(|frame| frame.height()).unwrap_or(0)
    }

    fn sample_rate(&self) -> u32 {
        self.as_audio().map(|frame| frame.rate()).unwrap_or(0)
    }

    fn channels(&self) -> u32 {
        match self.as_audio() {
            Some(frame) => unsafe { (*frame.as_ptr()).ch_layout.nb_channels.max(0) as u32 },
            None => 0,
        }
    }

    fn samples(&self) -> usize {
        self.as_audio().map(|frame| frame.samples()).unwrap_or(0)
    }

    fn pts(&self) -> Option<i64> {
        match (&self.video, &self.audio) {
            (Some(frame), _) => frame.pts(),
            (_, Some(frame)) => frame.pts(),
            _ => None,
        }
    }

    fn set_pts(&mut self, pts: Option<i64>) {
        if let Some(frame) = self.video.as_mut() {
            frame.set_pts(pts);
        }
        if let Some(frame) = self.audio.as_mut() {
            frame.set_pts(pts);
        }
    }

    fn dts(&self) -> Option<i64> {
        let ptr = self.as_ptr()?;
        let dts = unsafe { (*ptr).pkt_dts };
        (dts != ffmpeg_next::ffi::AV_NOPTS_VALUE).then_some(dts)
    }

    fn set_dts(&mut self, dts: Option<i64>) {
        if let Some(ptr) = self.as_mut_ptr() {
            unsafe {
                (*ptr).pkt_dts = dts.unwrap_or(ffmpeg_next::ffi::AV_NOPTS_VALUE);
            }
        }
    }
}
