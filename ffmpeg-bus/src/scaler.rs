use ffmpeg_next::{
    format::Pixel,
    software::scaling::{Context, flag::Flags},
};
use lite_transcode::ConvertContext;

use crate::frame::AvFrame;

/// swscale context converting between pixel formats at a fixed geometry.
pub struct Scaler {
    context: Context,
    target: Pixel,
    width: u32,
    height: u32,
}

impl Scaler {
    pub fn new(source: Pixel, target: Pixel, width: u32, height: u32) -> anyhow::Result<Self> {
        let context = Context::get(source, width, height, target, width, height, Flags::BILINEAR)?;
        Ok(Self {
            context,
            target,
            width,
            height,
        })
    }
}

unsafe impl Send for Scaler {}

impl ConvertContext<AvFrame> for Scaler {
    fn convert(&mut self, src: &AvFrame, dst: &mut AvFrame) -> anyhow::Result<()> {
        let Some(frame) = src.as_video() else {
            anyhow::bail!("scaler fed a non-video frame");
        };

        // A pooled frame keeps its buffer. Reallocate when it no longer fits or
        // an encoder still holds a reference to it.
        let reusable = dst.as_video().is_some_and(|out| {
            out.format() == self.target
                && out.width() == self.width
                && out.height() == self.height
                && unsafe { ffmpeg_next::ffi::av_frame_is_writable(out.as_ptr() as *mut _) } != 0
        });
        if !reusable {
            dst.reset_video();
        }
        self.context.run(frame, dst.video_mut())?;
        Ok(())
    }
}
