use std::sync::Arc;

use crate::{
    codec::PixelFormat,
    config::DEFAULT_POOL_SIZE,
    engine::{CodecEngine, ConvertContext, EngineFrame},
    pool::FramePool,
    raw::RawFrame,
};

/// Input layout a conversion context was built for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Geometry {
    source: PixelFormat,
    width: u32,
    height: u32,
}

enum State<C> {
    Idle,
    Ready { context: C, geometry: Geometry },
    /// The engine refused this geometry; frames pass through unconverted.
    Failed { geometry: Geometry },
}

/// Pixel format converter in front of a video encoder.
///
/// The target format is fixed at construction. The engine context is created
/// from the first frame that needs converting, and rebuilt whenever the input
/// format or dimensions change.
pub struct FormatConverter<E: CodecEngine> {
    engine: Arc<E>,
    target: PixelFormat,
    state: State<E::Converter>,
    pool: FramePool<E::Frame>,
}

impl<E: CodecEngine> FormatConverter<E> {
    pub fn new(engine: Arc<E>, target: PixelFormat) -> Self {
        Self::with_pool_size(engine, target, DEFAULT_POOL_SIZE)
    }

    pub fn with_pool_size(engine: Arc<E>, target: PixelFormat, pool_size: usize) -> Self {
        Self {
            engine,
            target,
            state: State::Idle,
            pool: FramePool::new(pool_size),
        }
    }

    pub fn target(&self) -> PixelFormat {
        self.target
    }

    pub fn is_initialized(&self) -> bool {
        matches!(self.state, State::Ready { .. })
    }

    /// Converts `frame` to the target format.
    ///
    /// Frames already in the target format, audio frames, and frames the engine
    /// cannot convert are returned as they came in.
    pub fn convert(&mut self, frame: RawFrame<E::Frame>) -> RawFrame<E::Frame> {
        let Some(source) = frame.pixel_format() else {
            return frame;
        };
        if source == self.target {
            return frame;
        }

        let geometry = Geometry {
            source,
            width: frame.width(),
            height: frame.height(),
        };
        if !self.prepare(geometry) {
            return frame;
        }
        let State::Ready { context, .. } = &mut self.state else {
            return frame;
        };

        let mut out = RawFrame::new(self.pool.obtain(), frame.source_codec());
        if let Err(e) = context.convert(frame.inner(), out.inner_mut()) {
            log::warn!(
                "convert {:?} -> {:?} failed: {}, passing frame through",
                source,
                self.target,
                e
            );
            return frame;
        }
        let dst = out.inner_mut();
        dst.set_pts(frame.pts());
        dst.set_dts(frame.dts());
        out
    }

    /// Makes sure a context exists for `geometry`. Returns `false` when frames
    /// of this geometry must pass through unconverted.
    fn prepare(&mut self, geometry: Geometry) -> bool {
        match &self.state {
            State::Ready { geometry: current, .. } if *current == geometry => return true,
            State::Failed { geometry: current } if *current == geometry => return false,
            State::Ready { geometry: current, .. } => {
                log::info!(
                    "converter input changed from {:?} {}x{} to {:?} {}x{}, rebuilding",
                    current.source,
                    current.width,
                    current.height,
                    geometry.source,
                    geometry.width,
                    geometry.height
                );
            }
            _ => {}
        }

        match self.engine.open_converter(
            geometry.source,
            self.target,
            geometry.width,
            geometry.height,
        ) {
            Ok(context) => {
                log::debug!(
                    "converter ready: {:?} -> {:?} at {}x{}",
                    geometry.source,
                    self.target,
                    geometry.width,
                    geometry.height
                );
                self.state = State::Ready { context, geometry };
                true
            }
            Err(e) => {
                log::warn!(
                    "cannot convert {:?} -> {:?} at {}x{}: {}, frames pass through",
                    geometry.source,
                    self.target,
                    geometry.width,
                    geometry.height,
                    e
                );
                self.state = State::Failed { geometry };
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        codec::CodecId,
        mock::{MockEngine, MockFrame},
    };

    fn video_frame(
        pool: &FramePool<MockFrame>,
        format: PixelFormat,
        width: u32,
        height: u32,
    ) -> RawFrame<MockFrame> {
        let mut frame = RawFrame::new(pool.obtain(), Some(CodecId::H265));
        let inner = frame.inner_mut();
        inner.pixel = Some(format);
        inner.width = width;
        inner.height = height;
        inner.pts = Some(3600);
        inner.dts = Some(3000);
        inner.data.extend_from_slice(&[1, 2, 3, 4]);
        frame
    }

    #[test]
    fn test_same_format_passes_through() {
        let engine = Arc::new(MockEngine::new());
        let pool = FramePool::new(2);
        let mut converter = FormatConverter::new(engine.clone(), PixelFormat::Yuv420p);

        let frame = video_frame(&pool, PixelFormat::Yuv420p, 640, 480);
        let out = converter.convert(frame);
        assert_eq!(out.pixel_format(), Some(PixelFormat::Yuv420p));
        assert_eq!(out.inner().data, vec![1, 2, 3, 4]);
        assert!(!converter.is_initialized());
        assert_eq!(engine.stats().converters_opened, 0);
        assert_eq!(engine.stats().convert_calls, 0);
    }

    #[test]
    fn test_converts_and_propagates_metadata() {
        let engine = Arc::new(MockEngine::new());
        let pool = FramePool::new(2);
        let mut converter = FormatConverter::new(engine.clone(), PixelFormat::Yuv420p);

        let out = converter.convert(video_frame(&pool, PixelFormat::Nv12, 640, 480));
        assert_eq!(out.pixel_format(), Some(PixelFormat::Yuv420p));
        assert_eq!((out.width(), out.height()), (640, 480));
        assert_eq!(out.pts(), Some(3600));
        assert_eq!(out.dts(), Some(3000));
        assert_eq!(out.source_codec(), Some(CodecId::H265));
        assert!(converter.is_initialized());

        // Converting the converted frame again is a no-op.
        let again = converter.convert(out);
        assert_eq!(again.pixel_format(), Some(PixelFormat::Yuv420p));
        assert_eq!(engine.stats().convert_calls, 1);
        assert_eq!(engine.stats().converters_opened, 1);
    }

    #[test]
    fn test_context_is_reused_for_same_geometry() {
        let engine = Arc::new(MockEngine::new());
        let pool = FramePool::new(2);
        let mut converter = FormatConverter::new(engine.clone(), PixelFormat::Yuv420p);

        for _ in 0..5 {
            converter.convert(video_frame(&pool, PixelFormat::Rgb24, 320, 240));
        }
        assert_eq!(engine.stats().converters_opened, 1);
        assert_eq!(engine.stats().convert_calls, 5);
    }

    #[test]
    fn test_geometry_change_rebuilds_context() {
        let engine = Arc::new(MockEngine::new());
        let pool = FramePool::new(2);
        let mut converter = FormatConverter::new(engine.clone(), PixelFormat::Yuv420p);

        converter.convert(video_frame(&pool, PixelFormat::Nv12, 640, 480));
        let out = converter.convert(video_frame(&pool, PixelFormat::Nv12, 1280, 720));
        assert_eq!((out.width(), out.height()), (1280, 720));
        assert_eq!(engine.stats().converters_opened, 2);
        assert_eq!(converter.target(), PixelFormat::Yuv420p);
    }

    #[test]
    fn test_unsupported_pair_passes_original_through() {
        let engine = Arc::new(MockEngine::new().reject_conversion(PixelFormat::Bgra));
        let pool = FramePool::new(2);
        let mut converter = FormatConverter::new(engine.clone(), PixelFormat::Yuv420p);

        let out = converter.convert(video_frame(&pool, PixelFormat::Bgra, 640, 480));
        assert_eq!(out.pixel_format(), Some(PixelFormat::Bgra));
        assert_eq!(out.inner().data, vec![1, 2, 3, 4]);

        // The failure is remembered instead of retried per frame.
        converter.convert(video_frame(&pool, PixelFormat::Bgra, 640, 480));
        assert_eq!(engine.stats().converter_open_attempts, 1);
        assert!(!converter.is_initialized());
    }
}
