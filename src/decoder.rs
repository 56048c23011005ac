use crate::{
    codec::{CodecId, TrackType},
    config::DEFAULT_POOL_SIZE,
    engine::{self, CodecEngine, DecodeContext, PacketView, Selection},
    error::{Error, Result},
    frame::{Frame, Track},
    pool::FramePool,
    raw::RawFrame,
};

pub type OnDecode<F> = Box<dyn FnMut(RawFrame<F>) -> Result<()> + Send>;

/// Decode stage bound to the codec of one source track.
pub struct Decoder<E: CodecEngine> {
    codec: CodecId,
    implementation: String,
    context: E::Decoder,
    pool: FramePool<E::Frame>,
    on_decode: Option<OnDecode<E::Frame>>,
}

impl<E: CodecEngine> Decoder<E> {
    pub fn new(engine: &E, track: &Track) -> Result<Self> {
        Self::with_pool_size(engine, track, DEFAULT_POOL_SIZE)
    }

    /// Opens the first implementation that works: the codec's preferred named
    /// decoders (hardware first), then the engine's generic decoder.
    pub fn with_pool_size(engine: &E, track: &Track, pool_size: usize) -> Result<Self> {
        let codec = track.codec_id();
        let (context, implementation) = match engine::select(
            codec,
            codec.info().decoders,
            |lookup| engine.find_decoder(lookup),
            |found| engine.open_decoder(found, track),
        ) {
            Selection::Opened {
                context,
                implementation,
            } => (context, implementation),
            Selection::Unavailable => return Err(Error::DecoderUnavailable { codec }),
            Selection::InitFailed {
                implementation,
                source,
            } => {
                return Err(Error::DecoderInitFailed {
                    codec,
                    implementation,
                    source,
                });
            }
        };

        Ok(Self {
            codec,
            implementation,
            context,
            pool: FramePool::new(pool_size),
            on_decode: None,
        })
    }

    pub fn codec_id(&self) -> CodecId {
        self.codec
    }

    pub fn track_type(&self) -> TrackType {
        self.codec.track_type()
    }

    pub fn implementation(&self) -> &str {
        &self.implementation
    }

    pub fn set_on_decode(
        &mut self,
        cb: impl FnMut(RawFrame<E::Frame>) -> Result<()> + Send + 'static,
    ) {
        self.on_decode = Some(Box::new(cb));
    }

    /// Decodes one frame. Decoder errors drop the frame; errors returned from
    /// the callback are passed back to the caller.
    pub fn input(&mut self, frame: &Frame) -> Result<()> {
        let packet = PacketView {
            data: &frame.data()[..],
            dts: frame.dts(),
            pts: frame.pts(),
        };

        let mut out = RawFrame::new(self.pool.obtain(), None);
        match self.context.decode(&packet, out.inner_mut()) {
            Ok(true) => {
                out.set_source_codec(frame.codec_id());
                self.deliver(out)
            }
            Ok(false) => Ok(()),
            Err(e) => {
                log::warn!(
                    "{} decode failed: {}, dropping frame dts: {}, size: {}",
                    self.codec,
                    e,
                    frame.dts(),
                    frame.size()
                );
                Ok(())
            }
        }
    }

    /// Pushes end of stream into the decoder and delivers every frame it was
    /// still holding.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            let mut out = RawFrame::new(self.pool.obtain(), Some(self.codec));
            match self.context.drain(out.inner_mut()) {
                Ok(true) => self.deliver(out)?,
                Ok(false) => return Ok(()),
                Err(e) => {
                    log::warn!("{} decoder flush failed: {}", self.codec, e);
                    return Ok(());
                }
            }
        }
    }

    fn deliver(&mut self, frame: RawFrame<E::Frame>) -> Result<()> {
        match self.on_decode.as_mut() {
            Some(cb) => cb(frame),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::mock::{MockEngine, MockFrame};

    fn collect(decoder: &mut Decoder<MockEngine>) -> Arc<Mutex<Vec<RawFrame<MockFrame>>>> {
        let out = Arc::new(Mutex::new(Vec::new()));
        let sink = out.clone();
        decoder.set_on_decode(move |frame| {
            sink.lock().unwrap().push(frame);
            Ok(())
        });
        out
    }

    #[test]
    fn test_decoder_unavailable() {
        let engine = MockEngine::new().without_decoder(CodecId::H265);
        let err = Decoder::new(&engine, &Track::new(CodecId::H265)).err();
        assert!(matches!(
            err,
            Some(Error::DecoderUnavailable {
                codec: CodecId::H265
            })
        ));
    }

    #[test]
    fn test_decoder_init_failed() {
        let engine = MockEngine::new().failing_decoder_open(CodecId::H265);
        let err = Decoder::new(&engine, &Track::new(CodecId::H265)).err();
        match err {
            Some(Error::DecoderInitFailed {
                codec,
                implementation,
                ..
            }) => {
                assert_eq!(codec, CodecId::H265);
                assert_eq!(implementation, "h265");
            }
            _ => panic!("expected DecoderInitFailed"),
        }
    }

    #[test]
    fn test_prefers_hardware_implementation() {
        let engine = MockEngine::new().with_decoder_name("hevc_cuvid");
        let decoder = Decoder::new(&engine, &Track::new(CodecId::H265)).unwrap();
        assert_eq!(decoder.implementation(), "hevc_cuvid");

        let engine = MockEngine::new();
        let decoder = Decoder::new(&engine, &Track::new(CodecId::H265)).unwrap();
        assert_eq!(decoder.implementation(), "h265");
    }

    #[test]
    fn test_companding_audio_decodes_like_any_codec() {
        let engine = MockEngine::new();
        for codec in [CodecId::G711A, CodecId::G711U] {
            let mut decoder = Decoder::new(&engine, &Track::audio(codec, 8000, 1)).unwrap();
            let out = collect(&mut decoder);
            decoder.input(&Frame::new(codec, 0, 0, vec![0xD5; 160])).unwrap();

            let frames = out.lock().unwrap();
            assert_eq!(frames.len(), 1);
            assert_eq!(frames[0].source_codec(), Some(codec));
            assert_eq!(frames[0].track_type(), TrackType::Audio);
            assert_eq!(frames[0].samples(), 160);
        }
    }

    #[test]
    fn test_decoded_frame_carries_provenance_and_timestamps() {
        let engine = MockEngine::new();
        let mut decoder = Decoder::new(&engine, &Track::new(CodecId::H265)).unwrap();
        let out = collect(&mut decoder);

        decoder
            .input(&Frame::new(CodecId::H265, 80, 120, vec![0, 0, 0, 1, 0x26, 0x01]))
            .unwrap();

        let frames = out.lock().unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].source_codec(), Some(CodecId::H265));
        assert_eq!(frames[0].pts(), Some(120));
        assert_eq!(frames[0].dts(), Some(80));
    }

    #[test]
    fn test_decode_failure_is_absorbed() {
        let engine = MockEngine::new();
        let mut decoder = Decoder::new(&engine, &Track::new(CodecId::H265)).unwrap();
        let out = collect(&mut decoder);

        decoder
            .input(&Frame::new(CodecId::H265, 0, 0, b"corrupt".to_vec()))
            .unwrap();
        assert!(out.lock().unwrap().is_empty());
        assert_eq!(engine.stats().decode_calls, 1);
    }

    #[test]
    fn test_buffering_decoder_and_flush() {
        let engine = MockEngine::new().decoder_delay(2);
        let mut decoder = Decoder::new(&engine, &Track::new(CodecId::H265)).unwrap();
        let out = collect(&mut decoder);

        for pts in [0, 40, 80, 120] {
            decoder
                .input(&Frame::new(CodecId::H265, pts, pts, vec![0, 0, 1, 0x02]))
                .unwrap();
        }
        // At most one frame per input, none until the lookahead is full.
        assert_eq!(out.lock().unwrap().len(), 2);

        decoder.flush().unwrap();
        let pts: Vec<_> = out.lock().unwrap().iter().map(|f| f.pts()).collect();
        assert_eq!(pts, vec![Some(0), Some(40), Some(80), Some(120)]);
    }

    #[test]
    fn test_callback_error_reaches_caller() {
        let engine = MockEngine::new();
        let mut decoder = Decoder::new(&engine, &Track::new(CodecId::H265)).unwrap();
        decoder.set_on_decode(|_| {
            Err(Error::TrackTypeMismatch {
                expected: TrackType::Audio,
                found: TrackType::Video,
            })
        });
        let err = decoder
            .input(&Frame::new(CodecId::H265, 0, 0, vec![0, 0, 1, 0x02]))
            .unwrap_err();
        assert!(matches!(err, Error::TrackTypeMismatch { .. }));
    }

    #[test]
    fn test_pool_is_reused_across_frames() {
        let engine = MockEngine::new();
        let mut decoder = Decoder::new(&engine, &Track::new(CodecId::H265)).unwrap();
        decoder.set_on_decode(|_| Ok(()));

        for pts in 0..20 {
            decoder
                .input(&Frame::new(CodecId::H265, pts, pts, vec![0, 0, 1, 0x02]))
                .unwrap();
        }
        assert_eq!(decoder.pool.available(), 1);
        assert_eq!(engine.stats().decode_calls, 20);
    }
}
