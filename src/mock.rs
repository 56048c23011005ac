//! In-memory engine used by the unit tests. Decoding copies the payload into
//! the frame buffer, encoding prefixes it with an Annex B header, conversion
//! relabels the pixel format.

use std::{
    collections::VecDeque,
    fmt::{Display, Formatter},
    sync::{Arc, Mutex},
};

use bytes::Bytes;

use crate::{
    codec::{CodecId, PixelFormat, SampleFormat, TrackType},
    encoder::EncoderSettings,
    engine::{
        CodecEngine, ConvertContext, DecodeContext, EncodeContext, EncodedPacket, EngineFrame,
        Lookup, PacketView,
    },
    error::Result,
    frame::{Frame, Track},
    pool::Recycle,
    sink::MediaSink,
};

const CORRUPT: &[u8] = b"corrupt";

#[derive(Debug, Default, Clone)]
pub struct MockFrame {
    pub pixel: Option<PixelFormat>,
    pub sample: Option<SampleFormat>,
    pub width: u32,
    pub height: u32,
    pub sample_rate: u32,
    pub channels: u32,
    pub samples: usize,
    pub pts: Option<i64>,
    pub dts: Option<i64>,
    pub data: Vec<u8>,
}

impl Recycle for MockFrame {
    fn recycle(&mut self) {
        let mut data = std::mem::take(&mut self.data);
        data.clear();
        *self = MockFrame {
            data,
            ..Default::default()
        };
    }
}

impl EngineFrame for MockFrame {
    fn pixel_format(&self) -> Option<PixelFormat> {
        self.pixel
    }

    fn sample_format(&self) -> Option<SampleFormat> {
        self.sample
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u32 {
        self.channels
    }

    fn samples(&self) -> usize {
        self.samples
    }

    fn pts(&self) -> Option<i64> {
        self.pts
    }

    fn set_pts(&mut self, pts: Option<i64>) {
        self.pts = pts;
    }

    fn dts(&self) -> Option<i64> {
        self.dts
    }

    fn set_dts(&mut self, dts: Option<i64>) {
        self.dts = dts;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MockCodec {
    pub id: CodecId,
    pub name: String,
}

impl Display for MockCodec {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Stats {
    pub decoders_opened: usize,
    pub encoders_opened: usize,
    pub decode_calls: usize,
    pub encode_calls: usize,
    pub converter_open_attempts: usize,
    pub converters_opened: usize,
    pub convert_calls: usize,
}

pub struct MockEngine {
    decoder_names: Vec<&'static str>,
    encoder_names: Vec<&'static str>,
    missing_decoders: Vec<CodecId>,
    missing_encoders: Vec<CodecId>,
    failing_decoders: Vec<CodecId>,
    failing_encoders: Vec<CodecId>,
    rejected_conversions: Vec<PixelFormat>,
    encoder_formats: Vec<PixelFormat>,
    decoder_output: PixelFormat,
    decoder_delay: usize,
    encoder_delay: usize,
    stats: Arc<Mutex<Stats>>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self {
            decoder_names: Vec::new(),
            encoder_names: vec!["libx264", "libx265", "libopus"],
            missing_decoders: Vec::new(),
            missing_encoders: Vec::new(),
            failing_decoders: Vec::new(),
            failing_encoders: Vec::new(),
            rejected_conversions: Vec::new(),
            encoder_formats: vec![PixelFormat::Yuv420p],
            decoder_output: PixelFormat::Yuv420p,
            decoder_delay: 0,
            encoder_delay: 0,
            stats: Arc::new(Mutex::new(Stats::default())),
        }
    }

    pub fn with_decoder_name(mut self, name: &'static str) -> Self {
        self.decoder_names.push(name);
        self
    }

    pub fn without_decoder(mut self, codec: CodecId) -> Self {
        self.missing_decoders.push(codec);
        self
    }

    pub fn without_encoder(mut self, codec: CodecId) -> Self {
        self.missing_encoders.push(codec);
        self
    }

    pub fn failing_decoder_open(mut self, codec: CodecId) -> Self {
        self.failing_decoders.push(codec);
        self
    }

    pub fn failing_encoder_open(mut self, codec: CodecId) -> Self {
        self.failing_encoders.push(codec);
        self
    }

    pub fn reject_conversion(mut self, source: PixelFormat) -> Self {
        self.rejected_conversions.push(source);
        self
    }

    pub fn encoder_formats(mut self, formats: &[PixelFormat]) -> Self {
        self.encoder_formats = formats.to_vec();
        self
    }

    /// Pixel format of decoded video frames.
    pub fn decoder_output(mut self, format: PixelFormat) -> Self {
        self.decoder_output = format;
        self
    }

    /// Packets a decoder holds back before producing its first frame.
    pub fn decoder_delay(mut self, frames: usize) -> Self {
        self.decoder_delay = frames;
        self
    }

    pub fn encoder_delay(mut self, frames: usize) -> Self {
        self.encoder_delay = frames;
        self
    }

    pub fn stats(&self) -> Stats {
        self.stats.lock().unwrap().clone()
    }

    fn lookup(
        lookup: Lookup<'_>,
        names: &[&'static str],
        missing: &[CodecId],
        listed: impl Fn(CodecId) -> &'static [&'static str],
    ) -> Option<MockCodec> {
        let (id, name) = match lookup {
            Lookup::Name(name) => {
                if !names.contains(&name) {
                    return None;
                }
                let id = CodecId::ALL
                    .into_iter()
                    .find(|codec| listed(*codec).contains(&name))?;
                (id, name.to_string())
            }
            Lookup::Id(id) => (id, id.name().to_string()),
        };
        (!missing.contains(&id)).then_some(MockCodec { id, name })
    }
}

impl CodecEngine for MockEngine {
    type Frame = MockFrame;
    type Codec = MockCodec;
    type Decoder = MockDecoder;
    type Encoder = MockEncoder;
    type Converter = MockConverter;

    fn find_decoder(&self, lookup: Lookup<'_>) -> Option<MockCodec> {
        Self::lookup(lookup, &self.decoder_names, &self.missing_decoders, |c| {
            c.info().decoders
        })
    }

    fn find_encoder(&self, lookup: Lookup<'_>) -> Option<MockCodec> {
        Self::lookup(lookup, &self.encoder_names, &self.missing_encoders, |c| {
            c.info().encoders
        })
    }

    fn open_decoder(&self, codec: &MockCodec, track: &Track) -> anyhow::Result<MockDecoder> {
        if self.failing_decoders.contains(&codec.id) {
            anyhow::bail!("{} refused to open", codec);
        }
        self.stats.lock().unwrap().decoders_opened += 1;
        Ok(MockDecoder {
            codec: codec.id,
            track: track.clone(),
            output: self.decoder_output,
            delay: self.decoder_delay,
            queue: VecDeque::new(),
            eof: false,
            stats: self.stats.clone(),
        })
    }

    fn open_encoder(
        &self,
        codec: &MockCodec,
        settings: &EncoderSettings,
    ) -> anyhow::Result<MockEncoder> {
        if self.failing_encoders.contains(&codec.id) {
            anyhow::bail!("{} refused to open", codec);
        }
        self.stats.lock().unwrap().encoders_opened += 1;
        Ok(MockEncoder {
            track_type: settings.track_type(),
            formats: self.encoder_formats.clone(),
            delay: self.encoder_delay,
            queue: VecDeque::new(),
            emitted: 0,
            eof: false,
            stats: self.stats.clone(),
        })
    }

    fn open_converter(
        &self,
        source: PixelFormat,
        target: PixelFormat,
        _width: u32,
        _height: u32,
    ) -> anyhow::Result<MockConverter> {
        let mut stats = self.stats.lock().unwrap();
        stats.converter_open_attempts += 1;
        if self.rejected_conversions.contains(&source) {
            anyhow::bail!("unsupported conversion {:?} -> {:?}", source, target);
        }
        stats.converters_opened += 1;
        Ok(MockConverter {
            target,
            stats: self.stats.clone(),
        })
    }
}

pub struct MockDecoder {
    codec: CodecId,
    track: Track,
    output: PixelFormat,
    delay: usize,
    queue: VecDeque<(Vec<u8>, i64, i64)>,
    eof: bool,
    stats: Arc<Mutex<Stats>>,
}

impl MockDecoder {
    fn fill(&self, (data, dts, pts): (Vec<u8>, i64, i64), out: &mut MockFrame) {
        match self.codec.track_type() {
            TrackType::Video => {
                out.pixel = Some(self.output);
                out.width = if self.track.width > 0 { self.track.width } else { 640 };
                out.height = if self.track.height > 0 { self.track.height } else { 480 };
            }
            TrackType::Audio => {
                out.sample = Some(SampleFormat::S16);
                out.sample_rate = self.track.sample_rate.max(8000);
                out.channels = self.track.channels.max(1);
                out.samples = data.len();
            }
        }
        out.pts = Some(pts);
        out.dts = Some(dts);
        out.data = data;
    }
}

impl DecodeContext<MockFrame> for MockDecoder {
    fn decode(&mut self, packet: &PacketView<'_>, out: &mut MockFrame) -> anyhow::Result<bool> {
        self.stats.lock().unwrap().decode_calls += 1;
        if self.eof {
            anyhow::bail!("end of file");
        }
        if packet.data == CORRUPT {
            anyhow::bail!("invalid data found when processing input");
        }
        self.queue
            .push_back((packet.data.to_vec(), packet.dts, packet.pts));
        if self.queue.len() <= self.delay {
            return Ok(false);
        }
        match self.queue.pop_front() {
            Some(entry) => {
                self.fill(entry, out);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn drain(&mut self, out: &mut MockFrame) -> anyhow::Result<bool> {
        self.eof = true;
        match self.queue.pop_front() {
            Some(entry) => {
                self.fill(entry, out);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

pub struct MockEncoder {
    track_type: TrackType,
    formats: Vec<PixelFormat>,
    delay: usize,
    queue: VecDeque<(Vec<u8>, Option<i64>, Option<i64>)>,
    emitted: usize,
    eof: bool,
    stats: Arc<Mutex<Stats>>,
}

impl MockEncoder {
    fn packet(&mut self, (data, pts, dts): (Vec<u8>, Option<i64>, Option<i64>)) -> EncodedPacket {
        let key = self.emitted == 0;
        self.emitted += 1;
        let payload = match self.track_type {
            TrackType::Video => {
                let mut payload = vec![0, 0, 0, 1, if key { 0x65 } else { 0x41 }];
                payload.extend_from_slice(&data);
                payload
            }
            TrackType::Audio => data,
        };
        EncodedPacket {
            data: Bytes::from(payload),
            pts,
            dts,
        }
    }
}

impl EncodeContext<MockFrame> for MockEncoder {
    fn supported_pixel_formats(&self) -> Vec<PixelFormat> {
        match self.track_type {
            TrackType::Video => self.formats.clone(),
            TrackType::Audio => Vec::new(),
        }
    }

    fn encode(&mut self, frame: &MockFrame) -> anyhow::Result<Option<EncodedPacket>> {
        self.stats.lock().unwrap().encode_calls += 1;
        if self.eof {
            anyhow::bail!("end of file");
        }
        if frame.data == CORRUPT {
            anyhow::bail!("error while encoding frame");
        }
        self.queue
            .push_back((frame.data.clone(), frame.pts, frame.dts));
        if self.queue.len() <= self.delay {
            return Ok(None);
        }
        Ok(self.queue.pop_front().map(|entry| self.packet(entry)))
    }

    fn drain(&mut self) -> anyhow::Result<Option<EncodedPacket>> {
        self.eof = true;
        Ok(self.queue.pop_front().map(|entry| self.packet(entry)))
    }
}

pub struct MockConverter {
    target: PixelFormat,
    stats: Arc<Mutex<Stats>>,
}

impl ConvertContext<MockFrame> for MockConverter {
    fn convert(&mut self, src: &MockFrame, dst: &mut MockFrame) -> anyhow::Result<()> {
        self.stats.lock().unwrap().convert_calls += 1;
        dst.pixel = Some(self.target);
        dst.width = src.width;
        dst.height = src.height;
        dst.data.clear();
        dst.data.extend_from_slice(&src.data);
        Ok(())
    }
}

/// Sink that records every call it receives.
#[derive(Default)]
pub struct RecordingSink {
    pub tracks: Mutex<Vec<Track>>,
    pub frames: Mutex<Vec<Frame>>,
    pub completed: Mutex<usize>,
    pub resets: Mutex<usize>,
}

impl RecordingSink {
    pub fn tracks(&self) -> Vec<Track> {
        self.tracks.lock().unwrap().clone()
    }

    pub fn frames(&self) -> Vec<Frame> {
        self.frames.lock().unwrap().clone()
    }
}

impl MediaSink for RecordingSink {
    fn add_track(&self, track: &Track) -> Result<()> {
        self.tracks.lock().unwrap().push(track.clone());
        Ok(())
    }

    fn input_frame(&self, frame: &Frame) -> Result<()> {
        self.frames.lock().unwrap().push(frame.clone());
        Ok(())
    }

    fn add_track_completed(&self) {
        *self.completed.lock().unwrap() += 1;
    }

    fn reset_tracks(&self) {
        *self.resets.lock().unwrap() += 1;
    }
}
