use std::collections::VecDeque;

use bytes::Bytes;
use ffmpeg_next::{
    Codec, Dictionary, Rational, Rescale,
    codec::{Capabilities, packet::Packet},
    format::{Pixel, Sample},
    frame::Audio,
    software::resampling,
};
use lite_transcode::{
    EncodeContext, EncodedPacket, EncoderSettings, EngineFrame, PixelFormat, TrackType,
};

use crate::{
    decoder::MILLIS,
    fifo::AudioFifo,
    format::{from_pixel, to_pixel, to_sample},
    frame::AvFrame,
    hw::is_hardware,
    util::{channel_layout, is_again},
};

pub enum EncoderType {
    Video(ffmpeg_next::codec::encoder::Video),
    Audio(ffmpeg_next::codec::encoder::Audio),
}

impl EncoderType {
    fn send_eof(&mut self) -> anyhow::Result<()> {
        match self {
            EncoderType::Video(encoder) => encoder.send_eof()?,
            EncoderType::Audio(encoder) => encoder.send_eof()?,
        }
        Ok(())
    }

    fn receive_packet(&mut self, packet: &mut Packet) -> Result<(), ffmpeg_next::Error> {
        match self {
            EncoderType::Video(encoder) => encoder.receive_packet(packet),
            EncoderType::Audio(encoder) => encoder.receive_packet(packet),
        }
    }

    fn send_audio(&mut self, frame: &Audio) -> anyhow::Result<()> {
        let EncoderType::Audio(encoder) = self else {
            anyhow::bail!("audio frame sent to a video encoder");
        };
        encoder.send_frame(frame)?;
        Ok(())
    }

    /// Moves every packet the encoder has ready into `pending`, with
    /// timestamps rescaled from `time_base` to milliseconds.
    fn collect_packets(
        &mut self,
        time_base: Rational,
        pending: &mut VecDeque<EncodedPacket>,
    ) -> anyhow::Result<()> {
        loop {
            let mut packet = Packet::empty();
            match self.receive_packet(&mut packet) {
                Ok(()) => {
                    packet.rescale_ts(time_base, MILLIS);
                    pending.push_back(EncodedPacket {
                        data: packet.data().map(Bytes::copy_from_slice).unwrap_or_default(),
                        pts: packet.pts(),
                        dts: packet.dts(),
                    });
                }
                Err(ffmpeg_next::Error::Eof) => return Ok(()),
                Err(err) if is_again(&err) => return Ok(()),
                Err(err) => return Err(err.into()),
            }
        }
    }
}

fn frame_channels(frame: &Audio) -> u32 {
    unsafe { (*frame.as_ptr()).ch_layout.nb_channels.max(1) as u32 }
}

fn encoder_channels(encoder: &ffmpeg_next::codec::encoder::Audio) -> u32 {
    unsafe { (*encoder.as_ptr()).ch_layout.nb_channels.max(1) as u32 }
}

/// Encoder options applied when opening, unless the caller supplies its own.
fn default_options(name: &str) -> Dictionary<'static> {
    let mut options = Dictionary::new();
    match name {
        "libx264" | "libx265" => {
            options.set("preset", "ultrafast");
            options.set("tune", "zerolatency");
        }
        name if name.ends_with("_nvenc") => {
            options.set("preset", "p1");
            options.set("tune", "ll");
        }
        _ => {}
    }
    options
}

/// Audio input layout the resampler was built for.
#[derive(Clone, Copy, PartialEq)]
struct AudioLayout {
    format: Sample,
    rate: u32,
    channels: u32,
}

/// FFmpeg encoder opened for one target codec.
pub struct Encoder {
    name: String,
    inner: EncoderType,
    time_base: Rational,
    pixel_format: Option<Pixel>,
    resampler: Option<(AudioLayout, resampling::Context)>,
    /// Set for encoders that only take `frame_size` samples per frame.
    fifo: Option<AudioFifo>,
    frame_size: usize,
    pending: VecDeque<EncodedPacket>,
    eof_sent: bool,
}

unsafe impl Send for Encoder {}

impl Encoder {
    pub fn new(
        codec: Codec,
        settings: &EncoderSettings,
        options: Option<Dictionary>,
    ) -> anyhow::Result<Self> {
        let name = codec.name().to_string();
        let mut options = options.unwrap_or_else(|| default_options(&name));
        if let Some(profile) = settings.profile.as_deref() {
            options.set("profile", profile);
        }
        let time_base = Rational(settings.time_base.0, settings.time_base.1);
        let context = ffmpeg_next::codec::Context::new_with_codec(codec);

        let mut fifo = None;
        let mut frame_size = 0;
        let (inner, pixel_format) = match settings.track_type() {
            TrackType::Video => {
                let format = Self::choose_pixel_format(codec, &name, settings.pixel_format)?;
                let mut encoder = context.encoder().video()?;
                encoder.set_width(settings.width);
                encoder.set_height(settings.height);
                encoder.set_format(format);
                encoder.set_time_base(time_base);
                encoder.set_frame_rate(Some(Rational(settings.frame_rate.max(1) as i32, 1)));
                encoder.set_gop(settings.gop_size);
                encoder.set_max_b_frames(settings.max_b_frames as usize);
                encoder.set_bit_rate(settings.bit_rate);
                let encoder = encoder.open_as_with(codec, options)?;
                (EncoderType::Video(encoder), Some(format))
            }
            TrackType::Audio => {
                let mut encoder = context.encoder().audio()?;
                encoder.set_rate(settings.sample_rate as i32);
                encoder.set_format(to_sample(settings.sample_format));
                encoder.set_channel_layout(channel_layout(settings.channels));
                encoder.set_time_base(time_base);
                encoder.set_bit_rate(settings.bit_rate);
                let encoder = encoder.open_as_with(codec, options)?;

                let variable = codec
                    .capabilities()
                    .contains(Capabilities::VARIABLE_FRAME_SIZE);
                frame_size = encoder.frame_size() as usize;
                if frame_size > 0 && !variable {
                    log::debug!("{} takes {} samples per frame", name, frame_size);
                    fifo = Some(AudioFifo::new(
                        encoder.format(),
                        encoder.rate(),
                        encoder_channels(&encoder),
                        time_base,
                    ));
                }
                (EncoderType::Audio(encoder), None)
            }
        };

        log::info!(
            "{} encoder opened: {}, time base {}/{}",
            settings.codec,
            name,
            time_base.0,
            time_base.1
        );
        Ok(Self {
            name,
            inner,
            time_base,
            pixel_format,
            resampler: None,
            fifo,
            frame_size,
            pending: VecDeque::new(),
            eof_sent: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The requested format if the codec lists it, otherwise the codec's first
    /// format. Hardware encoders get NV12 when they take it.
    fn choose_pixel_format(
        codec: Codec,
        name: &str,
        wanted: PixelFormat,
    ) -> anyhow::Result<Pixel> {
        let wanted = to_pixel(wanted);
        let formats: Vec<Pixel> = codec
            .video()?
            .formats()
            .map(|formats| formats.collect())
            .unwrap_or_default();
        if formats.is_empty() || formats.contains(&wanted) {
            return Ok(wanted);
        }
        if is_hardware(name) && formats.contains(&Pixel::NV12) {
            return Ok(Pixel::NV12);
        }
        Ok(formats[0])
    }

    /// Brings an audio frame to the encoder's sample layout.
    fn resample(&mut self, frame: &Audio) -> anyhow::Result<Option<Audio>> {
        let EncoderType::Audio(encoder) = &self.inner else {
            return Ok(None);
        };
        let target = AudioLayout {
            format: encoder.format(),
            rate: encoder.rate(),
            channels: encoder_channels(encoder),
        };
        let source = AudioLayout {
            format: frame.format(),
            rate: frame.rate(),
            channels: frame_channels(frame),
        };
        if source == target {
            return Ok(None);
        }

        if self.resampler.as_ref().map(|(layout, _)| *layout) != Some(source) {
            log::info!(
                "{} resampling {:?} {} Hz {} ch -> {:?} {} Hz {} ch",
                self.name,
                source.format,
                source.rate,
                source.channels,
                target.format,
                target.rate,
                target.channels
            );
            let context = resampling::Context::get(
                source.format,
                channel_layout(source.channels),
                source.rate,
                target.format,
                channel_layout(target.channels),
                target.rate,
            )?;
            self.resampler = Some((source, context));
        }
        let Some((_, context)) = self.resampler.as_mut() else {
            return Ok(None);
        };

        // Room for the rate change plus what the resampler still holds back.
        let capacity = (frame.samples() as i64)
            .rescale(Rational(1, source.rate as i32), Rational(1, target.rate as i32))
            as usize
            + 256;
        let mut out = Audio::new(target.format, capacity, channel_layout(target.channels));
        out.set_rate(target.rate);
        context.run(frame, &mut out)?;
        out.set_pts(frame.pts());
        Ok(Some(out))
    }

    /// Sends every full frame queued in the FIFO. With `flush` set, the last
    /// partial frame goes out zero padded.
    fn send_queued(&mut self, flush: bool) -> anyhow::Result<()> {
        let Self {
            inner,
            time_base,
            fifo,
            frame_size,
            pending,
            ..
        } = self;
        let Some(fifo) = fifo.as_mut() else {
            return Ok(());
        };
        while fifo.len() >= *frame_size || (flush && !fifo.is_empty()) {
            let frame = fifo.pop(*frame_size);
            inner.send_audio(&frame)?;
            inner.collect_packets(*time_base, pending)?;
        }
        Ok(())
    }
}

impl EncodeContext<AvFrame> for Encoder {
    /// An opened FFmpeg encoder takes exactly the format it was opened with.
    fn supported_pixel_formats(&self) -> Vec<PixelFormat> {
        self.pixel_format.and_then(from_pixel).into_iter().collect()
    }

    fn encode(&mut self, frame: &AvFrame) -> anyhow::Result<Option<EncodedPacket>> {
        let pts = frame.pts().map(|ts| ts.rescale(MILLIS, self.time_base));
        let retimed = pts != frame.pts();
        match (frame.as_video(), frame.as_audio()) {
            (Some(video), _) => {
                let EncoderType::Video(encoder) = &mut self.inner else {
                    anyhow::bail!("video frame sent to an audio encoder");
                };
                if retimed {
                    let mut video = video.clone();
                    video.set_pts(pts);
                    encoder.send_frame(&video)?;
                } else {
                    encoder.send_frame(video)?;
                }
                self.inner.collect_packets(self.time_base, &mut self.pending)?;
            }
            (_, Some(audio)) => {
                let resampled = self.resample(audio)?;
                let audio = resampled.as_ref().unwrap_or(audio);
                if let Some(fifo) = self.fifo.as_mut() {
                    fifo.push(audio, pts)?;
                    self.send_queued(false)?;
                } else {
                    if retimed || resampled.is_some() {
                        let mut audio = audio.clone();
                        audio.set_pts(pts);
                        self.inner.send_audio(&audio)?;
                    } else {
                        self.inner.send_audio(audio)?;
                    }
                    self.inner.collect_packets(self.time_base, &mut self.pending)?;
                }
            }
            _ => anyhow::bail!("empty frame"),
        }
        Ok(self.pending.pop_front())
    }

    fn drain(&mut self) -> anyhow::Result<Option<EncodedPacket>> {
        if !self.eof_sent {
            self.send_queued(true)?;
            self.inner.send_eof()?;
            self.eof_sent = true;
            self.inner.collect_packets(self.time_base, &mut self.pending)?;
        }
        Ok(self.pending.pop_front())
    }
}
