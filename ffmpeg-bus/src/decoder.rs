use ffmpeg_next::{Codec, Rational, codec::packet::Packet};
use lite_transcode::{DecodeContext, PacketView, Track, TrackType};

use crate::{
    frame::AvFrame,
    util::{is_again, set_extradata},
};

/// Timestamps on [`lite_transcode::Frame`] are milliseconds.
pub const MILLIS: Rational = Rational(1, 1000);

enum DecoderType {
    Video(ffmpeg_next::codec::decoder::Video),
    Audio(ffmpeg_next::codec::decoder::Audio),
}

impl DecoderType {
    fn send_packet(&mut self, packet: &Packet) -> Result<(), ffmpeg_next::Error> {
        match self {
            DecoderType::Video(decoder) => decoder.send_packet(packet),
            DecoderType::Audio(decoder) => decoder.send_packet(packet),
        }
    }

    fn send_eof(&mut self) -> anyhow::Result<()> {
        match self {
            DecoderType::Video(decoder) => decoder.send_eof()?,
            DecoderType::Audio(decoder) => decoder.send_eof()?,
        }
        Ok(())
    }

    /// `Ok(false)` when the decoder needs more input or is fully drained.
    fn receive_frame(&mut self, out: &mut AvFrame) -> anyhow::Result<bool> {
        let result = match self {
            DecoderType::Video(decoder) => decoder.receive_frame(out.video_mut()),
            DecoderType::Audio(decoder) => decoder.receive_frame(out.audio_mut()),
        };
        match result {
            Ok(()) => Ok(true),
            Err(ffmpeg_next::Error::Eof) => Ok(false),
            Err(err) if is_again(&err) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}

/// FFmpeg decoder opened for one source track.
pub struct Decoder {
    inner: DecoderType,
    eof_sent: bool,
}

unsafe impl Send for Decoder {}

impl Decoder {
    pub fn new(codec: Codec, track: &Track) -> anyhow::Result<Self> {
        let mut context = ffmpeg_next::codec::Context::new_with_codec(codec);
        unsafe {
            let ptr = context.as_mut_ptr();
            (*ptr).time_base = MILLIS.into();
            (*ptr).pkt_timebase = MILLIS.into();
            match track.track_type() {
                TrackType::Video => {
                    (*ptr).width = track.width as i32;
                    (*ptr).height = track.height as i32;
                }
                TrackType::Audio => {
                    // PCM decoders refuse to open without a rate and layout.
                    (*ptr).sample_rate = track.sample_rate.max(8000) as i32;
                    ffmpeg_next::ffi::av_channel_layout_default(
                        &mut (*ptr).ch_layout,
                        track.channels.max(1) as i32,
                    );
                }
            }
        }
        if let Some(extra_data) = track.extra_data.as_deref() {
            set_extradata(&mut context, extra_data);
        }

        let opened = context.decoder().open_as(codec)?;
        let inner = match track.track_type() {
            TrackType::Video => DecoderType::Video(opened.video()?),
            TrackType::Audio => DecoderType::Audio(opened.audio()?),
        };

        Ok(Self {
            inner,
            eof_sent: false,
        })
    }
}

impl DecodeContext<AvFrame> for Decoder {
    fn decode(&mut self, packet: &PacketView<'_>, out: &mut AvFrame) -> anyhow::Result<bool> {
        let mut av_packet = Packet::copy(packet.data);
        av_packet.set_pts(Some(packet.pts));
        av_packet.set_dts(Some(packet.dts));

        match self.inner.send_packet(&av_packet) {
            Ok(()) => self.inner.receive_frame(out),
            Err(err) if is_again(&err) => {
                // A frame from an earlier packet is still waiting: hand it out
                // first, then queue this packet behind it.
                let received = self.inner.receive_frame(out)?;
                self.inner.send_packet(&av_packet)?;
                Ok(received)
            }
            Err(err) => Err(err.into()),
        }
    }

    fn drain(&mut self, out: &mut AvFrame) -> anyhow::Result<bool> {
        if !self.eof_sent {
            self.inner.send_eof()?;
            self.eof_sent = true;
        }
        self.inner.receive_frame(out)
    }
}
