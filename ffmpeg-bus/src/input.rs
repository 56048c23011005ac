use std::collections::HashMap;
use std::ffi::CString;
use std::path::Path;

use ffmpeg_next::Dictionary;
use lite_transcode::{Frame, Track};

use crate::{bsf::AnnexB, decoder::MILLIS, stream::AvStream};

/// A container or device demuxed into pipeline [`Frame`]s.
pub struct AvInput {
    inner: ffmpeg_next::format::context::Input,
    streams: HashMap<usize, AvStream>,
    filters: HashMap<usize, AnnexB>,
}

unsafe impl Send for AvInput {}

impl AvInput {
    /// Resolve input format by name (e.g. "x11grab", "v4l2") via FFmpeg's av_find_input_format.
    fn find_input_format(name: &str) -> anyhow::Result<ffmpeg_next::format::format::Input> {
        let cname = CString::new(name)
            .map_err(|e| anyhow::anyhow!("invalid format name {:?}: {}", name, e))?;
        let ptr = unsafe { ffmpeg_next::ffi::av_find_input_format(cname.as_ptr()) };
        if ptr.is_null() {
            return Err(anyhow::anyhow!("input format not found: {}", name));
        }
        Ok(unsafe { ffmpeg_next::format::format::Input::wrap(ptr as *mut _) })
    }

    pub fn new(
        url: &str,
        format: Option<&str>,
        options: Option<Dictionary>,
    ) -> anyhow::Result<Self> {
        use ffmpeg_next::format::format::Format;

        let path = Path::new(url);
        let input = match (format, options) {
            (Some(fmt_name), opts) => {
                let fmt = Self::find_input_format(fmt_name)?;
                let ctx = ffmpeg_next::format::open_with(
                    path,
                    &Format::Input(fmt),
                    opts.unwrap_or_else(Dictionary::new),
                )?;
                ctx.input()
            }
            (None, Some(opts)) => ffmpeg_next::format::input_with_dictionary(path, opts)?,
            (None, None) => ffmpeg_next::format::input(path)?,
        };

        let mut streams = HashMap::new();
        let mut filters = HashMap::new();
        for stream in input.streams() {
            let stream = AvStream::from(stream);
            match stream.codec_id() {
                Some(codec) => {
                    filters.insert(stream.index(), AnnexB::new(codec, stream.extradata()));
                    streams.insert(stream.index(), stream);
                }
                None => log::debug!("skipping unsupported stream {}", stream.index()),
            }
        }

        Ok(Self {
            inner: input,
            streams,
            filters,
        })
    }

    pub fn streams(&self) -> &HashMap<usize, AvStream> {
        &self.streams
    }

    /// Tracks of the supported streams, ordered by stream index.
    pub fn tracks(&self) -> Vec<(usize, Track)> {
        let mut tracks: Vec<(usize, Track)> = self
            .streams
            .iter()
            .filter_map(|(index, stream)| stream.track().map(|track| (*index, track)))
            .collect();
        tracks.sort_by_key(|(index, _)| *index);
        tracks
    }

    /// Next frame of a supported stream with timestamps in milliseconds, or
    /// `None` at end of input.
    pub fn read_frame(&mut self) -> Option<(usize, Frame)> {
        loop {
            let (stream, mut packet) = self.inner.packets().next()?;
            let index = stream.index();
            let (Some(av_stream), Some(filter)) =
                (self.streams.get(&index), self.filters.get(&index))
            else {
                continue;
            };
            let Some(codec) = av_stream.codec_id() else {
                continue;
            };
            packet.rescale_ts(av_stream.time_base(), MILLIS);
            let Some(data) = packet.data() else {
                continue;
            };

            let pts = packet.pts().or(packet.dts()).unwrap_or(0);
            let dts = packet.dts().unwrap_or(pts);
            let data = filter.filter(data, packet.is_key());
            let frame = Frame::new(codec, dts, pts, data);
            return Some((index, frame));
        }
    }
}
