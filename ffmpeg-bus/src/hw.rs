//! Codec implementation lookup.
//!
//! Named lookups cover the hardware variants (CUDA/QSV/NVENC/V4L2M2M/...)
//! listed in the codec table; they resolve to `None` when the local FFmpeg
//! build lacks them, and the caller falls back to the generic codec.

use lite_transcode::Lookup;

use crate::format::to_codec_id;

const HW_SUFFIXES: &[&str] = &[
    "_cuvid",
    "_nvenc",
    "_qsv",
    "_vaapi",
    "_v4l2m2m",
    "_videotoolbox",
];

pub fn is_hardware(name: &str) -> bool {
    HW_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
}

/// Find a decoder. Hardware names are skipped unless `allow_hw` is set.
pub fn find_decoder(lookup: Lookup<'_>, allow_hw: bool) -> Option<ffmpeg_next::Codec> {
    match lookup {
        Lookup::Name(name) if is_hardware(name) && !allow_hw => None,
        Lookup::Name(name) => {
            let codec = ffmpeg_next::decoder::find_by_name(name)?;
            if is_hardware(name) {
                log::info!("found hardware decoder: {}", name);
            }
            Some(codec)
        }
        Lookup::Id(codec) => ffmpeg_next::decoder::find(to_codec_id(codec)),
    }
}

/// Find an encoder. Hardware names are skipped unless `allow_hw` is set.
pub fn find_encoder(lookup: Lookup<'_>, allow_hw: bool) -> Option<ffmpeg_next::Codec> {
    match lookup {
        Lookup::Name(name) if is_hardware(name) && !allow_hw => None,
        Lookup::Name(name) => {
            let codec = ffmpeg_next::encoder::find_by_name(name)?;
            if is_hardware(name) {
                log::info!("found hardware encoder: {}", name);
            }
            Some(codec)
        }
        Lookup::Id(codec) => ffmpeg_next::encoder::find(to_codec_id(codec)),
    }
}
