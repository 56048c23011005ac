use ffmpeg_next::ChannelLayout;

pub fn is_again(err: &ffmpeg_next::Error) -> bool {
    matches!(err, ffmpeg_next::Error::Other { errno } if *errno == ffmpeg_next::util::error::EAGAIN)
}

/// Copies `data` into the context's extradata, padded the way libavcodec
/// expects. Must run before the codec is opened.
pub fn set_extradata(context: &mut ffmpeg_next::codec::Context, data: &[u8]) {
    if data.is_empty() {
        return;
    }
    let padding = ffmpeg_next::ffi::AV_INPUT_BUFFER_PADDING_SIZE as usize;
    unsafe {
        let ptr = context.as_mut_ptr();
        if !(*ptr).extradata.is_null() {
            ffmpeg_next::ffi::av_freep(&mut (*ptr).extradata as *mut *mut u8 as *mut _);
        }
        let buf = ffmpeg_next::ffi::av_mallocz(data.len() + padding) as *mut u8;
        if buf.is_null() {
            (*ptr).extradata_size = 0;
            return;
        }
        std::ptr::copy_nonoverlapping(data.as_ptr(), buf, data.len());
        (*ptr).extradata = buf;
        (*ptr).extradata_size = data.len() as i32;
    }
}

/// Default channel layout for `channels` channels.
pub fn channel_layout(channels: u32) -> ChannelLayout {
    match channels {
        1 => ChannelLayout::MONO,
        3 => ChannelLayout::SURROUND,
        4 => ChannelLayout::QUAD,
        6 => ChannelLayout::_5POINT1,
        _ => ChannelLayout::STEREO,
    }
}
