use bytes::{Bytes, BytesMut};
use lite_transcode::CodecId;

/// Annex B start code (4-byte)
const START_CODE: &[u8] = &[0x00, 0x00, 0x00, 0x01];

/// Check if data is in Annex B format by looking at the start codes.
pub fn is_annexb(data: &[u8]) -> bool {
    data.starts_with(&[0x00, 0x00, 0x00, 0x01]) || data.starts_with(&[0x00, 0x00, 0x01])
}

/// Converts AVCC (4-byte length + NAL) to Annex B (start code + NAL).
pub fn convert_avcc_to_annexb(avcc: &[u8]) -> Bytes {
    convert_length_prefixed(avcc, 4)
}

/// Converts NAL units prefixed by `length_size` big-endian bytes to Annex B.
/// Stops at the first truncated unit.
pub fn convert_length_prefixed(data: &[u8], length_size: usize) -> Bytes {
    let mut out = BytesMut::with_capacity(data.len() + 16);
    let mut i = 0;
    while i + length_size <= data.len() {
        let len = data[i..i + length_size]
            .iter()
            .fold(0usize, |acc, b| acc << 8 | usize::from(*b));
        i += length_size;
        if len == 0 || i + len > data.len() {
            break;
        }
        out.extend_from_slice(START_CODE);
        out.extend_from_slice(&data[i..i + len]);
        i += len;
    }
    out.freeze()
}

fn read_u16(data: &[u8], at: usize) -> Option<usize> {
    let bytes = data.get(at..at + 2)?;
    Some(usize::from(bytes[0]) << 8 | usize::from(bytes[1]))
}

/// Appends `count` 16-bit length-prefixed NAL units starting at `at`.
/// Returns the offset after the last one.
fn copy_nal_units(data: &[u8], mut at: usize, count: usize, out: &mut BytesMut) -> Option<usize> {
    for _ in 0..count {
        let len = read_u16(data, at)?;
        at += 2;
        let nal = data.get(at..at + len)?;
        out.extend_from_slice(START_CODE);
        out.extend_from_slice(nal);
        at += len;
    }
    Some(at)
}

/// Parameter sets and NAL length size carried in an avcC record.
fn parse_avcc(record: &[u8]) -> Option<(Bytes, usize)> {
    if record.len() < 7 || record[0] != 1 {
        return None;
    }
    let length_size = usize::from(record[4] & 0x03) + 1;
    let mut out = BytesMut::new();
    let sps_count = usize::from(record[5] & 0x1f);
    let at = copy_nal_units(record, 6, sps_count, &mut out)?;
    let pps_count = usize::from(*record.get(at)?);
    copy_nal_units(record, at + 1, pps_count, &mut out)?;
    Some((out.freeze(), length_size))
}

/// Parameter sets and NAL length size carried in an hvcC record.
fn parse_hvcc(record: &[u8]) -> Option<(Bytes, usize)> {
    if record.len() < 23 || record[0] != 1 {
        return None;
    }
    let length_size = usize::from(record[21] & 0x03) + 1;
    let arrays = usize::from(record[22]);
    let mut out = BytesMut::new();
    let mut at = 23;
    for _ in 0..arrays {
        let count = read_u16(record, at + 1)?;
        at = copy_nal_units(record, at + 3, count, &mut out)?;
    }
    Some((out.freeze(), length_size))
}

/// Rewrites MP4-style H.264/H.265 access units into the Annex B form the
/// pipeline passes between stages. Other codecs pass through untouched.
#[derive(Debug, Clone)]
pub struct AnnexB {
    /// Parameter sets in Annex B form, when the source carried a
    /// configuration record.
    parameter_sets: Option<Bytes>,
    length_size: Option<usize>,
}

impl AnnexB {
    pub fn new(codec: CodecId, extra_data: Option<&[u8]>) -> Self {
        let parsed = match (codec, extra_data) {
            (_, Some(data)) if is_annexb(data) => None,
            (CodecId::H264, Some(data)) => parse_avcc(data),
            (CodecId::H265, Some(data)) => parse_hvcc(data),
            _ => None,
        };
        match parsed {
            Some((parameter_sets, length_size)) => Self {
                parameter_sets: Some(parameter_sets),
                length_size: Some(length_size),
            },
            None => Self {
                parameter_sets: None,
                length_size: None,
            },
        }
    }

    pub fn is_active(&self) -> bool {
        self.length_size.is_some()
    }

    /// Converted extradata for the output track.
    pub fn parameter_sets(&self) -> Option<&Bytes> {
        self.parameter_sets.as_ref()
    }

    /// Key frames get the parameter sets prepended so a decoder can start on
    /// any of them.
    pub fn filter(&self, data: &[u8], key: bool) -> Bytes {
        let Some(length_size) = self.length_size else {
            return Bytes::copy_from_slice(data);
        };
        if is_annexb(data) {
            return Bytes::copy_from_slice(data);
        }
        let converted = convert_length_prefixed(data, length_size);
        match self.parameter_sets.as_ref() {
            Some(sets) if key && !sets.is_empty() => {
                let mut out = BytesMut::with_capacity(sets.len() + converted.len());
                out.extend_from_slice(sets);
                out.extend_from_slice(&converted);
                out.freeze()
            }
            _ => converted,
        }
    }
}
