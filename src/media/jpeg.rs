//! JPEG frame extraction from a continuous MJPEG byte stream
//!
//! The decoder writes JPEG images back to back on stdout with no container
//! framing. Frames are recovered by marker search only:
//!
//! ```text
//! ... garbage ... | FF D8 | entropy-coded data ... | FF D9 | next frame ...
//!                   SOI                               EOI
//! ```
//!
//! The first SOI in the buffer opens a frame and the first EOI at or after it
//! closes it. Everything up to and including the EOI is consumed. An EOI that
//! precedes any SOI is skipped over as garbage. Pixel data is never inspected;
//! the decoder is trusted to emit well-formed images.

use std::ops::Range;

use bytes::{Bytes, BytesMut};

/// Start-of-image marker
pub const SOI: [u8; 2] = [0xFF, 0xD8];

/// End-of-image marker
pub const EOI: [u8; 2] = [0xFF, 0xD9];

/// Find the first occurrence of `marker` at or after `from`
pub fn find_marker(data: &[u8], marker: [u8; 2], from: usize) -> Option<usize> {
    data.get(from..)?
        .windows(2)
        .position(|w| w == marker)
        .map(|pos| pos + from)
}

/// Find the last occurrence of `marker` in `data`
pub fn rfind_marker(data: &[u8], marker: [u8; 2]) -> Option<usize> {
    data.windows(2).rposition(|w| w == marker)
}

/// Locate the first complete frame in `data`
///
/// Returns the byte range from the SOI marker through the EOI marker
/// (inclusive), or `None` if no complete frame is present yet.
pub fn locate_frame(data: &[u8]) -> Option<Range<usize>> {
    let start = find_marker(data, SOI, 0)?;
    let end = find_marker(data, EOI, start)?;

    if end > start {
        Some(start..end + EOI.len())
    } else {
        None
    }
}

/// Remove and return the first complete frame from `buf`
///
/// On success the buffer holds only what followed the EOI marker. On failure
/// the buffer is left untouched so more bytes can be appended.
pub fn extract_frame(buf: &mut BytesMut) -> Option<Bytes> {
    let range = locate_frame(buf)?;
    let consumed = buf.split_to(range.end).freeze();
    Some(consumed.slice(range.start..))
}

/// Check that `data` is delimited by SOI and EOI markers
pub fn is_delimited(data: &[u8]) -> bool {
    data.len() >= SOI.len() + EOI.len() && data.starts_with(&SOI) && data.ends_with(&EOI)
}
