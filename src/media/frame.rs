//! Published frame type
//!
//! A `JpegFrame` is handed out to every waiter that observes it. Clones share
//! the payload, a reference-counted `Bytes` slice of the decoder output.

use std::time::{Duration, Instant};

use bytes::Bytes;

use super::jpeg;

/// A complete JPEG image extracted from the decoder output
#[derive(Debug, Clone)]
pub struct JpegFrame {
    /// Image bytes, SOI through EOI inclusive
    pub data: Bytes,
    /// Publication order within the stream, starting at 1
    pub sequence: u64,
    /// When the frame was extracted
    pub captured_at: Instant,
}

impl JpegFrame {
    /// Create a frame captured now
    pub fn new(data: Bytes, sequence: u64) -> Self {
        debug_assert!(jpeg::is_delimited(&data));
        Self {
            data,
            sequence,
            captured_at: Instant::now(),
        }
    }

    /// Size of the image in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Time since the frame was extracted
    pub fn age(&self) -> Duration {
        self.captured_at.elapsed()
    }
}
