//! Bounded accumulator for decoder output
//!
//! Bytes are appended as they are read and frames are drained from the front.
//! The buffer never holds more than `max_size` bytes once a push returns:
//!
//! 1. If the tail starting at the last SOI marker fits, everything before it
//!    is dropped (the newest frame candidate survives).
//! 2. Otherwise the buffer is reset to empty; a single frame larger than the
//!    cap can never be completed.

use bytes::{Bytes, BytesMut};

use super::jpeg;

/// Smallest read size
pub const DEFAULT_MIN_READ_SIZE: usize = 4096;

/// Bounded MJPEG byte buffer
#[derive(Debug)]
pub struct FrameBuffer {
    /// Pending bytes since the last extracted frame
    data: BytesMut,
    /// Maximum buffer size in bytes
    max_size: usize,
    /// Lower bound for the suggested read size
    min_read_size: usize,
    /// Largest frame extracted so far
    largest_frame: usize,
    /// Number of times the cap forced a truncate or reset
    overflows: u64,
}

impl FrameBuffer {
    /// Create a new buffer with the given cap
    pub fn with_max_size(max_size: usize) -> Self {
        Self::with_limits(max_size, DEFAULT_MIN_READ_SIZE)
    }

    /// Create a new buffer with a cap and a minimum read size
    pub fn with_limits(max_size: usize, min_read_size: usize) -> Self {
        let max_size = max_size.max(jpeg::SOI.len() + jpeg::EOI.len());
        Self {
            data: BytesMut::with_capacity(min_read_size.min(max_size)),
            max_size,
            min_read_size: min_read_size.clamp(1, max_size),
            largest_frame: 0,
            overflows: 0,
        }
    }

    /// Append a chunk and enforce the cap
    ///
    /// Returns false if bytes had to be discarded.
    pub fn push(&mut self, chunk: &[u8]) -> bool {
        self.data.extend_from_slice(chunk);

        if self.data.len() <= self.max_size {
            return true;
        }

        self.overflows += 1;
        match jpeg::rfind_marker(&self.data, jpeg::SOI) {
            Some(pos) if self.data.len() - pos <= self.max_size => {
                let _ = self.data.split_to(pos);
                tracing::trace!(kept = self.data.len(), "Buffer cap hit, truncated to last SOI");
            }
            _ => {
                tracing::trace!(dropped = self.data.len(), "Buffer cap hit, reset");
                self.data.clear();
            }
        }
        false
    }

    /// Remove the next complete frame, if any
    pub fn next_frame(&mut self) -> Option<Bytes> {
        let frame = jpeg::extract_frame(&mut self.data)?;
        self.largest_frame = self.largest_frame.max(frame.len());
        Some(frame)
    }

    /// Drain every complete frame and return only the newest
    ///
    /// Returns the newest frame together with the number of frames drained.
    pub fn take_newest(&mut self) -> Option<(Bytes, usize)> {
        let mut newest = None;
        let mut count = 0;
        while let Some(frame) = self.next_frame() {
            newest = Some(frame);
            count += 1;
        }
        newest.map(|frame| (frame, count))
    }

    /// Suggested size for the next read
    ///
    /// 1.2x the largest frame seen, but at least `min_read_size` and never
    /// above the cap.
    pub fn read_size(&self) -> usize {
        (self.largest_frame + self.largest_frame / 5)
            .max(self.min_read_size)
            .min(self.max_size)
    }

    /// Discard all pending bytes
    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Current buffer size in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Configured cap
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Largest frame extracted so far
    pub fn largest_frame(&self) -> usize {
        self.largest_frame
    }

    /// Number of pushes that exceeded the cap
    pub fn overflows(&self) -> u64 {
        self.overflows
    }

    /// Buffer utilization as a percentage
    pub fn utilization(&self) -> f32 {
        (self.data.len() as f32 / self.max_size as f32) * 100.0
    }
}
