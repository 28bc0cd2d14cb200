//! Media handling for MJPEG decoder output
//!
//! This module provides:
//! - JPEG frame extraction by SOI/EOI marker search
//! - A bounded accumulation buffer
//! - The published frame type

pub mod buffer;
pub mod frame;
pub mod jpeg;

pub use buffer::FrameBuffer;
pub use frame::JpegFrame;
pub use jpeg::{extract_frame, locate_frame, EOI, SOI};
