//! Camera stream registry
//!
//! The registry maps camera ids to running [`CameraStream`](crate::stream::CameraStream)s
//! and owns their lifecycle: lazy creation, reaping after decoder death, idle
//! eviction and shutdown.
//!
//! # Architecture
//!
//! ```text
//!                          Arc<StreamRegistry>
//!                     ┌─────────────────────────┐
//!                     │ streams: HashMap<Id,    │
//!                     │   Arc<CameraStream> {   │
//!                     │     decoder child,      │
//!                     │     read loop task,     │
//!                     │     latest + fresh,     │
//!                     │   }                     │
//!                     │ >                       │
//!                     └───────────┬─────────────┘
//!                                 │
//!         ┌───────────────────────┼───────────────────────┐
//!         │                       │                       │
//!         ▼                       ▼                       ▼
//!    GET /{camera}          GET /start/{camera}      cleanup task
//!    ensure() +             ensure()                 evict idle,
//!    get_fresh_frame()                               drop terminated
//! ```
//!
//! # Zero-Copy Frames
//!
//! Frames are `bytes::Bytes` sliced out of the read buffer. Every waiter
//! served from one publication shares the same allocation.

pub mod config;
pub mod store;

pub use config::{RegistryConfig, RestartPolicy};
pub(crate) use store::Reaper;
pub use store::StreamRegistry;
