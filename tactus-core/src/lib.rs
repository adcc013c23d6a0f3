//! # tactus-core
//!
//! Absolute-time audio ring buffer SDK.
//!
//! ## Architecture
//!
//! ```text
//! producer thread ─► RingProducer::store(frames @ t)
//!                         │  plan window (reset / extend+evict)
//!                         │  copy into lanes, slot = t & (capacity-1)
//!                         ▼
//!                    BoundsQueue ── release-publishes [start, end)
//!                         ▲
//! consumer thread ◄─ RingConsumer::fetch(frames @ t)
//!                    in-window slots copied, the rest zero-filled
//! ```
//!
//! Producer and consumer address frames by one shared monotonic sample
//! counter, never by buffer offsets, so they may run at different paces,
//! overlap, or leave gaps. The consumer side is real-time safe: no locks,
//! no allocation, bounded copies.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod capture;
pub mod error;
pub mod frame;
pub mod ring;
pub mod time;

// Convenience re-exports for downstream crates
pub use capture::RingCapture;
pub use error::TactusError;
pub use frame::{FrameBuffer, FrameSink, FrameSource, Sample};
pub use ring::{RingConsumer, RingProducer, RingStore};
pub use time::{SampleTime, TimeBounds};
