//! Core infrastructure for tower-edgeguard.
//!
//! This crate provides shared functionality used across all edgeguard
//! middleware crates:
//! - Event system for observability
//! - Wall-clock seam so stateful components can be driven in tests

pub mod clock;
pub mod events;

pub use clock::{Clock, ManualClock, SystemClock};
pub use events::{EdgeEvent, EventSink};
