//! Virtual-time primitives for the saga simulator.
//!
//! This crate provides the value types every other simulator crate builds
//! on:
//! - [`Duration`]: exact integer-nanosecond arithmetic
//! - [`TimeDelta`]: a tick grant carrying a fresh identity token

pub mod delta;
pub mod duration;
pub mod error;

pub use delta::{DeltaId, TimeDelta};
pub use duration::Duration;
pub use error::{Result, TimeError};
