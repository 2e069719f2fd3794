//! Error types for virtual-time operations.

use crate::duration::Duration;
use thiserror::Error;

/// Result type alias for virtual-time operations.
pub type Result<T> = std::result::Result<T, TimeError>;

/// Errors that can occur when working with durations.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeError {
    #[error("random range start must be non-negative, got {start}")]
    NegativeRangeStart { start: Duration },

    #[error("random range start {start} must be strictly below end {end}")]
    EmptyRange { start: Duration, end: Duration },
}
