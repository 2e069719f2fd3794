//! Error types for the simulation kernel.
//!
//! Everything here is a programmer error: the simulation loop never
//! recovers from one, it surfaces synchronously to the caller of the
//! offending operation and the driver reports the run as failed. Starving
//! processors, finished executables, and duplicate tick grants are routine
//! and are not errors.

use sim_time::TimeError;
use thiserror::Error;

/// Result type alias for kernel operations.
pub type Result<T> = std::result::Result<T, SimError>;

/// Unified error type for the simulation kernel.
#[derive(Error, Debug)]
pub enum SimError {
    // Construction errors
    #[error("operation `{name}` must have a positive duration, got {duration}")]
    NonPositiveOperation {
        name: String,
        duration: sim_time::Duration,
    },

    #[error("task `{name}` must contain at least one operation")]
    EmptyTask { name: String },

    #[error("coroutine `{name}` cannot contain another coroutine")]
    NestedCoroutine { name: String },

    // Phase errors
    #[error("task `{name}` is waiting but was ticked")]
    TickedWhileWaiting { name: String },

    #[error("task `{name}` is processing but was told to wait")]
    WaitedWhileProcessing { name: String },

    // Accounting protocol errors
    #[error("processor {processor} was already classified in this quantum")]
    DoubleClassify { processor: usize },

    #[error("processor {processor} already ticked in this quantum")]
    DuplicateProcessorTick { processor: usize },

    #[error("classifying event arrived before any processor tick in this quantum")]
    UnattributedEvent,

    #[error("time logger was removed while its run was still active")]
    LoggerClosed,

    // Random range errors bubble up from the time crate
    #[error(transparent)]
    Time(#[from] TimeError),
}
