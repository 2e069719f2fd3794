//! Discrete-event simulation kernel for saga scheduling strategies.
//!
//! The kernel drives a virtual clock in fixed quanta over a small set of
//! simulated processors and compares how three strategies execute many
//! I/O-heavy workflows ("sagas"):
//! - overloaded: one kernel thread per saga, round-robin across processors
//! - fixed pool: sagas chained onto one kernel thread per processor
//! - yielding / coroutines: cooperative hand-off whenever the running task
//!   blocks on a wait operation
//!
//! One orchestration run is single-threaded and lock-step; a driver may run
//! many independent orchestrations on separate worker threads. Per-run
//! accounting lives in [`log::TimeLogger`], installed through the
//! thread-local [`log::LogContext`].

pub mod constants;
pub mod error;
pub mod log;
pub mod orchestration;
pub mod saga;
pub mod sched;

pub use error::{Result, SimError};
pub use log::{Action, LogConfig, LogContext, Report, TimeLogger};
pub use orchestration::{CoroutinesOrchestrator, Orchestrator, RunConfig, ThreadedOrchestrator};
pub use saga::executable::{ChainOfExecutables, CoroutineSaga, Executable, SimpleSaga};
pub use saga::task::{SystemOperation, Task};
pub use sched::processor::{Processor, ProcessorConfig};
pub use sched::system::{ProcessingMode, System, SystemConfig};
pub use sched::thread::KernelThread;
