//! Tunable scheduling constants.
//!
//! Read once at construction time; override per run through
//! [`crate::sched::system::SystemConfig`].

use sim_time::Duration;

/// Round-robin timeslice, matching RR_TIMESLICE (100 ms) in the Linux
/// scheduler (include/linux/sched/rt.h).
pub const THREAD_TIMESLICE: Duration = Duration::from_millis(100);

/// Mean of the switch overheads measured in "Context Switch Overheads for
/// Linux on ARM Platforms" (p. 5).
pub const CONTEXT_SWITCH_COST: Duration = Duration::from_micros(48);

/// Bookkeeping charged when a kernel thread is brought up (clone, stack
/// setup, runqueue insertion).
pub const THREAD_CREATION_COST: Duration = Duration::from_micros(10);

/// Bookkeeping charged when a kernel thread is torn down.
pub const THREAD_DEALLOCATION_COST: Duration = Duration::from_micros(5);

/// Length of one virtual-clock quantum.
pub const DEFAULT_TICK_LENGTH: Duration = Duration::from_micros(1);
