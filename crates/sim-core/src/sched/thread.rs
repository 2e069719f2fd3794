//! Simulated kernel threads.

use crate::constants::{THREAD_CREATION_COST, THREAD_DEALLOCATION_COST};
use crate::error::Result;
use crate::log::LogContext;
use crate::saga::executable::Executable;
use crate::saga::task::Task;
use sim_time::{Duration, TimeDelta};

/// One simulated OS thread wrapping a single executable.
///
/// Lifecycle: creation (cost draining) → execution (grants forwarded to the
/// executable) → deallocation (cost draining) → finished. Time spent in the
/// creation and deallocation phases is charged as overhead.
#[derive(Debug)]
pub struct KernelThread {
    executable: Executable,
    creation_left: Duration,
    deallocation_left: Duration,
}

impl KernelThread {
    pub fn new(executable: Executable) -> Self {
        Self::with_costs(executable, THREAD_CREATION_COST, THREAD_DEALLOCATION_COST)
    }

    pub fn with_costs(executable: Executable, creation: Duration, deallocation: Duration) -> Self {
        KernelThread {
            executable,
            creation_left: creation,
            deallocation_left: deallocation,
        }
    }

    pub fn executable(&self) -> &Executable {
        &self.executable
    }

    pub fn is_finished(&self) -> bool {
        self.executable.is_finished() && self.deallocation_left.is_zero()
    }

    /// True while the thread drains its creation or deallocation cost.
    pub fn is_doing_system_operation(&self) -> bool {
        if self.creation_left.is_positive() {
            return true;
        }
        self.executable.is_finished() && self.deallocation_left.is_positive()
    }

    /// A running thread whose current tasks are all waiting can hand its
    /// processor over early.
    pub fn can_yield(&self) -> bool {
        !self.is_doing_system_operation()
            && !self.executable.is_finished()
            && self.executable.is_blocked()
    }

    /// Waiting task heads reachable from this thread, for the wait pass.
    pub fn current_tasks_mut(&mut self) -> Vec<&mut Task> {
        self.executable.current_tasks_mut()
    }

    pub fn ticked(&mut self, delta: &TimeDelta) -> Result<()> {
        if self.creation_left.is_positive() {
            self.creation_left = self.creation_left.saturating_sub(delta.duration);
            return LogContext::log(|logger| logger.log_overhead_tick());
        }
        if !self.executable.is_finished() {
            return self.executable.ticked(delta);
        }
        if self.deallocation_left.is_positive() {
            self.deallocation_left = self.deallocation_left.saturating_sub(delta.duration);
            return LogContext::log(|logger| logger.log_overhead_tick());
        }
        Ok(())
    }
}
