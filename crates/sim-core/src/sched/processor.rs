//! A single-slot processor with timeslice and context-switch accounting.

use crate::constants::{CONTEXT_SWITCH_COST, THREAD_TIMESLICE};
use crate::error::Result;
use crate::log::LogContext;
use crate::sched::thread::KernelThread;
use sim_time::{Duration, TimeDelta};
use std::collections::VecDeque;

/// Static parameters of one processor.
#[derive(Debug, Clone, Copy)]
pub struct ProcessorConfig {
    /// Maximum continuous execution time before a forced switch.
    pub timeslice: Duration,
    /// Overhead charged while the slot moves to another thread.
    pub context_switch_cost: Duration,
    /// Switch early whenever the running thread blocks on a wait.
    pub yielding: bool,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        ProcessorConfig {
            timeslice: THREAD_TIMESLICE,
            context_switch_cost: CONTEXT_SWITCH_COST,
            yielding: false,
        }
    }
}

/// One simulated processor: a slot for the running thread plus a FIFO pool.
#[derive(Debug)]
pub struct Processor {
    number: usize,
    config: ProcessorConfig,
    pool: VecDeque<KernelThread>,
    slot: Option<KernelThread>,
    /// Processing time accumulated by the thread currently in the slot.
    processing_time: Duration,
    /// Time accumulated inside the current context switch.
    switch_time: Duration,
    /// Set once a switch starts so it completes even if the trigger fades.
    yield_latch: bool,
}

impl Processor {
    pub fn new(number: usize, config: ProcessorConfig) -> Self {
        Processor {
            number,
            config,
            pool: VecDeque::new(),
            slot: None,
            processing_time: Duration::ZERO,
            switch_time: Duration::ZERO,
            yield_latch: false,
        }
    }

    pub fn number(&self) -> usize {
        self.number
    }

    /// Append a thread to the pool, promoting it at once when starving.
    pub fn assign(&mut self, thread: KernelThread) {
        self.pool.push_back(thread);
        self.promote_if_starving();
    }

    /// No thread in the slot and none pooled.
    pub fn is_starving(&self) -> bool {
        self.slot.is_none() && self.pool.is_empty()
    }

    pub fn pool_len(&self) -> usize {
        self.pool.len()
    }

    pub fn slot(&self) -> Option<&KernelThread> {
        self.slot.as_ref()
    }

    /// Every thread this processor holds, slot first.
    pub fn threads_mut(&mut self) -> impl Iterator<Item = &mut KernelThread> {
        self.slot.iter_mut().chain(self.pool.iter_mut())
    }

    /// Consume one quantum.
    ///
    /// Bookkeeping first: the tick is announced, a starving slot is refilled
    /// from the pool. Then either the current context switch advances or the
    /// slot thread runs. A switch begins when another thread is pooled and
    /// the running thread exhausted its timeslice or (on yielding
    /// processors) blocks on a wait; it completes once the accumulated
    /// switch time exceeds the configured cost.
    pub fn ticked(&mut self, delta: &TimeDelta) -> Result<()> {
        LogContext::log(|logger| logger.log_processor_tick(self.number))?;
        self.promote_if_starving();

        let slot = match self.slot.as_mut() {
            Some(slot) => slot,
            None => return Ok(()),
        };

        let should_yield = self.config.yielding && (self.yield_latch || slot.can_yield());
        let timeslice_over = self.processing_time >= self.config.timeslice;

        if !self.pool.is_empty() && (should_yield || timeslice_over) {
            self.yield_latch = true;
            LogContext::log(|logger| logger.log_overhead_tick())?;
            self.switch_time += delta.duration;
            if self.switch_time <= self.config.context_switch_cost {
                return Ok(());
            }
            tracing::trace!(processor = self.number, "context switch complete");
            self.yield_latch = false;
            self.reset_counters();
            if let Some(unassigned) = self.slot.take() {
                self.pool.push_back(unassigned);
            }
            return Ok(());
        }

        if !slot.is_doing_system_operation() {
            self.processing_time += delta.duration;
        }
        slot.ticked(delta)?;
        if slot.is_finished() {
            tracing::trace!(processor = self.number, "thread finished");
            self.slot = None;
            self.reset_counters();
            self.promote_if_starving();
        }
        Ok(())
    }

    fn promote_if_starving(&mut self) {
        if self.slot.is_some() {
            return;
        }
        if let Some(next) = self.pool.pop_front() {
            self.slot = Some(next);
        }
    }

    fn reset_counters(&mut self) {
        self.processing_time = Duration::ZERO;
        self.switch_time = Duration::ZERO;
    }
}
