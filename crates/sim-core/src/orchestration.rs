//! Strategy-level drivers: wrap sagas into executables, run the tick loop.

use crate::constants::DEFAULT_TICK_LENGTH;
use crate::error::Result;
use crate::log::LogContext;
use crate::saga::executable::{CoroutineSaga, Executable, SimpleSaga};
use crate::sched::system::{ProcessingMode, System, SystemConfig};
use sim_time::{Duration, TimeDelta};

/// Per-run parameters shared by both orchestrators.
#[derive(Debug, Clone, Copy)]
pub struct RunConfig {
    /// Virtual length of one loop iteration.
    pub tick_length: Duration,
    pub system: SystemConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            tick_length: DEFAULT_TICK_LENGTH,
            system: SystemConfig::default(),
        }
    }
}

/// Drive a published system to completion, one quantum per iteration.
///
/// Each iteration mints a fresh grant, ticks the system (processor pass
/// then wait pass) and closes the accounting quantum. Returns the total
/// simulated time.
fn run_executables(
    system: &mut System,
    executables: Vec<Executable>,
    tick_length: Duration,
) -> Result<Duration> {
    system.publish(executables);
    let mut elapsed = Duration::ZERO;
    while !system.work_is_done() {
        let delta = TimeDelta::new(tick_length);
        system.tick(&delta)?;
        elapsed += tick_length;
        LogContext::shift_time()?;
    }
    Ok(elapsed)
}

/// Runs each saga on its own kernel thread (overloaded / yielding) or
/// chained per processor (fixed pool).
#[derive(Debug)]
pub struct ThreadedOrchestrator {
    system: System,
    tick_length: Duration,
}

impl ThreadedOrchestrator {
    pub fn new(processors: usize, mode: ProcessingMode) -> Self {
        Self::with_config(processors, mode, RunConfig::default())
    }

    pub fn with_config(processors: usize, mode: ProcessingMode, config: RunConfig) -> Self {
        ThreadedOrchestrator {
            system: System::with_config(processors, mode, config.system),
            tick_length: config.tick_length,
        }
    }

    pub fn name(&self) -> String {
        self.system.mode().to_string()
    }

    /// Run the sagas to completion, returning the simulated duration.
    pub fn process(&mut self, sagas: Vec<SimpleSaga>) -> Result<Duration> {
        tracing::debug!(mode = %self.system.mode(), sagas = sagas.len(), "starting threaded run");
        let executables = sagas.into_iter().map(Executable::Saga).collect();
        run_executables(&mut self.system, executables, self.tick_length)
    }
}

/// Packs sagas into coroutines, one per processor, and runs them on a
/// fixed-pool system; the coroutines themselves hand control over whenever
/// their running member blocks.
#[derive(Debug)]
pub struct CoroutinesOrchestrator {
    system: System,
    processors: usize,
    tick_length: Duration,
}

impl CoroutinesOrchestrator {
    pub fn new(processors: usize) -> Self {
        Self::with_config(processors, RunConfig::default())
    }

    pub fn with_config(processors: usize, config: RunConfig) -> Self {
        CoroutinesOrchestrator {
            system: System::with_config(processors, ProcessingMode::FixedPool, config.system),
            processors,
            tick_length: config.tick_length,
        }
    }

    pub fn name(&self) -> String {
        "coroutines".to_string()
    }

    /// Run the sagas to completion, returning the simulated duration.
    pub fn process(&mut self, sagas: Vec<SimpleSaga>) -> Result<Duration> {
        tracing::debug!(sagas = sagas.len(), "starting coroutines run");
        let bunch_size = sagas.len().div_ceil(self.processors);
        let mut remaining: Vec<SimpleSaga> = sagas;
        let mut coroutines: Vec<Executable> = Vec::new();
        while !remaining.is_empty() {
            let take = bunch_size.min(remaining.len());
            let bunch: Vec<Executable> = remaining
                .drain(..take)
                .map(Executable::Saga)
                .collect();
            let name = format!("coroutine{}", coroutines.len());
            coroutines.push(CoroutineSaga::new(bunch, name)?.into());
        }
        run_executables(&mut self.system, coroutines, self.tick_length)
    }
}

/// Either orchestrator, for drivers that build jobs dynamically.
#[derive(Debug)]
pub enum Orchestrator {
    Threaded(ThreadedOrchestrator),
    Coroutines(CoroutinesOrchestrator),
}

impl Orchestrator {
    pub fn threaded(processors: usize, mode: ProcessingMode, config: RunConfig) -> Self {
        Orchestrator::Threaded(ThreadedOrchestrator::with_config(processors, mode, config))
    }

    pub fn coroutines(processors: usize, config: RunConfig) -> Self {
        Orchestrator::Coroutines(CoroutinesOrchestrator::with_config(processors, config))
    }

    pub fn name(&self) -> String {
        match self {
            Orchestrator::Threaded(inner) => inner.name(),
            Orchestrator::Coroutines(inner) => inner.name(),
        }
    }

    pub fn process(&mut self, sagas: Vec<SimpleSaga>) -> Result<Duration> {
        match self {
            Orchestrator::Threaded(inner) => inner.process(sagas),
            Orchestrator::Coroutines(inner) => inner.process(sagas),
        }
    }
}
