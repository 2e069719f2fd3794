//! Binds executables to processors according to a processing mode.

use crate::constants::{THREAD_CREATION_COST, THREAD_DEALLOCATION_COST};
use crate::error::Result;
use crate::saga::executable::{ChainOfExecutables, Executable};
use crate::sched::processor::{Processor, ProcessorConfig};
use crate::sched::thread::KernelThread;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use sim_time::{Duration, TimeDelta};

/// How published executables are distributed over processors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum ProcessingMode {
    /// One kernel thread per executable, round-robin over processors; the
    /// scheduler preempts on timeslice exhaustion only.
    Overloaded,
    /// Executables are partitioned round-robin and chained, one kernel
    /// thread per processor.
    FixedPool,
    /// Like overloaded, but processors also switch away from a thread as
    /// soon as it blocks on a wait.
    Yielding,
}

impl std::fmt::Display for ProcessingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessingMode::Overloaded => write!(f, "overloaded"),
            ProcessingMode::FixedPool => write!(f, "fixed_pool"),
            ProcessingMode::Yielding => write!(f, "yielding"),
        }
    }
}

/// Scheduling parameters applied to every processor and thread of a system.
#[derive(Debug, Clone, Copy)]
pub struct SystemConfig {
    pub timeslice: Duration,
    pub context_switch_cost: Duration,
    pub thread_creation_cost: Duration,
    pub thread_deallocation_cost: Duration,
}

impl Default for SystemConfig {
    fn default() -> Self {
        SystemConfig {
            timeslice: crate::constants::THREAD_TIMESLICE,
            context_switch_cost: crate::constants::CONTEXT_SWITCH_COST,
            thread_creation_cost: THREAD_CREATION_COST,
            thread_deallocation_cost: THREAD_DEALLOCATION_COST,
        }
    }
}

/// A fixed set of processors executing published work.
#[derive(Debug)]
pub struct System {
    mode: ProcessingMode,
    config: SystemConfig,
    processors: Vec<Processor>,
}

impl System {
    pub fn new(processors_count: usize, mode: ProcessingMode) -> Self {
        Self::with_config(processors_count, mode, SystemConfig::default())
    }

    pub fn with_config(processors_count: usize, mode: ProcessingMode, config: SystemConfig) -> Self {
        let processor_config = ProcessorConfig {
            timeslice: config.timeslice,
            context_switch_cost: config.context_switch_cost,
            yielding: mode == ProcessingMode::Yielding,
        };
        let processors = (0..processors_count)
            .map(|number| Processor::new(number, processor_config))
            .collect();
        System {
            mode,
            config,
            processors,
        }
    }

    pub fn mode(&self) -> ProcessingMode {
        self.mode
    }

    pub fn processors(&self) -> &[Processor] {
        &self.processors
    }

    /// Hand the executables out to the processors.
    ///
    /// Overloaded and yielding modes wrap each executable in its own kernel
    /// thread, assigned round-robin. Fixed-pool mode partitions them
    /// round-robin into per-processor chains, one kernel thread each; with N
    /// executables on P processors the first N mod P processors receive
    /// ⌈N/P⌉, the rest ⌊N/P⌋.
    pub fn publish(&mut self, executables: Vec<Executable>) {
        let processors_count = self.processors.len();
        match self.mode {
            ProcessingMode::Overloaded | ProcessingMode::Yielding => {
                for (i, executable) in executables.into_iter().enumerate() {
                    let thread = self.thread(executable);
                    self.processors[i % processors_count].assign(thread);
                }
            }
            ProcessingMode::FixedPool => {
                let mut pools: Vec<Vec<Executable>> =
                    (0..processors_count).map(|_| Vec::new()).collect();
                for (i, executable) in executables.into_iter().enumerate() {
                    pools[i % processors_count].push(executable);
                }
                for (number, pool) in pools.into_iter().enumerate() {
                    if pool.is_empty() {
                        continue;
                    }
                    let chain = ChainOfExecutables::new(pool, format!("chain{number}"));
                    let thread = self.thread(chain.into());
                    self.processors[number].assign(thread);
                }
            }
        }
    }

    fn thread(&self, executable: Executable) -> KernelThread {
        KernelThread::with_costs(
            executable,
            self.config.thread_creation_cost,
            self.config.thread_deallocation_cost,
        )
    }

    /// Advance every processor by the same grant, then run the wait pass:
    /// every waiting current task of every held thread receives the grant
    /// too, so externally-bound operations progress without a processor.
    /// The shared identity lets a task that saw the grant through its
    /// processor suppress the duplicate.
    pub fn tick(&mut self, delta: &TimeDelta) -> Result<()> {
        for processor in &mut self.processors {
            processor.ticked(delta)?;
        }
        for processor in &mut self.processors {
            for thread in processor.threads_mut() {
                for task in thread.current_tasks_mut() {
                    if task.is_waiting() {
                        task.wait(delta)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// All work handed out at publish has been consumed.
    pub fn work_is_done(&self) -> bool {
        self.processors.iter().all(|p| p.is_starving())
    }
}
