//! Per-run time accounting and report generation.
//!
//! A [`TimeLogger`] classifies every processor tick of a run into one of
//! three action classes and aggregates them into a [`Report`]. The
//! per-quantum protocol is strict: each processor announces its tick once,
//! optionally followed by exactly one classifying event (task processing or
//! overhead); a tick left unclassified when the clock shifts counts as
//! waiting.
//!
//! [`LogContext`] holds the logger for the current orchestration run in
//! thread-local storage. Drivers that fan simulations out across worker
//! threads therefore get one independent logger per run for free.

use crate::error::{Result, SimError};
use serde::{Deserialize, Serialize};
use sim_time::Duration;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use uuid::Uuid;

/// Classes a processor's quantum can be accounted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// The processor advanced a task's processing operation.
    Processing,
    /// The processor had nothing to advance (idle or blocked on a wait).
    Waiting,
    /// OS bookkeeping: context switching, thread creation or deallocation.
    Overhead,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Processing => write!(f, "processing"),
            Action::Waiting => write!(f, "waiting"),
            Action::Overhead => write!(f, "overhead"),
        }
    }
}

const ACTIONS: [Action; 3] = [Action::Processing, Action::Waiting, Action::Overhead];

/// Average duration and share of one action class across processors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionStat {
    pub avg: Duration,
    /// Mean over processors of the per-processor share, in percent.
    pub percentage: f64,
}

/// Aggregate outcome of one simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub log_name: String,
    pub simulation_duration: Duration,
    pub task_handling: ActionStat,
    pub waiting: ActionStat,
    pub overhead: ActionStat,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: duration {}, handling avg {} ({:.2}%), waiting avg {} ({:.2}%), overhead avg {} ({:.2}%)",
            self.log_name,
            self.simulation_duration,
            self.task_handling.avg,
            self.task_handling.percentage,
            self.waiting.avg,
            self.waiting.percentage,
            self.overhead.avg,
            self.overhead.percentage,
        )
    }
}

/// Configuration of one accounting run.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Name stamped on every report of the run.
    pub name: String,
    /// Virtual length of one quantum; every classified tick accounts for
    /// exactly this much time.
    pub quantum: Duration,
    /// Emit an interim report whenever the clock is divisible by this.
    pub publish_every: Option<Duration>,
}

impl LogConfig {
    pub fn new(name: impl Into<String>, quantum: Duration) -> Self {
        LogConfig {
            name: name.into(),
            quantum,
            publish_every: None,
        }
    }

    pub fn publish_every(mut self, every: Duration) -> Self {
        self.publish_every = Some(every);
        self
    }
}

/// Per-run accounting of processor activity.
pub struct TimeLogger {
    name: String,
    quantum: Duration,
    publish_every: Option<Duration>,
    clock: Duration,
    /// Processors that ticked in the current quantum, with their classifier.
    ticked: HashMap<usize, Option<Action>>,
    /// Classifying events attach to the processor that ticked last.
    last_ticked: Option<usize>,
    /// Sparse (processor, action) -> accumulated duration. Ordered so
    /// report aggregation is deterministic.
    totals: BTreeMap<(usize, Action), Duration>,
    interim: Vec<Report>,
}

impl TimeLogger {
    pub fn new(config: LogConfig) -> Self {
        TimeLogger {
            name: config.name,
            quantum: config.quantum,
            publish_every: config.publish_every,
            clock: Duration::ZERO,
            ticked: HashMap::new(),
            last_ticked: None,
            totals: BTreeMap::new(),
            interim: Vec::new(),
        }
    }

    /// Announce that a processor consumed the current quantum.
    pub fn log_processor_tick(&mut self, processor: usize) -> Result<()> {
        if self.ticked.contains_key(&processor) {
            return Err(SimError::DuplicateProcessorTick { processor });
        }
        self.ticked.insert(processor, None);
        self.last_ticked = Some(processor);
        Ok(())
    }

    /// Classify the current quantum of the last-ticked processor as task
    /// handling.
    pub fn log_task_processing(&mut self, name: &str, id: Uuid) -> Result<()> {
        tracing::trace!(task = name, id = %id, "task processing");
        self.classify(Action::Processing)
    }

    /// Classify the current quantum of the last-ticked processor as OS
    /// overhead.
    pub fn log_overhead_tick(&mut self) -> Result<()> {
        self.classify(Action::Overhead)
    }

    fn classify(&mut self, action: Action) -> Result<()> {
        let processor = self.last_ticked.ok_or(SimError::UnattributedEvent)?;
        let slot = self
            .ticked
            .get_mut(&processor)
            .ok_or(SimError::UnattributedEvent)?;
        if slot.is_some() {
            return Err(SimError::DoubleClassify { processor });
        }
        *slot = Some(action);
        Ok(())
    }

    /// Close the quantum: unclassified ticks become waiting, sums grow by
    /// one quantum each, the clock advances.
    pub fn shift_time(&mut self) {
        for (processor, classifier) in self.ticked.drain() {
            let action = classifier.unwrap_or(Action::Waiting);
            *self
                .totals
                .entry((processor, action))
                .or_insert(Duration::ZERO) += self.quantum;
        }
        self.last_ticked = None;
        self.clock += self.quantum;
        if let Some(every) = self.publish_every {
            if every.is_positive() && (self.clock % every).is_zero() {
                let report = self.report();
                self.interim.push(report);
            }
        }
    }

    /// Aggregate the accumulated sums into a report.
    ///
    /// Averages and percentages are taken per processor and then averaged
    /// across processors (mean of ratios); processors that never had any
    /// activity are excluded.
    fn report(&self) -> Report {
        let mut per_processor: BTreeMap<usize, Duration> = BTreeMap::new();
        for ((processor, _), duration) in &self.totals {
            *per_processor.entry(*processor).or_insert(Duration::ZERO) += *duration;
        }
        let active: Vec<usize> = per_processor
            .iter()
            .filter(|(_, total)| total.is_positive())
            .map(|(processor, _)| *processor)
            .collect();

        let mut stats = [ActionStat::default(); 3];
        for (stat, action) in stats.iter_mut().zip(ACTIONS) {
            let sums = active
                .iter()
                .map(|p| self.action_sum(*p, action))
                .collect::<Vec<_>>();
            stat.avg = Duration::avg(sums.iter().copied());
            if !active.is_empty() {
                stat.percentage = active
                    .iter()
                    .zip(&sums)
                    .map(|(p, sum)| sum.ratio_of(per_processor[p]) * 100.0)
                    .sum::<f64>()
                    / active.len() as f64;
            }
        }

        let [task_handling, waiting, overhead] = stats;
        Report {
            log_name: self.name.clone(),
            simulation_duration: self.clock,
            task_handling,
            waiting,
            overhead,
        }
    }

    fn action_sum(&self, processor: usize, action: Action) -> Duration {
        self.totals
            .get(&(processor, action))
            .copied()
            .unwrap_or(Duration::ZERO)
    }

    /// Finish the run, yielding the final report and any interim reports.
    pub fn close(self) -> (Report, Vec<Report>) {
        (self.report(), self.interim)
    }
}

thread_local! {
    static LOGGER: RefCell<Option<TimeLogger>> = const { RefCell::new(None) };
}

/// Thread-local registry of the current run's [`TimeLogger`].
///
/// One orchestration run owns the slot for the duration of
/// [`LogContext::run_logging`]; a nested call on the same thread replaces
/// the outer logger and makes the outer run fail with
/// [`SimError::LoggerClosed`].
pub struct LogContext;

impl LogContext {
    /// Install a logger, run `action`, close the logger.
    ///
    /// Returns the action's value together with the final report and any
    /// interim reports the run published.
    pub fn run_logging<T>(
        config: LogConfig,
        action: impl FnOnce() -> Result<T>,
    ) -> Result<(T, Report, Vec<Report>)> {
        LOGGER.with(|slot| *slot.borrow_mut() = Some(TimeLogger::new(config)));
        let outcome = action();
        let logger = LOGGER.with(|slot| slot.borrow_mut().take());
        let value = outcome?;
        let (report, interim) = logger.ok_or(SimError::LoggerClosed)?.close();
        Ok((value, report, interim))
    }

    /// Apply `f` to the current logger; a no-op outside of a logging run.
    pub fn log(f: impl FnOnce(&mut TimeLogger) -> Result<()>) -> Result<()> {
        LOGGER.with(|slot| match slot.borrow_mut().as_mut() {
            Some(logger) => f(logger),
            None => Ok(()),
        })
    }

    /// Advance the current logger's clock by one quantum.
    pub fn shift_time() -> Result<()> {
        Self::log(|logger| {
            logger.shift_time();
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn logger(quantum_micros: i64) -> TimeLogger {
        TimeLogger::new(LogConfig::new("test", Duration::from_micros(quantum_micros)))
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn one_of_each_action_splits_evenly() {
        let mut log = logger(1);

        log.log_processor_tick(1).unwrap();
        log.log_task_processing("a", Uuid::new_v4()).unwrap();
        log.shift_time();

        log.log_processor_tick(1).unwrap();
        log.log_overhead_tick().unwrap();
        log.shift_time();

        log.log_processor_tick(1).unwrap();
        log.shift_time();

        let (report, interim) = log.close();
        assert!(interim.is_empty());
        assert_eq!(report.simulation_duration, Duration::from_micros(3));
        assert_eq!(report.task_handling.avg, Duration::from_micros(1));
        assert_eq!(report.waiting.avg, Duration::from_micros(1));
        assert_eq!(report.overhead.avg, Duration::from_micros(1));
        assert!(approx(report.task_handling.percentage, 100.0 / 3.0));
        assert!(approx(report.waiting.percentage, 100.0 / 3.0));
        assert!(approx(report.overhead.percentage, 100.0 / 3.0));
    }

    #[test]
    fn unclassified_tick_counts_as_waiting() {
        let mut log = logger(1);
        log.log_processor_tick(0).unwrap();
        log.shift_time();
        let (report, _) = log.close();
        assert_eq!(report.waiting.avg, Duration::from_micros(1));
        assert!(approx(report.waiting.percentage, 100.0));
        assert!(approx(report.task_handling.percentage, 0.0));
    }

    #[test]
    fn second_classifier_in_a_quantum_fails() {
        let mut log = logger(1);
        log.log_processor_tick(2).unwrap();
        log.log_overhead_tick().unwrap();
        let err = log.log_task_processing("a", Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, SimError::DoubleClassify { processor: 2 }));
    }

    #[test]
    fn duplicate_processor_tick_fails() {
        let mut log = logger(1);
        log.log_processor_tick(0).unwrap();
        let err = log.log_processor_tick(0).unwrap_err();
        assert!(matches!(err, SimError::DuplicateProcessorTick { processor: 0 }));
    }

    #[test]
    fn classifier_without_tick_fails() {
        let mut log = logger(1);
        let err = log.log_overhead_tick().unwrap_err();
        assert!(matches!(err, SimError::UnattributedEvent));
    }

    #[test]
    fn shift_time_resets_the_classifier_slots() {
        let mut log = logger(1);
        log.log_processor_tick(0).unwrap();
        log.log_overhead_tick().unwrap();
        log.shift_time();
        // Same processor can tick and classify again in the next quantum.
        log.log_processor_tick(0).unwrap();
        log.log_overhead_tick().unwrap();
    }

    #[test]
    fn classifiers_attach_to_the_last_ticked_processor() {
        let mut log = logger(1);
        log.log_processor_tick(0).unwrap();
        log.log_task_processing("a", Uuid::new_v4()).unwrap();
        log.log_processor_tick(1).unwrap();
        log.log_overhead_tick().unwrap();
        log.shift_time();
        let (report, _) = log.close();
        // One processor all-processing, one all-overhead.
        assert!(approx(report.task_handling.percentage, 50.0));
        assert!(approx(report.overhead.percentage, 50.0));
        assert!(approx(report.waiting.percentage, 0.0));
    }

    #[test]
    fn interim_reports_follow_publish_every() {
        let mut log = TimeLogger::new(
            LogConfig::new("test", Duration::from_micros(1))
                .publish_every(Duration::from_micros(2)),
        );
        for _ in 0..5 {
            log.log_processor_tick(0).unwrap();
            log.shift_time();
        }
        let (report, interim) = log.close();
        assert_eq!(interim.len(), 2);
        assert_eq!(interim[0].simulation_duration, Duration::from_micros(2));
        assert_eq!(interim[1].simulation_duration, Duration::from_micros(4));
        assert_eq!(report.simulation_duration, Duration::from_micros(5));
    }

    #[test]
    fn run_logging_scopes_the_ambient_logger() {
        let config = LogConfig::new("scoped", Duration::from_micros(1));
        let (value, report, _) = LogContext::run_logging(config, || {
            LogContext::log(|l| l.log_processor_tick(0))?;
            LogContext::shift_time()?;
            Ok(7)
        })
        .unwrap();
        assert_eq!(value, 7);
        assert_eq!(report.simulation_duration, Duration::from_micros(1));
        // Outside the run the ambient slot is empty again: logging is a no-op.
        LogContext::log(|_| panic!("no logger should be installed")).unwrap();
    }
}
