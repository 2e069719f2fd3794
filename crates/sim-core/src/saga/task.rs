//! Tasks and the system operations they consume.

use crate::error::{Result, SimError};
use crate::log::LogContext;
use serde::{Deserialize, Serialize};
use sim_time::{DeltaId, Duration, TimeDelta};
use std::collections::VecDeque;
use std::fmt;
use uuid::Uuid;

/// One unit of work inside a task: either CPU-bound ("processing") or
/// externally-bound ("waiting"), with a positive duration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemOperation {
    to_process: bool,
    name: String,
    duration: Duration,
}

impl SystemOperation {
    pub fn new(to_process: bool, name: impl Into<String>, duration: Duration) -> Result<Self> {
        let name = name.into();
        if !duration.is_positive() {
            return Err(SimError::NonPositiveOperation { name, duration });
        }
        Ok(SystemOperation {
            to_process,
            name,
            duration,
        })
    }

    /// A CPU-bound operation.
    pub fn processing(name: impl Into<String>, duration: Duration) -> Result<Self> {
        Self::new(true, name, duration)
    }

    /// An externally-bound operation that advances without a processor.
    pub fn waiting(name: impl Into<String>, duration: Duration) -> Result<Self> {
        Self::new(false, name, duration)
    }

    pub fn is_processing(&self) -> bool {
        self.to_process
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }
}

/// An ordered, initially non-empty sequence of system operations.
///
/// The head operation accumulates time through [`Task::ticked`] (processing
/// heads) or [`Task::wait`] (waiting heads). When the head's duration is
/// covered it is popped; leftover time carries into the next operation only
/// when it is of the same kind, otherwise the residue is discarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    operations: VecDeque<SystemOperation>,
    name: String,
    id: Uuid,
    /// Time consumed within the current head operation.
    processed: Duration,
    /// Identity of the last tick grant applied, for duplicate suppression.
    #[serde(skip)]
    last_delta: Option<DeltaId>,
}

impl Task {
    pub fn new(operations: Vec<SystemOperation>, name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if operations.is_empty() {
            return Err(SimError::EmptyTask { name });
        }
        Ok(Task {
            operations: operations.into(),
            name,
            id: Uuid::new_v4(),
            processed: Duration::ZERO,
            last_delta: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_complete(&self) -> bool {
        self.operations.is_empty()
    }

    /// Remaining operations, head first.
    pub fn operations(&self) -> impl Iterator<Item = &SystemOperation> {
        self.operations.iter()
    }

    /// True while the head operation advances without a processor.
    pub fn is_waiting(&self) -> bool {
        match self.operations.front() {
            Some(head) => !head.is_processing(),
            None => false,
        }
    }

    /// Advance the head processing operation by the grant's duration.
    ///
    /// A grant whose identity was already applied is ignored. Ticking a
    /// waiting task is a phase error; ticking a complete task is a no-op.
    pub fn ticked(&mut self, delta: &TimeDelta) -> Result<()> {
        if self.is_complete() {
            return Ok(());
        }
        if self.is_waiting() {
            return Err(SimError::TickedWhileWaiting {
                name: self.name.clone(),
            });
        }
        if self.already_seen(delta) {
            return Ok(());
        }
        LogContext::log(|logger| logger.log_task_processing(&self.name, self.id))?;
        self.processed += delta.duration;
        self.finish_head_if_covered();
        Ok(())
    }

    /// Advance the head waiting operation by the grant's duration.
    ///
    /// Symmetric to [`Task::ticked`]; no log event is emitted, the
    /// accounting logger classifies unredeemed quanta as waiting on its own.
    pub fn wait(&mut self, delta: &TimeDelta) -> Result<()> {
        if self.is_complete() {
            return Ok(());
        }
        if !self.is_waiting() {
            return Err(SimError::WaitedWhileProcessing {
                name: self.name.clone(),
            });
        }
        if self.already_seen(delta) {
            return Ok(());
        }
        self.processed += delta.duration;
        self.finish_head_if_covered();
        Ok(())
    }

    fn already_seen(&mut self, delta: &TimeDelta) -> bool {
        if self.last_delta == Some(delta.id) {
            return true;
        }
        self.last_delta = Some(delta.id);
        false
    }

    /// Pop the head once its duration is covered. The excess transfers to
    /// the next operation only when the kinds match; at most one pop per
    /// grant.
    fn finish_head_if_covered(&mut self) {
        let head = match self.operations.front() {
            Some(head) => head,
            None => return,
        };
        if self.processed < head.duration() {
            return;
        }
        let residue = self.processed - head.duration();
        let finished_kind = head.is_processing();
        self.operations.pop_front();
        self.processed = match self.operations.front() {
            Some(next) if next.is_processing() == finished_kind => residue,
            _ => Duration::ZERO,
        };
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}
