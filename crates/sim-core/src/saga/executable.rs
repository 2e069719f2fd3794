//! Executable work units bound to kernel threads.
//!
//! An [`Executable`] is a tagged sum rather than a trait object: the three
//! shapes are known, owned in a strict tree, and dispatched by match.

use crate::error::{Result, SimError};
use crate::saga::task::Task;
use serde::{Deserialize, Serialize};
use sim_time::TimeDelta;
use std::collections::VecDeque;

/// A unit of work a processor can be handed.
#[derive(Debug, Clone)]
pub enum Executable {
    /// One saga: its tasks run strictly in order.
    Saga(SimpleSaga),
    /// Several executables multiplexed cooperatively.
    Coroutine(CoroutineSaga),
    /// Several executables exhausted strictly in turn.
    Chain(ChainOfExecutables),
}

impl Executable {
    pub fn is_finished(&self) -> bool {
        match self {
            Executable::Saga(saga) => saga.is_finished(),
            Executable::Coroutine(coroutine) => coroutine.is_finished(),
            Executable::Chain(chain) => chain.is_finished(),
        }
    }

    /// The task heads currently runnable or awaited by this executable.
    pub fn current_tasks(&self) -> Vec<&Task> {
        match self {
            Executable::Saga(saga) => saga.current_task().into_iter().collect(),
            Executable::Coroutine(coroutine) => coroutine.current_tasks(),
            Executable::Chain(chain) => chain.current_tasks(),
        }
    }

    pub fn current_tasks_mut(&mut self) -> Vec<&mut Task> {
        match self {
            Executable::Saga(saga) => saga.current_task_mut().into_iter().collect(),
            Executable::Coroutine(coroutine) => coroutine.current_tasks_mut(),
            Executable::Chain(chain) => chain.current_tasks_mut(),
        }
    }

    pub fn ticked(&mut self, delta: &TimeDelta) -> Result<()> {
        match self {
            Executable::Saga(saga) => saga.ticked(delta),
            Executable::Coroutine(coroutine) => coroutine.ticked(delta),
            Executable::Chain(chain) => chain.ticked(delta),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Executable::Saga(saga) => saga.name(),
            Executable::Coroutine(coroutine) => coroutine.name(),
            Executable::Chain(chain) => chain.name(),
        }
    }

    /// True when every current task is waiting; such an executable cannot
    /// use a processor right now.
    pub fn is_blocked(&self) -> bool {
        let tasks = self.current_tasks();
        !tasks.is_empty() && tasks.iter().all(|task| task.is_waiting())
    }
}

impl From<SimpleSaga> for Executable {
    fn from(saga: SimpleSaga) -> Self {
        Executable::Saga(saga)
    }
}

impl From<CoroutineSaga> for Executable {
    fn from(coroutine: CoroutineSaga) -> Self {
        Executable::Coroutine(coroutine)
    }
}

impl From<ChainOfExecutables> for Executable {
    fn from(chain: ChainOfExecutables) -> Self {
        Executable::Chain(chain)
    }
}

/// An ordered sequence of tasks executed head-first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimpleSaga {
    tasks: VecDeque<Task>,
    name: String,
}

impl SimpleSaga {
    pub fn new(tasks: Vec<Task>, name: impl Into<String>) -> Self {
        SimpleSaga {
            tasks: tasks.into(),
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_finished(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn current_task(&self) -> Option<&Task> {
        self.tasks.front()
    }

    pub fn current_task_mut(&mut self) -> Option<&mut Task> {
        self.tasks.front_mut()
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }

    /// Tick the head task; a waiting head swallows the grant unused.
    pub fn ticked(&mut self, delta: &TimeDelta) -> Result<()> {
        let task = match self.tasks.front_mut() {
            Some(task) => task,
            None => return Ok(()),
        };
        if task.is_waiting() {
            return Ok(());
        }
        task.ticked(delta)?;
        if task.is_complete() {
            self.tasks.pop_front();
        }
        Ok(())
    }
}

/// Cooperative multiplexing of several executables.
///
/// On each tick the front member runs unless all of its current tasks are
/// waiting, in which case it rotates to the back and the next member is
/// examined. When every member is waiting, no member is ticked and the ring
/// is left advanced by exactly one position, so repeated all-waiting ticks
/// cycle the resume point. Worst case O(k) work per tick for k members.
#[derive(Debug, Clone)]
pub struct CoroutineSaga {
    executables: VecDeque<Executable>,
    name: String,
}

impl CoroutineSaga {
    /// Coroutine members must not themselves be coroutines.
    pub fn new(executables: Vec<Executable>, name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if executables
            .iter()
            .any(|e| matches!(e, Executable::Coroutine(_)))
        {
            return Err(SimError::NestedCoroutine { name });
        }
        Ok(CoroutineSaga {
            executables: executables.into(),
            name,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_finished(&self) -> bool {
        self.executables.is_empty()
    }

    pub fn current_tasks(&self) -> Vec<&Task> {
        self.executables
            .iter()
            .flat_map(|e| e.current_tasks())
            .collect()
    }

    pub fn current_tasks_mut(&mut self) -> Vec<&mut Task> {
        self.executables
            .iter_mut()
            .flat_map(|e| e.current_tasks_mut())
            .collect()
    }

    /// Order of the member executables, front first.
    pub fn member_names(&self) -> Vec<&str> {
        self.executables.iter().map(|e| e.name()).collect()
    }

    pub fn ticked(&mut self, delta: &TimeDelta) -> Result<()> {
        let mut examined = 0;
        let limit = self.executables.len();
        while examined < limit {
            let front = match self.executables.front_mut() {
                Some(front) => front,
                None => return Ok(()),
            };
            if front.is_finished() {
                self.executables.pop_front();
                examined += 1;
                continue;
            }
            if front.is_blocked() {
                self.executables.rotate_left(1);
                examined += 1;
                continue;
            }
            front.ticked(delta)?;
            if front.is_finished() {
                self.executables.pop_front();
            }
            return Ok(());
        }
        // Every member is waiting: nobody ran, leave the ring advanced by
        // one so the next tick resumes from a different member.
        if self.executables.len() > 1 {
            self.executables.rotate_left(1);
        }
        Ok(())
    }
}

/// Executables exhausted strictly in turn; only the head is visible.
#[derive(Debug, Clone)]
pub struct ChainOfExecutables {
    executables: VecDeque<Executable>,
    name: String,
}

impl ChainOfExecutables {
    pub fn new(executables: Vec<Executable>, name: impl Into<String>) -> Self {
        ChainOfExecutables {
            executables: executables.into(),
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.executables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.executables.is_empty()
    }

    pub fn is_finished(&self) -> bool {
        self.executables.iter().all(|e| e.is_finished())
    }

    pub fn current_tasks(&self) -> Vec<&Task> {
        match self.executables.front() {
            Some(head) => head.current_tasks(),
            None => Vec::new(),
        }
    }

    pub fn current_tasks_mut(&mut self) -> Vec<&mut Task> {
        match self.executables.front_mut() {
            Some(head) => head.current_tasks_mut(),
            None => Vec::new(),
        }
    }

    pub fn ticked(&mut self, delta: &TimeDelta) -> Result<()> {
        while matches!(self.executables.front(), Some(head) if head.is_finished()) {
            self.executables.pop_front();
        }
        let head = match self.executables.front_mut() {
            Some(head) => head,
            None => return Ok(()),
        };
        head.ticked(delta)?;
        if head.is_finished() {
            self.executables.pop_front();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::saga::task::SystemOperation;
    use sim_time::Duration;

    fn task(ops: &[(bool, i64)]) -> Task {
        let operations = ops
            .iter()
            .map(|(to_process, micros)| {
                SystemOperation::new(*to_process, "op", Duration::from_micros(*micros)).unwrap()
            })
            .collect();
        Task::new(operations, "task").unwrap()
    }

    fn saga(name: &str, ops: &[(bool, i64)]) -> SimpleSaga {
        SimpleSaga::new(vec![task(ops)], name)
    }

    fn delta(micros: i64) -> TimeDelta {
        TimeDelta::new(Duration::from_micros(micros))
    }

    #[test]
    fn simple_saga_pops_completed_tasks() {
        let mut saga = SimpleSaga::new(vec![task(&[(true, 1)]), task(&[(true, 1)])], "s");
        saga.ticked(&delta(1)).unwrap();
        assert!(!saga.is_finished());
        saga.ticked(&delta(1)).unwrap();
        assert!(saga.is_finished());
    }

    #[test]
    fn simple_saga_does_not_consume_grants_while_waiting() {
        let mut saga = saga("s", &[(false, 2), (true, 1)]);
        // Waiting head: the grant is swallowed without advancing anything.
        saga.ticked(&delta(5)).unwrap();
        assert!(saga.current_task().unwrap().is_waiting());
        assert!(!saga.is_finished());
    }

    #[test]
    fn finished_simple_saga_ignores_ticks() {
        let mut saga = SimpleSaga::new(Vec::new(), "empty");
        assert!(saga.is_finished());
        saga.ticked(&delta(1)).unwrap();
    }

    #[test]
    fn coroutine_rejects_nested_coroutines() {
        let inner = CoroutineSaga::new(vec![saga("a", &[(true, 1)]).into()], "inner").unwrap();
        let err = CoroutineSaga::new(vec![inner.into()], "outer").unwrap_err();
        assert!(matches!(err, SimError::NestedCoroutine { .. }));
    }

    #[test]
    fn coroutine_ticks_the_first_runnable_member() {
        let mut coroutine = CoroutineSaga::new(
            vec![
                saga("a", &[(false, 10), (true, 1)]).into(),
                saga("b", &[(false, 10), (true, 1)]).into(),
                saga("c", &[(true, 2)]).into(),
            ],
            "co",
        )
        .unwrap();

        coroutine.ticked(&delta(1)).unwrap();
        // The two waiting members rotated behind the runnable one, which ran
        // and now heads the ring.
        assert_eq!(coroutine.member_names(), vec!["c", "a", "b"]);

        coroutine.ticked(&delta(1)).unwrap();
        // c's only task completed, so c was dropped.
        assert_eq!(coroutine.member_names(), vec!["a", "b"]);
    }

    #[test]
    fn all_waiting_coroutine_rotates_exactly_once() {
        let mut coroutine = CoroutineSaga::new(
            vec![
                saga("a", &[(false, 10)]).into(),
                saga("b", &[(false, 10)]).into(),
                saga("c", &[(false, 10)]).into(),
            ],
            "co",
        )
        .unwrap();

        coroutine.ticked(&delta(1)).unwrap();
        assert_eq!(coroutine.member_names(), vec!["b", "c", "a"]);
        coroutine.ticked(&delta(1)).unwrap();
        assert_eq!(coroutine.member_names(), vec!["c", "a", "b"]);
    }

    #[test]
    fn all_waiting_coroutine_ticks_no_member() {
        let mut coroutine = CoroutineSaga::new(
            vec![
                saga("a", &[(false, 2)]).into(),
                saga("b", &[(false, 2)]).into(),
            ],
            "co",
        )
        .unwrap();
        coroutine.ticked(&delta(1)).unwrap();
        // No member advanced: every task still has its full wait ahead.
        for task in coroutine.current_tasks() {
            assert!(task.is_waiting());
            assert!(!task.is_complete());
        }
    }

    #[test]
    fn coroutine_drops_finished_members_while_scanning() {
        let mut coroutine = CoroutineSaga::new(
            vec![
                SimpleSaga::new(Vec::new(), "done").into(),
                saga("live", &[(true, 1)]).into(),
            ],
            "co",
        )
        .unwrap();
        coroutine.ticked(&delta(1)).unwrap();
        assert!(coroutine.is_finished());
    }

    #[test]
    fn coroutine_current_tasks_concatenates_members() {
        let coroutine = CoroutineSaga::new(
            vec![
                saga("a", &[(true, 1)]).into(),
                saga("b", &[(false, 1)]).into(),
            ],
            "co",
        )
        .unwrap();
        assert_eq!(coroutine.current_tasks().len(), 2);
    }

    #[test]
    fn chain_runs_members_in_turn() {
        let mut chain = ChainOfExecutables::new(
            vec![saga("a", &[(true, 1)]).into(), saga("b", &[(true, 2)]).into()],
            "chain",
        );
        assert_eq!(chain.len(), 2);
        chain.ticked(&delta(1)).unwrap();
        assert_eq!(chain.len(), 1);
        assert!(!chain.is_finished());
        chain.ticked(&delta(1)).unwrap();
        chain.ticked(&delta(1)).unwrap();
        assert!(chain.is_finished());
    }

    #[test]
    fn chain_exposes_only_the_head_tasks() {
        let chain = ChainOfExecutables::new(
            vec![saga("a", &[(true, 1)]).into(), saga("b", &[(false, 5)]).into()],
            "chain",
        );
        let tasks = chain.current_tasks();
        assert_eq!(tasks.len(), 1);
        assert!(!tasks[0].is_waiting());
    }

    #[test]
    fn empty_chain_is_finished() {
        let chain = ChainOfExecutables::new(Vec::new(), "chain");
        assert!(chain.is_finished());
        assert!(chain.current_tasks().is_empty());
    }
}
