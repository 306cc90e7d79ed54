//! Cooperative scheduler
//!
//! One run slot, no preemption:
//! - Each tick scans the registry once, front to back
//! - At most one task body is resumed per tick
//! - A running task keeps the slot until it blocks, finishes, or a strictly
//!   more important task becomes eligible
//! - Equal priority never displaces the incumbent; among the rest, earlier
//!   registration wins
//!
//! The driver loop lives outside: call `tick()` forever.

use super::async_body::{AsyncBody, Suspender};
use super::registry::TaskRegistry;
use super::stats::SchedulerStats;
use super::task::{BodyError, Priority, Resumed, Task, TaskBody, TaskId, TaskState};
use serde::Serialize;
use std::future::Future;

/// What happened to the resumed task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickResult {
    /// Suspended with no conditions; keeps the run slot
    Running,
    /// Blocked on this many conditions
    Blocked(usize),
    /// Finished (or failed) and was removed
    Terminated,
}

/// Result of one tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing was eligible
    Idle,
    /// One task body was resumed
    Ran { id: TaskId, result: TickResult },
}

impl TickOutcome {
    /// Id of the resumed task, if any
    pub fn task(&self) -> Option<TaskId> {
        match self {
            TickOutcome::Idle => None,
            TickOutcome::Ran { id, .. } => Some(*id),
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, TickOutcome::Idle)
    }
}

/// Point-in-time view of one task
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskSnapshot {
    pub id: TaskId,
    pub name: String,
    pub priority: Priority,
    pub state: TaskState,
    pub pending: usize,
    pub resumes: u64,
}

impl From<&Task> for TaskSnapshot {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id(),
            name: task.name().to_string(),
            priority: task.priority(),
            state: task.state(),
            pending: task.pending_count(),
            resumes: task.resumes(),
        }
    }
}

/// The scheduler - owns every task and advances one per tick
#[derive(Debug, Default)]
pub struct Scheduler {
    registry: TaskRegistry,
    next_id: u64,
    stats: SchedulerStats,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            registry: TaskRegistry::new(),
            next_id: 0,
            stats: SchedulerStats::new(),
        }
    }

    /// Add a task at the lowest priority
    pub fn spawn<B>(&mut self, name: impl Into<String>, body: B) -> TaskId
    where
        B: TaskBody + 'static,
    {
        self.spawn_with_priority(name, Priority::default(), body)
    }

    /// Add a task with an explicit priority
    pub fn spawn_with_priority<B>(
        &mut self,
        name: impl Into<String>,
        priority: Priority,
        body: B,
    ) -> TaskId
    where
        B: TaskBody + 'static,
    {
        let id = TaskId(self.next_id);
        self.next_id += 1;

        let task = Task::new(id, name, priority, Box::new(body));
        log::info!("spawned '{}' ({}) priority {}", task.name(), id, task.priority());
        self.stats.record_spawn();
        self.registry.push(task)
    }

    /// Add a task whose body is an async block
    pub fn spawn_async<F, Fut>(
        &mut self,
        name: impl Into<String>,
        priority: Priority,
        make: F,
    ) -> TaskId
    where
        F: FnOnce(Suspender) -> Fut,
        Fut: Future<Output = Result<(), BodyError>> + 'static,
    {
        self.spawn_with_priority(name, priority, AsyncBody::new(make))
    }

    /// Run one scheduling round
    pub fn tick(&mut self) -> TickOutcome {
        let Some(id) = self.select() else {
            self.stats.record_idle();
            log::trace!("tick: idle");
            return TickOutcome::Idle;
        };

        debug_assert!(self.registry.contains(id), "selected {} is not registered", id);
        let Some(task) = self.registry.get_mut(id) else {
            return TickOutcome::Idle;
        };

        task.set_state(TaskState::Running);
        log::trace!("tick: resuming '{}'", task.name());
        let resumed = task.resume();
        self.stats.record_resume(id);

        let result = match resumed {
            Resumed::Suspended(0) => {
                task.settle_after_resume();
                TickResult::Running
            }
            Resumed::Suspended(n) => {
                task.settle_after_resume();
                log::debug!("'{}' blocked on {} condition(s)", task.name(), n);
                TickResult::Blocked(n)
            }
            Resumed::Completed => {
                if let Some(done) = self.registry.remove(id) {
                    log::info!("'{}' ({}) finished and was removed", done.name(), id);
                }
                self.stats.record_termination();
                TickResult::Terminated
            }
        };

        debug_assert!(self.registry.count_in(TaskState::Running) <= 1);
        TickOutcome::Ran { id, result }
    }

    /// Scan the registry and pick the task to resume
    fn select(&mut self) -> Option<TaskId> {
        let mut candidate: Option<(TaskId, Priority)> = None;
        let stats = &mut self.stats;

        self.registry.for_each_mut(|task| match task.state() {
            TaskState::Ready => {
                if candidate.is_none() {
                    candidate = Some((task.id(), task.priority()));
                }
            }
            TaskState::Blocked => {
                if task.poll_conditions() {
                    task.wake();
                    stats.record_wakeup();
                    log::debug!("'{}' woke up", task.name());
                    if candidate.is_none() {
                        candidate = Some((task.id(), task.priority()));
                    }
                }
            }
            TaskState::Running => {
                let outranked = matches!(candidate, Some((_, best)) if task.priority() > best);
                if outranked {
                    task.set_state(TaskState::Ready);
                    stats.record_displacement();
                    log::debug!("'{}' displaced by a more important task", task.name());
                } else {
                    candidate = Some((task.id(), task.priority()));
                }
            }
            // removed in the tick that observed it
            TaskState::Terminated => {}
        });

        candidate.map(|(id, _)| id)
    }

    /// Run `n` ticks, returning how many resumed a task
    pub fn run_ticks(&mut self, n: usize) -> usize {
        (0..n).filter(|_| !self.tick().is_idle()).count()
    }

    /// Tick until a round is idle or `max_ticks` is reached
    ///
    /// Returns the number of ticks that resumed a task.
    pub fn run_until_idle(&mut self, max_ticks: usize) -> usize {
        let mut ran = 0;
        for _ in 0..max_ticks {
            if self.tick().is_idle() {
                break;
            }
            ran += 1;
        }
        ran
    }

    /// Number of live tasks
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.registry.contains(id)
    }

    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.registry.get(id)
    }

    pub fn state_of(&self, id: TaskId) -> Option<TaskState> {
        self.registry.get(id).map(|t| t.state())
    }

    /// The task holding the run slot, if any
    pub fn running(&self) -> Option<TaskId> {
        self.registry
            .iter()
            .find(|t| t.state() == TaskState::Running)
            .map(|t| t.id())
    }

    /// Live tasks in registry order
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.registry.iter()
    }

    pub fn snapshot(&self) -> Vec<TaskSnapshot> {
        self.registry.iter().map(TaskSnapshot::from).collect()
    }

    pub fn stats(&self) -> &SchedulerStats {
        &self.stats
    }
}
