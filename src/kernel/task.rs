//! Task abstraction
//!
//! A Task wraps a resumable body plus the metadata the scheduler needs:
//! name, priority, state and the conditions it is currently blocked on.
//! Bodies run until they voluntarily suspend. Nothing interrupts them.

use super::condition::BoxCondition;
use serde::Serialize;
use std::fmt;

/// Unique identifier for a task
///
/// Ids are never reused, so a stale id can't reach a newer task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Task({})", self.0)
    }
}

/// Task execution state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TaskState {
    /// Eligible to run
    Ready,
    /// Holds the run slot
    Running,
    /// Waiting on one or more conditions
    Blocked,
    /// Body finished. Terminal.
    Terminated,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskState::Ready => write!(f, "READY"),
            TaskState::Running => write!(f, "RUNNING"),
            TaskState::Blocked => write!(f, "BLOCKED"),
            TaskState::Terminated => write!(f, "TERMINATED"),
        }
    }
}

/// Task priority (lower number = more important)
///
/// Tasks spawned without a priority get `LOWEST`, so they all tie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Priority(pub u32);

impl Priority {
    /// Most important
    pub const HIGHEST: Priority = Priority(0);
    /// Least important, the default
    pub const LOWEST: Priority = Priority(u32::MAX);
}

impl Default for Priority {
    fn default() -> Self {
        Priority::LOWEST
    }
}

impl From<u32> for Priority {
    fn from(value: u32) -> Self {
        Priority(value)
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Priority::LOWEST {
            write!(f, "lowest")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// What a body reports when it stops running
pub enum Step {
    /// Suspend until any of these fires. An empty set keeps the run slot.
    Suspend(Vec<BoxCondition>),
    /// The body is done
    Complete,
}

impl Step {
    /// Suspend on a single condition
    pub fn wait(condition: BoxCondition) -> Self {
        Step::Suspend(vec![condition])
    }

    /// Suspend on the first of several conditions
    pub fn wait_any(conditions: Vec<BoxCondition>) -> Self {
        Step::Suspend(conditions)
    }

    /// Give control back without blocking
    pub fn yield_now() -> Self {
        Step::Suspend(Vec::new())
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Suspend(conds) => {
                let kinds: Vec<&str> = conds.iter().map(|c| c.kind()).collect();
                f.debug_tuple("Suspend").field(&kinds).finish()
            }
            Step::Complete => write!(f, "Complete"),
        }
    }
}

/// Unrecoverable failure inside a task body
///
/// The scheduler treats it exactly like completion: the task is removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyError {
    message: String,
}

impl BodyError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for BodyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task body failed: {}", self.message)
    }
}

impl std::error::Error for BodyError {}

/// A resumable unit of work
///
/// `resume` runs from the last suspension point to the next one. Bodies
/// should suspend at least once per call; a body that never returns stalls
/// every other task.
pub trait TaskBody {
    fn resume(&mut self) -> Result<Step, BodyError>;
}

/// Body built from a closure called once per resume
pub struct FnBody<F> {
    f: F,
}

impl<F> FnBody<F>
where
    F: FnMut() -> Result<Step, BodyError>,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> TaskBody for FnBody<F>
where
    F: FnMut() -> Result<Step, BodyError>,
{
    fn resume(&mut self) -> Result<Step, BodyError> {
        (self.f)()
    }
}

/// Outcome of one `Task::resume`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resumed {
    /// Body suspended with this many conditions now pending
    Suspended(usize),
    /// Body finished or failed; the task must be discarded
    Completed,
}

/// A scheduled task
pub struct Task {
    id: TaskId,
    name: String,
    priority: Priority,
    state: TaskState,
    body: Box<dyn TaskBody>,
    pending: Vec<BoxCondition>,
    resumes: u64,
}

impl Task {
    pub fn new(id: TaskId, name: impl Into<String>, priority: Priority, body: Box<dyn TaskBody>) -> Self {
        Self {
            id,
            name: name.into(),
            priority,
            state: TaskState::Ready,
            body,
            pending: Vec::new(),
            resumes: 0,
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    /// Conditions the task is blocked on (empty unless blocked)
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// How many times the body has been resumed
    pub fn resumes(&self) -> u64 {
        self.resumes
    }

    pub(crate) fn set_state(&mut self, state: TaskState) {
        self.state = state;
    }

    /// Move to Blocked if conditions are pending, otherwise keep running
    pub(crate) fn settle_after_resume(&mut self) {
        self.state = if self.pending.is_empty() {
            TaskState::Running
        } else {
            TaskState::Blocked
        };
    }

    /// Poll every pending condition once, in order
    ///
    /// All conditions advance even after one has fired. Returns whether any
    /// fired this round.
    pub(crate) fn poll_conditions(&mut self) -> bool {
        let mut fired = false;
        for condition in self.pending.iter_mut() {
            fired |= condition.poll();
        }
        fired
    }

    /// Blocked → Ready, dropping the conditions
    pub(crate) fn wake(&mut self) {
        self.pending.clear();
        self.state = TaskState::Ready;
    }

    /// Run the body to its next suspension point
    pub fn resume(&mut self) -> Resumed {
        self.resumes += 1;
        match self.body.resume() {
            Ok(Step::Suspend(conditions)) => {
                self.pending = conditions;
                Resumed::Suspended(self.pending.len())
            }
            Ok(Step::Complete) => {
                self.finish();
                Resumed::Completed
            }
            Err(e) => {
                log::warn!("task '{}' ({}) failed: {}", self.name, self.id, e);
                self.finish();
                Resumed::Completed
            }
        }
    }

    fn finish(&mut self) {
        self.pending.clear();
        self.state = TaskState::Terminated;
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("state", &self.state)
            .field("pending", &self.pending.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::condition::{Delay, Never};

    fn task_with<F>(f: F) -> Task
    where
        F: FnMut() -> Result<Step, BodyError> + 'static,
    {
        Task::new(TaskId(1), "t", Priority::default(), Box::new(FnBody::new(f)))
    }

    #[test]
    fn test_new_task_is_ready() {
        let task = task_with(|| Ok(Step::Complete));
        assert_eq!(task.state(), TaskState::Ready);
        assert_eq!(task.priority(), Priority::LOWEST);
        assert_eq!(task.pending_count(), 0);
        assert_eq!(task.resumes(), 0);
    }

    #[test]
    fn test_resume_suspend_replaces_conditions() {
        let mut task = task_with(|| Ok(Step::wait_any(vec![Box::new(Never), Box::new(Never)])));

        assert_eq!(task.resume(), Resumed::Suspended(2));
        assert_eq!(task.pending_count(), 2);
        task.settle_after_resume();
        assert_eq!(task.state(), TaskState::Blocked);
    }

    #[test]
    fn test_empty_suspend_keeps_running() {
        let mut task = task_with(|| Ok(Step::yield_now()));
        assert_eq!(task.resume(), Resumed::Suspended(0));
        task.settle_after_resume();
        assert_eq!(task.state(), TaskState::Running);
    }

    #[test]
    fn test_completion_is_terminal() {
        let mut task = task_with(|| Ok(Step::Complete));
        assert_eq!(task.resume(), Resumed::Completed);
        assert_eq!(task.state(), TaskState::Terminated);
    }

    #[test]
    fn test_body_error_counts_as_completion() {
        let mut task = task_with(|| Err(BodyError::new("sensor bus gone")));
        assert_eq!(task.resume(), Resumed::Completed);
        assert_eq!(task.state(), TaskState::Terminated);
        assert_eq!(task.resumes(), 1);
    }

    #[test]
    fn test_poll_conditions_advances_all() {
        // First fires on poll 1, second on poll 2. Both must advance.
        let mut task = task_with(|| Ok(Step::wait_any(vec![Box::new(Delay::new(0)), Box::new(Delay::new(1))])));
        task.resume();

        assert!(task.poll_conditions());
        // second delay was stepped too, so it now fires on its own
        task.pending.remove(0);
        assert!(task.poll_conditions());
    }

    #[test]
    fn test_wake_clears_conditions() {
        let mut task = task_with(|| Ok(Step::wait(Box::new(Never))));
        task.resume();
        task.settle_after_resume();
        task.wake();
        assert_eq!(task.state(), TaskState::Ready);
        assert_eq!(task.pending_count(), 0);
    }

    #[test]
    fn test_priority_ordering_and_display() {
        assert!(Priority(1) < Priority(2));
        assert!(Priority::HIGHEST < Priority::LOWEST);
        assert_eq!(format!("{}", Priority(3)), "3");
        assert_eq!(format!("{}", Priority::LOWEST), "lowest");
        assert_eq!(format!("{}", TaskState::Blocked), "BLOCKED");
        assert_eq!(format!("{}", TaskId(4)), "Task(4)");
    }

    #[test]
    fn test_body_error_display() {
        let err = BodyError::new("boom");
        assert_eq!(err.message(), "boom");
        assert_eq!(format!("{}", err), "task body failed: boom");
    }
}
