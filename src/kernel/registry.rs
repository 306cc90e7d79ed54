//! Task registry
//!
//! Every live task, in insertion order. Order matters: the scheduler scans
//! front to back and the first eligible task wins ties.
//!
//! Tasks sit in a slab so removal doesn't shift storage; a separate key list
//! keeps the insertion order.

use super::task::{Task, TaskId, TaskState};
use slab::Slab;

/// Insertion-ordered collection of live tasks
#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: Slab<Task>,
    order: Vec<usize>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self {
            tasks: Slab::new(),
            order: Vec::new(),
        }
    }

    /// Append a task at the tail
    pub fn push(&mut self, task: Task) -> TaskId {
        let id = task.id();
        let key = self.tasks.insert(task);
        self.order.push(key);
        id
    }

    /// Remove a task, returning it if it was present
    pub fn remove(&mut self, id: TaskId) -> Option<Task> {
        let pos = self.position(id)?;
        let key = self.order.remove(pos);
        Some(self.tasks.remove(key))
    }

    pub fn get(&self, id: TaskId) -> Option<&Task> {
        let pos = self.position(id)?;
        self.tasks.get(self.order[pos])
    }

    pub fn get_mut(&mut self, id: TaskId) -> Option<&mut Task> {
        let pos = self.position(id)?;
        self.tasks.get_mut(self.order[pos])
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.position(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Tasks in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.order.iter().map(|&key| &self.tasks[key])
    }

    /// Visit every task in insertion order with mutable access
    pub fn for_each_mut<F>(&mut self, mut f: F)
    where
        F: FnMut(&mut Task),
    {
        for &key in &self.order {
            f(&mut self.tasks[key]);
        }
    }

    /// Number of tasks currently in `state`
    pub fn count_in(&self, state: TaskState) -> usize {
        self.iter().filter(|t| t.state() == state).count()
    }

    fn position(&self, id: TaskId) -> Option<usize> {
        self.order.iter().position(|&key| self.tasks[key].id() == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::task::{FnBody, Priority, Step};

    fn task(id: u64, name: &str) -> Task {
        Task::new(TaskId(id), name, Priority::default(), Box::new(FnBody::new(|| Ok(Step::Complete))))
    }

    fn names(reg: &TaskRegistry) -> Vec<String> {
        reg.iter().map(|t| t.name().to_string()).collect()
    }

    #[test]
    fn test_push_preserves_order() {
        let mut reg = TaskRegistry::new();
        reg.push(task(1, "a"));
        reg.push(task(2, "b"));
        reg.push(task(3, "c"));

        assert_eq!(reg.len(), 3);
        assert_eq!(names(&reg), ["a", "b", "c"]);
    }

    #[test]
    fn test_remove_keeps_relative_order() {
        let mut reg = TaskRegistry::new();
        reg.push(task(1, "a"));
        reg.push(task(2, "b"));
        reg.push(task(3, "c"));

        let removed = reg.remove(TaskId(2)).unwrap();
        assert_eq!(removed.name(), "b");
        assert_eq!(names(&reg), ["a", "c"]);
        assert!(!reg.contains(TaskId(2)));
        assert!(reg.remove(TaskId(2)).is_none());
    }

    #[test]
    fn test_reused_slot_goes_to_tail() {
        // The slab reuses b's slot, but d must still be scanned last.
        let mut reg = TaskRegistry::new();
        reg.push(task(1, "a"));
        reg.push(task(2, "b"));
        reg.push(task(3, "c"));
        reg.remove(TaskId(2));
        reg.push(task(4, "d"));

        assert_eq!(names(&reg), ["a", "c", "d"]);
    }

    #[test]
    fn test_lookup() {
        let mut reg = TaskRegistry::new();
        reg.push(task(7, "sensor"));

        assert_eq!(reg.get(TaskId(7)).map(|t| t.name()), Some("sensor"));
        assert!(reg.get(TaskId(8)).is_none());

        reg.get_mut(TaskId(7)).unwrap().set_state(TaskState::Blocked);
        assert_eq!(reg.count_in(TaskState::Blocked), 1);
        assert_eq!(reg.count_in(TaskState::Ready), 0);
    }

    #[test]
    fn test_for_each_mut_visits_in_order() {
        let mut reg = TaskRegistry::new();
        reg.push(task(1, "a"));
        reg.push(task(2, "b"));

        let mut seen = Vec::new();
        reg.for_each_mut(|t| seen.push(t.id()));
        assert_eq!(seen, vec![TaskId(1), TaskId(2)]);
    }

    #[test]
    fn test_empty() {
        let reg = TaskRegistry::new();
        assert!(reg.is_empty());
        assert_eq!(reg.len(), 0);
    }
}
