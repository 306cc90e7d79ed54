//! Scheduler statistics
//!
//! Counters updated by every tick. Cheap enough to leave on, and the only
//! way to spot a task that is monopolizing the run slot or never waking.

use super::task::TaskId;
use serde::Serialize;

/// Global scheduler counters
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchedulerStats {
    /// Total ticks
    pub ticks: u64,
    /// Ticks where no task was eligible
    pub idle_ticks: u64,
    /// Task bodies resumed
    pub resumes: u64,
    /// Tasks added
    pub spawned: u64,
    /// Tasks removed after completing or failing
    pub terminated: u64,
    /// Blocked tasks whose condition fired
    pub wakeups: u64,
    /// Running tasks demoted by a more important task
    pub displacements: u64,
    /// Longest run of consecutive ticks given to one task
    pub longest_streak: u64,
    #[serde(skip)]
    streak_task: Option<TaskId>,
    #[serde(skip)]
    streak: u64,
}

impl SchedulerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_spawn(&mut self) {
        self.spawned += 1;
    }

    pub(crate) fn record_idle(&mut self) {
        self.ticks += 1;
        self.idle_ticks += 1;
        self.streak_task = None;
        self.streak = 0;
    }

    pub(crate) fn record_resume(&mut self, id: TaskId) {
        self.ticks += 1;
        self.resumes += 1;
        if self.streak_task == Some(id) {
            self.streak += 1;
        } else {
            self.streak_task = Some(id);
            self.streak = 1;
        }
        self.longest_streak = self.longest_streak.max(self.streak);
    }

    pub(crate) fn record_wakeup(&mut self) {
        self.wakeups += 1;
    }

    pub(crate) fn record_displacement(&mut self) {
        self.displacements += 1;
    }

    pub(crate) fn record_termination(&mut self) {
        self.terminated += 1;
    }

    /// Consecutive ticks the most recent task has held the run slot
    pub fn current_streak(&self) -> u64 {
        self.streak
    }

    /// Fraction of ticks that resumed a task
    pub fn utilization(&self) -> f64 {
        if self.ticks == 0 {
            0.0
        } else {
            self.resumes as f64 / self.ticks as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_streak_tracking() {
        let mut stats = SchedulerStats::new();
        stats.record_resume(TaskId(1));
        stats.record_resume(TaskId(1));
        stats.record_resume(TaskId(1));
        assert_eq!(stats.current_streak(), 3);

        stats.record_resume(TaskId(2));
        assert_eq!(stats.current_streak(), 1);
        assert_eq!(stats.longest_streak, 3);

        stats.record_idle();
        assert_eq!(stats.current_streak(), 0);
    }

    #[test]
    fn test_utilization() {
        let mut stats = SchedulerStats::new();
        assert_eq!(stats.utilization(), 0.0);

        stats.record_resume(TaskId(1));
        stats.record_idle();
        stats.record_idle();
        stats.record_resume(TaskId(1));
        assert_eq!(stats.ticks, 4);
        assert_eq!(stats.idle_ticks, 2);
        assert!((stats.utilization() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_serializes_public_counters() {
        let mut stats = SchedulerStats::new();
        stats.record_spawn();
        let json = serde_json::to_string(&stats).unwrap();
        assert!(json.contains("\"spawned\":1"));
        assert!(!json.contains("streak_task"));
    }
}
