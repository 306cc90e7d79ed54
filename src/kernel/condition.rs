//! Wait conditions
//!
//! A task suspends by handing the scheduler a set of conditions. While the
//! task is blocked the scheduler polls every condition once per tick; the
//! first tick on which any of them reports `true` makes the task ready again.
//!
//! Conditions are stateful and belong to the task that built them. The
//! scheduler never interprets them beyond calling `poll`.

use super::clock::ClockRef;

/// A pollable wake-up trigger
pub trait WaitCondition {
    /// Advance by one step and report whether the trigger has fired
    fn poll(&mut self) -> bool;

    /// Short label for logs
    fn kind(&self) -> &'static str {
        "condition"
    }
}

/// Boxed condition as carried by a suspended task
pub type BoxCondition = Box<dyn WaitCondition>;

/// Fires once `duration_ms` has elapsed since construction
///
/// Stays fired: every poll after the deadline returns `true`.
pub struct Timeout {
    clock: ClockRef,
    start: u64,
    duration_ms: u64,
}

impl Timeout {
    pub fn new(clock: ClockRef, duration_ms: u64) -> Self {
        let start = clock.now_ms();
        Self {
            clock,
            start,
            duration_ms,
        }
    }

    /// Milliseconds left before the deadline (0 once expired)
    pub fn remaining_ms(&self) -> u64 {
        let elapsed = self.clock.now_ms().saturating_sub(self.start);
        self.duration_ms.saturating_sub(elapsed)
    }
}

impl WaitCondition for Timeout {
    fn poll(&mut self) -> bool {
        self.clock.now_ms().saturating_sub(self.start) >= self.duration_ms
    }

    fn kind(&self) -> &'static str {
        "timeout"
    }
}

/// Fires after being polled `polls` times without firing
///
/// `Delay::new(0)` fires on the first poll, `Delay::new(2)` on the third.
#[derive(Debug, Clone)]
pub struct Delay {
    remaining: u32,
}

impl Delay {
    pub fn new(polls: u32) -> Self {
        Self { remaining: polls }
    }
}

impl WaitCondition for Delay {
    fn poll(&mut self) -> bool {
        if self.remaining == 0 {
            return true;
        }
        self.remaining -= 1;
        false
    }

    fn kind(&self) -> &'static str {
        "delay"
    }
}

/// Fires whenever the closure returns `true`
pub struct Predicate {
    check: Box<dyn FnMut() -> bool>,
}

impl Predicate {
    pub fn new<F>(check: F) -> Self
    where
        F: FnMut() -> bool + 'static,
    {
        Self {
            check: Box::new(check),
        }
    }
}

impl WaitCondition for Predicate {
    fn poll(&mut self) -> bool {
        (self.check)()
    }

    fn kind(&self) -> &'static str {
        "predicate"
    }
}

/// Always fires
#[derive(Debug, Clone, Copy, Default)]
pub struct Immediate;

impl WaitCondition for Immediate {
    fn poll(&mut self) -> bool {
        true
    }

    fn kind(&self) -> &'static str {
        "immediate"
    }
}

/// Never fires. A task waiting only on this stays blocked forever.
#[derive(Debug, Clone, Copy, Default)]
pub struct Never;

impl WaitCondition for Never {
    fn poll(&mut self) -> bool {
        false
    }

    fn kind(&self) -> &'static str {
        "never"
    }
}

/// Boxed timeout starting now
pub fn timeout(clock: &ClockRef, duration_ms: u64) -> BoxCondition {
    Box::new(Timeout::new(clock.clone(), duration_ms))
}

/// Boxed poll-count delay
pub fn delay(polls: u32) -> BoxCondition {
    Box::new(Delay::new(polls))
}

/// Boxed predicate
pub fn when<F>(check: F) -> BoxCondition
where
    F: FnMut() -> bool + 'static,
{
    Box::new(Predicate::new(check))
}
