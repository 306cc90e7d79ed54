//! The kernel - tasks, wait conditions and the cooperative scheduler
//!
//! - Single thread, one run slot, no preemption
//! - Tasks suspend only where their bodies say so
//! - Small, auditable core

pub mod async_body;
pub mod clock;
pub mod condition;
pub mod registry;
pub mod scheduler;
pub mod shared;
pub mod stats;
pub mod task;


pub use async_body::{AsyncBody, Suspender};
pub use clock::{Clock, ClockRef, ManualClock, SystemClock};
pub use condition::{BoxCondition, Delay, Immediate, Never, Predicate, Timeout, WaitCondition};
pub use registry::TaskRegistry;
pub use scheduler::{Scheduler, TaskSnapshot, TickOutcome, TickResult};
pub use shared::Shared;
pub use stats::SchedulerStats;
pub use task::{BodyError, FnBody, Priority, Resumed, Step, Task, TaskBody, TaskId, TaskState};
