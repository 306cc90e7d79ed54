//! coop-rtos - A minimal cooperative task scheduler
//!
//! Design principles:
//! - Tractable: one run slot, one registry scan per tick, nothing hidden
//! - Tasks give up the CPU only where their bodies say so
//! - Blocking is expressed as wait conditions, never as sleeping
//! - The driver loop is yours: call `Scheduler::tick()` forever
//!
//! Layout:
//! - `kernel`: tasks, wait conditions, the scheduler itself
//! - `config`: JSON node configuration
//! - `console`: stderr backend for the `log` facade
//! - `firmware`: an obstacle-detection node built on the kernel, with a
//!   simulated board

pub mod config;
pub mod console;
pub mod firmware;
pub mod kernel;

pub use kernel::{
    BodyError, Priority, Scheduler, Step, TaskBody, TaskId, TaskState, TickOutcome, TickResult,
};
