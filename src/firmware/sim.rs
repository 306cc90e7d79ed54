//! Simulated board
//!
//! Host stand-ins for the device traits, driven by the same clock as the
//! scheduler so runs are reproducible under a `ManualClock`.

use super::devices::{DeviceResult, DistanceSensor, InputPin, OutputPin, Report, Uploader, Watchdog};
use crate::config::Window;
use crate::kernel::clock::ClockRef;
use crate::kernel::shared::Shared;
use std::cell::RefCell;
use std::rc::Rc;

/// Input whose level is set by the test or driver
#[derive(Debug, Clone)]
pub struct SharedInput {
    level: Shared<bool>,
}

impl SharedInput {
    pub fn new(level: Shared<bool>) -> Self {
        Self { level }
    }
}

impl InputPin for SharedInput {
    fn is_high(&mut self) -> bool {
        self.level.get()
    }
}

/// Active-low input pulled low during scripted windows
pub struct ScriptedInput {
    clock: ClockRef,
    low: Vec<Window>,
}

impl ScriptedInput {
    pub fn new(clock: ClockRef, low: Vec<Window>) -> Self {
        Self { clock, low }
    }
}

impl InputPin for ScriptedInput {
    fn is_high(&mut self) -> bool {
        let now = self.clock.now_ms();
        !self.low.iter().any(|w| w.contains(now))
    }
}

/// Output that mirrors its level into a shared cell
#[derive(Debug, Clone)]
pub struct SharedOutput {
    level: Shared<bool>,
}

impl SharedOutput {
    pub fn new(level: Shared<bool>) -> Self {
        Self { level }
    }
}

impl OutputPin for SharedOutput {
    fn set(&mut self, high: bool) {
        if self.level.get() != high {
            log::debug!("buzzer {}", if high { "on" } else { "off" });
        }
        self.level.set(high);
    }
}

/// Ultrasonic sensor tracing a sine swing around a base distance
pub struct SimDistanceSensor {
    clock: ClockRef,
    base_cm: f32,
    swing_cm: f32,
    period_ms: u64,
    dropout_every: u32,
    reads: u32,
}

impl SimDistanceSensor {
    pub fn new(clock: ClockRef, base_cm: f32, swing_cm: f32, period_ms: u64, dropout_every: u32) -> Self {
        Self {
            clock,
            base_cm,
            swing_cm,
            period_ms: period_ms.max(1),
            dropout_every,
            reads: 0,
        }
    }
}

impl DistanceSensor for SimDistanceSensor {
    fn read_cm(&mut self) -> DeviceResult<Option<f32>> {
        self.reads = self.reads.wrapping_add(1);
        if self.dropout_every > 0 && self.reads % self.dropout_every == 0 {
            return Ok(None);
        }
        let phase = (self.clock.now_ms() % self.period_ms) as f32 / self.period_ms as f32;
        let d = self.base_cm + self.swing_cm * (phase * std::f32::consts::TAU).sin();
        Ok(Some(d.max(2.0)))
    }
}

/// Sensor returning a fixed script of readings, then repeating the last
pub struct ScriptedSensor {
    readings: Vec<DeviceResult<Option<f32>>>,
    next: usize,
}

impl ScriptedSensor {
    pub fn new(readings: Vec<DeviceResult<Option<f32>>>) -> Self {
        Self { readings, next: 0 }
    }
}

impl DistanceSensor for ScriptedSensor {
    fn read_cm(&mut self) -> DeviceResult<Option<f32>> {
        let Some(last) = self.readings.len().checked_sub(1) else {
            return Ok(None);
        };
        let i = self.next.min(last);
        self.next += 1;
        self.readings[i].clone()
    }
}

/// Watchdog that counts feeds
#[derive(Debug, Clone, Default)]
pub struct SimWatchdog {
    feeds: Shared<u64>,
}

impl SimWatchdog {
    pub fn new(feeds: Shared<u64>) -> Self {
        Self { feeds }
    }
}

impl Watchdog for SimWatchdog {
    fn feed(&mut self) {
        self.feeds.update(|n| n + 1);
    }
}

/// Uploader that logs each payload and keeps a copy
#[derive(Debug, Clone, Default)]
pub struct LogUploader {
    sent: Rc<RefCell<Vec<String>>>,
}

impl LogUploader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared view of every payload sent so far
    pub fn history(&self) -> Rc<RefCell<Vec<String>>> {
        self.sent.clone()
    }
}

impl Uploader for LogUploader {
    fn send(&mut self, report: &Report) -> DeviceResult<()> {
        let json = report.to_json()?;
        log::info!("upload {}", json);
        self.sent.borrow_mut().push(json);
        Ok(())
    }
}
