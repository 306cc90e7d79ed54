//! Task bodies of the obstacle node
//!
//! Each body does one round of work per resume and then waits on a timeout.
//! None of them ever block inside `resume`: the button debounce, which used
//! to be a busy sleep, is its own suspension.
//!
//! Device failures are logged and retried next period. No body ever
//! completes, so none of them leave the scheduler.

use super::devices::{DeviceRef, DistanceSensor, InputPin, OutputPin, Report, Uploader, Watchdog};
use super::kalman::KalmanFilter;
use crate::config::{Periods, SensorConfig};
use crate::kernel::async_body::Suspender;
use crate::kernel::clock::ClockRef;
use crate::kernel::condition::timeout;
use crate::kernel::shared::Shared;
use crate::kernel::task::{BodyError, Step, TaskBody};
use std::collections::BTreeMap;

/// Flags shared between the node's task bodies
#[derive(Debug, Clone, Default)]
pub struct NodeFlags {
    /// Sensors paused, buzzer silenced
    pub sleep_mode: Shared<bool>,
    /// An ultrasonic sensor saw something within range on its last round
    pub object_detected: Shared<bool>,
    /// The IR sensor saw something on its last read
    pub ir_object_detected: Shared<bool>,
}

impl NodeFlags {
    pub fn any_detection(&self) -> bool {
        self.object_detected.get() || self.ir_object_detected.get()
    }
}

fn upload(uploader: &DeviceRef<dyn Uploader>, report: &Report) {
    if let Err(e) = uploader.borrow_mut().send(report) {
        log::warn!("upload failed: {}", e);
    }
}

/// Sleep button: a debounced falling edge toggles sleep mode
pub struct ButtonTask {
    clock: ClockRef,
    pin: Box<dyn InputPin>,
    buzzer: DeviceRef<dyn OutputPin>,
    flags: NodeFlags,
    period_ms: u64,
    debounce_ms: u64,
    last_high: bool,
    debouncing: bool,
}

impl ButtonTask {
    pub fn new(
        clock: ClockRef,
        mut pin: Box<dyn InputPin>,
        buzzer: DeviceRef<dyn OutputPin>,
        flags: NodeFlags,
        periods: &Periods,
    ) -> Self {
        let last_high = pin.is_high();
        Self {
            clock,
            pin,
            buzzer,
            flags,
            period_ms: periods.button_ms,
            debounce_ms: periods.debounce_ms,
            last_high,
            debouncing: false,
        }
    }

    fn toggle_sleep(&mut self) {
        if self.flags.sleep_mode.toggle() {
            log::info!("entering sleep mode");
            self.buzzer.borrow_mut().set(false);
        } else {
            log::info!("waking up");
        }
    }
}

impl TaskBody for ButtonTask {
    fn resume(&mut self) -> Result<Step, BodyError> {
        if self.debouncing {
            self.debouncing = false;
            if !self.pin.is_high() {
                self.toggle_sleep();
            }
            return Ok(Step::wait(timeout(&self.clock, self.period_ms)));
        }

        let high = self.pin.is_high();
        let falling = self.last_high && !high;
        self.last_high = high;

        if falling {
            self.debouncing = true;
            return Ok(Step::wait(timeout(&self.clock, self.debounce_ms)));
        }
        Ok(Step::wait(timeout(&self.clock, self.period_ms)))
    }
}

struct RangeChannel {
    config: SensorConfig,
    sensor: Box<dyn DistanceSensor>,
    filter: KalmanFilter,
}

/// Ultrasonic sweep: filter every sensor, count detections, upload counts
pub struct UltrasonicTask {
    clock: ClockRef,
    channels: Vec<RangeChannel>,
    counts: BTreeMap<String, u32>,
    buzzer: DeviceRef<dyn OutputPin>,
    uploader: DeviceRef<dyn Uploader>,
    watchdog: DeviceRef<dyn Watchdog>,
    flags: NodeFlags,
    period_ms: u64,
}

impl UltrasonicTask {
    pub fn new(
        clock: ClockRef,
        sensors: Vec<(SensorConfig, Box<dyn DistanceSensor>)>,
        buzzer: DeviceRef<dyn OutputPin>,
        uploader: DeviceRef<dyn Uploader>,
        watchdog: DeviceRef<dyn Watchdog>,
        flags: NodeFlags,
        periods: &Periods,
    ) -> Self {
        let counts = sensors.iter().map(|(c, _)| (c.name.clone(), 0)).collect();
        let channels = sensors
            .into_iter()
            .map(|(config, sensor)| RangeChannel {
                config,
                sensor,
                filter: KalmanFilter::default(),
            })
            .collect();
        Self {
            clock,
            channels,
            counts,
            buzzer,
            uploader,
            watchdog,
            flags,
            period_ms: periods.ultrasonic_ms,
        }
    }

    /// Detection counts so far, keyed by sensor name
    pub fn counts(&self) -> &BTreeMap<String, u32> {
        &self.counts
    }

    fn sweep(&mut self) -> bool {
        let mut seen = false;
        for ch in self.channels.iter_mut() {
            let raw = match ch.sensor.read_cm() {
                Ok(raw) => raw,
                Err(e) => {
                    log::warn!("{}: read failed: {}", ch.config.name, e);
                    None
                }
            };
            let filtered = ch.filter.update(raw);
            if raw.is_some() && filtered <= ch.config.range_cm {
                seen = true;
                if let Some(count) = self.counts.get_mut(&ch.config.name) {
                    *count += 1;
                }
                log::debug!("{}: obstacle at {:.2} cm", ch.config.name, filtered);
            }
        }
        seen
    }
}

impl TaskBody for UltrasonicTask {
    fn resume(&mut self) -> Result<Step, BodyError> {
        if self.flags.sleep_mode.get() {
            self.buzzer.borrow_mut().set(false);
            return Ok(Step::wait(timeout(&self.clock, self.period_ms)));
        }

        let seen = self.sweep();
        self.flags.object_detected.set(seen);
        upload(&self.uploader, &Report::UltrasonicDetections(self.counts.clone()));
        self.watchdog.borrow_mut().feed();
        Ok(Step::wait(timeout(&self.clock, self.period_ms)))
    }
}

/// IR proximity: active-low sensor, running count uploaded every read
pub struct IrTask {
    clock: ClockRef,
    pin: Box<dyn InputPin>,
    buzzer: DeviceRef<dyn OutputPin>,
    uploader: DeviceRef<dyn Uploader>,
    watchdog: DeviceRef<dyn Watchdog>,
    flags: NodeFlags,
    period_ms: u64,
    detections: u32,
}

impl IrTask {
    pub fn new(
        clock: ClockRef,
        pin: Box<dyn InputPin>,
        buzzer: DeviceRef<dyn OutputPin>,
        uploader: DeviceRef<dyn Uploader>,
        watchdog: DeviceRef<dyn Watchdog>,
        flags: NodeFlags,
        periods: &Periods,
    ) -> Self {
        Self {
            clock,
            pin,
            buzzer,
            uploader,
            watchdog,
            flags,
            period_ms: periods.ir_ms,
            detections: 0,
        }
    }
}

impl TaskBody for IrTask {
    fn resume(&mut self) -> Result<Step, BodyError> {
        if self.flags.sleep_mode.get() {
            self.buzzer.borrow_mut().set(false);
            return Ok(Step::wait(timeout(&self.clock, self.period_ms)));
        }

        let detected = !self.pin.is_high();
        self.flags.ir_object_detected.set(detected);
        if detected {
            self.detections += 1;
            log::info!("IR sensor detected an obstacle ({} total)", self.detections);
        }

        upload(&self.uploader, &Report::IrDetections(self.detections));
        self.watchdog.borrow_mut().feed();
        Ok(Step::wait(timeout(&self.clock, self.period_ms)))
    }
}

/// Buzzer: on while anything is detected and the node is awake
///
/// Checks more often while asleep so it stays silent.
pub struct BuzzerTask {
    clock: ClockRef,
    buzzer: DeviceRef<dyn OutputPin>,
    flags: NodeFlags,
    period_ms: u64,
    sleep_period_ms: u64,
}

impl BuzzerTask {
    pub fn new(clock: ClockRef, buzzer: DeviceRef<dyn OutputPin>, flags: NodeFlags, periods: &Periods) -> Self {
        Self {
            clock,
            buzzer,
            flags,
            period_ms: periods.buzzer_ms,
            sleep_period_ms: periods.buzzer_sleep_ms,
        }
    }
}

impl TaskBody for BuzzerTask {
    fn resume(&mut self) -> Result<Step, BodyError> {
        if self.flags.sleep_mode.get() {
            self.buzzer.borrow_mut().set(false);
            return Ok(Step::wait(timeout(&self.clock, self.sleep_period_ms)));
        }

        self.buzzer.borrow_mut().set(self.flags.any_detection());
        Ok(Step::wait(timeout(&self.clock, self.period_ms)))
    }
}

/// Watchdog feeder, written as an async body
///
/// Feeds every period; in sleep mode it stretches the wait first.
pub async fn watchdog_loop(
    sus: Suspender,
    clock: ClockRef,
    watchdog: DeviceRef<dyn Watchdog>,
    flags: NodeFlags,
    periods: Periods,
) -> Result<(), BodyError> {
    loop {
        watchdog.borrow_mut().feed();
        if flags.sleep_mode.get() {
            sus.wait(timeout(&clock, periods.watchdog_sleep_ms)).await;
        }
        sus.wait(timeout(&clock, periods.watchdog_ms)).await;
    }
}
