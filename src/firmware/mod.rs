//! Obstacle-detection node
//!
//! Five tasks on one scheduler: sleep button, ultrasonic sweep, IR proximity,
//! buzzer and watchdog. Hardware sits behind the traits in `devices`; `sim`
//! provides a host board so the node runs anywhere.

pub mod devices;
pub mod kalman;
pub mod sim;
pub mod tasks;

pub use devices::{DeviceError, DeviceRef, DeviceResult, DistanceSensor, InputPin, OutputPin, Report, Uploader, Watchdog};
pub use kalman::KalmanFilter;
pub use tasks::NodeFlags;

use crate::config::{ConfigError, ConfigResult, NodeConfig};
use crate::kernel::clock::ClockRef;
use crate::kernel::scheduler::{Scheduler, TickOutcome};
use crate::kernel::shared::Shared;
use crate::kernel::task::Priority;
use sim::{LogUploader, ScriptedInput, SharedOutput, SimDistanceSensor, SimWatchdog};
use std::cell::RefCell;
use std::rc::Rc;
use tasks::{watchdog_loop, BuzzerTask, ButtonTask, IrTask, UltrasonicTask};

/// Everything the node talks to
pub struct Devices {
    /// Sleep button, active low
    pub button: Box<dyn InputPin>,
    /// IR proximity sensor, active low
    pub ir: Box<dyn InputPin>,
    pub buzzer: DeviceRef<dyn OutputPin>,
    /// One per configured sensor, same order
    pub sensors: Vec<Box<dyn DistanceSensor>>,
    pub uploader: DeviceRef<dyn Uploader>,
    pub watchdog: DeviceRef<dyn Watchdog>,
}

/// Observation points into a simulated board
#[derive(Debug, Clone)]
pub struct SimHandles {
    pub buzzer: Shared<bool>,
    pub watchdog_feeds: Shared<u64>,
    pub uploads: Rc<RefCell<Vec<String>>>,
}

impl Devices {
    /// Host board driven by `config.sim` and the given clock
    pub fn simulated(config: &NodeConfig, clock: &ClockRef) -> (Self, SimHandles) {
        let buzzer = Shared::new(false);
        let feeds = Shared::new(0u64);
        let uploader = LogUploader::new();
        let handles = SimHandles {
            buzzer: buzzer.clone(),
            watchdog_feeds: feeds.clone(),
            uploads: uploader.history(),
        };

        let sensors = config
            .sensors
            .iter()
            .map(|s| {
                Box::new(SimDistanceSensor::new(
                    clock.clone(),
                    s.sim_base_cm,
                    s.sim_swing_cm,
                    config.sim.swing_period_ms,
                    config.sim.dropout_every,
                )) as Box<dyn DistanceSensor>
            })
            .collect();

        let devices = Devices {
            button: Box::new(ScriptedInput::new(clock.clone(), config.sim.button_presses.clone())),
            ir: Box::new(ScriptedInput::new(clock.clone(), config.sim.ir_hits.clone())),
            buzzer: Rc::new(RefCell::new(SharedOutput::new(buzzer))),
            sensors,
            uploader: Rc::new(RefCell::new(uploader)),
            watchdog: Rc::new(RefCell::new(SimWatchdog::new(feeds))),
        };
        (devices, handles)
    }
}

fn priority(p: Option<u32>) -> Priority {
    p.map(Priority).unwrap_or_default()
}

/// A configured node: the scheduler plus the flags its tasks share
pub struct Node {
    scheduler: Scheduler,
    flags: NodeFlags,
}

impl Node {
    /// Spawn the five node tasks
    ///
    /// Fails if the config is invalid or the number of sensors does not
    /// match the configured sensor list.
    pub fn new(config: &NodeConfig, clock: ClockRef, devices: Devices) -> ConfigResult<Self> {
        config.validate()?;
        if devices.sensors.len() != config.sensors.len() {
            return Err(ConfigError::Invalid(format!(
                "{} sensors configured but {} attached",
                config.sensors.len(),
                devices.sensors.len()
            )));
        }

        let Devices {
            button,
            ir,
            buzzer,
            sensors,
            uploader,
            watchdog,
        } = devices;
        let flags = NodeFlags::default();
        let periods = &config.periods;
        let prio = &config.priorities;
        let mut scheduler = Scheduler::new();

        scheduler.spawn_with_priority(
            "button",
            priority(prio.button),
            ButtonTask::new(clock.clone(), button, buzzer.clone(), flags.clone(), periods),
        );
        scheduler.spawn_with_priority(
            "ultrasonic",
            priority(prio.ultrasonic),
            UltrasonicTask::new(
                clock.clone(),
                config.sensors.iter().cloned().zip(sensors).collect(),
                buzzer.clone(),
                uploader.clone(),
                watchdog.clone(),
                flags.clone(),
                periods,
            ),
        );
        scheduler.spawn_with_priority(
            "ir",
            priority(prio.ir),
            IrTask::new(
                clock.clone(),
                ir,
                buzzer.clone(),
                uploader,
                watchdog.clone(),
                flags.clone(),
                periods,
            ),
        );
        scheduler.spawn_with_priority(
            "buzzer",
            priority(prio.buzzer),
            BuzzerTask::new(clock.clone(), buzzer, flags.clone(), periods),
        );

        let wd_flags = flags.clone();
        let wd_periods = periods.clone();
        scheduler.spawn_async("watchdog", priority(prio.watchdog), move |sus| {
            watchdog_loop(sus, clock, watchdog, wd_flags, wd_periods)
        });

        Ok(Self { scheduler, flags })
    }

    /// Simulated node built from `config` alone
    pub fn simulated(config: &NodeConfig, clock: ClockRef) -> ConfigResult<(Self, SimHandles)> {
        let (devices, handles) = Devices::simulated(config, &clock);
        Ok((Self::new(config, clock, devices)?, handles))
    }

    pub fn tick(&mut self) -> TickOutcome {
        self.scheduler.tick()
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn flags(&self) -> &NodeFlags {
        &self.flags
    }

    pub fn sleeping(&self) -> bool {
        self.flags.sleep_mode.get()
    }
}
