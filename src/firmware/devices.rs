//! Device boundaries
//!
//! Everything the task bodies touch outside the scheduler: pins, ranging
//! sensors, the uplink and the hardware watchdog. Real boards implement these
//! traits; `sim` provides host stand-ins.

use serde::Serialize;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// A device shared between several task bodies
pub type DeviceRef<T> = Rc<RefCell<T>>;

/// Device result type
pub type DeviceResult<T> = Result<T, DeviceError>;

/// Device errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// Device did not answer in time
    Timeout,
    /// Transfer failed
    Io(String),
    /// Link or device is gone
    Disconnected,
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceError::Timeout => write!(f, "device timed out"),
            DeviceError::Io(msg) => write!(f, "I/O error: {}", msg),
            DeviceError::Disconnected => write!(f, "device disconnected"),
        }
    }
}

impl std::error::Error for DeviceError {}

/// Digital input
pub trait InputPin {
    fn is_high(&mut self) -> bool;
}

/// Digital output
pub trait OutputPin {
    fn set(&mut self, high: bool);
}

/// Distance sensor (ultrasonic ranging)
pub trait DistanceSensor {
    /// One measurement. `Ok(None)` means no echo.
    fn read_cm(&mut self) -> DeviceResult<Option<f32>>;
}

/// Hardware watchdog
pub trait Watchdog {
    fn feed(&mut self);
}

/// Telemetry sink
pub trait Uploader {
    fn send(&mut self, report: &Report) -> DeviceResult<()>;
}

/// Telemetry payload
///
/// Serializes as a single-key object, e.g. `{"ir_detections":3}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Report {
    /// Running IR detection count
    IrDetections(u32),
    /// Running detection count per ultrasonic sensor
    UltrasonicDetections(BTreeMap<String, u32>),
}

impl Report {
    pub fn to_json(&self) -> DeviceResult<String> {
        serde_json::to_string(self).map_err(|e| DeviceError::Io(e.to_string()))
    }
}
