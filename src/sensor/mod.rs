//! Motion sample sources.
//!
//! Platform sensor access stays outside this crate. The detector only sees a
//! [`MotionSensor`], which hands out gravity-free user acceleration on demand
//! once it has been started with a sampling interval.

use core::fmt;
use std::time::Duration;

mod replay;
mod synthetic;

pub use replay::{parse_trace, ReplaySensor};
pub use synthetic::SyntheticSensor;

/// User acceleration in g with gravity already removed.
#[derive(Clone, Copy, PartialEq, Debug, Default)]
pub struct MotionSample {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl MotionSample {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SensorError {
    /// The source cannot deliver samples at all; detection must not start.
    Unavailable(String),
    /// One reading failed; the sample is dropped.
    Read(String),
    /// Read before `start` or after `stop`.
    NotStarted,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable(reason) => write!(f, "motion sensor unavailable: {reason}"),
            Self::Read(reason) => write!(f, "motion sample read failed: {reason}"),
            Self::NotStarted => f.write_str("motion sensor not started"),
        }
    }
}

impl std::error::Error for SensorError {}

pub trait MotionSensor: Send {
    /// Opens the subscription. An error here means the sensor is unavailable.
    fn start(&mut self, interval: Duration) -> Result<(), SensorError>;

    fn read(&mut self) -> Result<MotionSample, SensorError>;

    /// Closes the subscription. Calling it on a stopped sensor is harmless.
    fn stop(&mut self);
}

impl<S: MotionSensor + ?Sized> MotionSensor for Box<S> {
    fn start(&mut self, interval: Duration) -> Result<(), SensorError> {
        (**self).start(interval)
    }

    fn read(&mut self) -> Result<MotionSample, SensorError> {
        (**self).read()
    }

    fn stop(&mut self) {
        (**self).stop()
    }
}
