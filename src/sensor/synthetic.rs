use core::f64::consts::TAU;
use std::time::Duration;

use super::{MotionSample, MotionSensor, SensorError};

/// Sinusoidal tremor on the x axis, advanced one step per read.
///
/// Parkinsonian rest tremor sits around 4-6 Hz; the amplitude is the peak
/// user acceleration in g.
pub struct SyntheticSensor {
    amplitude_g: f64,
    frequency_hz: f64,
    step: Duration,
    reads: u64,
    started: bool,
}

impl SyntheticSensor {
    pub fn new(amplitude_g: f64, frequency_hz: f64) -> Self {
        Self {
            amplitude_g,
            frequency_hz,
            step: Duration::ZERO,
            reads: 0,
            started: false,
        }
    }
}

impl MotionSensor for SyntheticSensor {
    fn start(&mut self, interval: Duration) -> Result<(), SensorError> {
        if !self.amplitude_g.is_finite() || self.amplitude_g < 0.0 {
            return Err(SensorError::Unavailable(format!(
                "invalid synthetic amplitude {}",
                self.amplitude_g
            )));
        }
        if !self.frequency_hz.is_finite() || self.frequency_hz < 0.0 {
            return Err(SensorError::Unavailable(format!(
                "invalid synthetic frequency {}",
                self.frequency_hz
            )));
        }
        self.step = interval;
        self.reads = 0;
        self.started = true;
        Ok(())
    }

    fn read(&mut self) -> Result<MotionSample, SensorError> {
        if !self.started {
            return Err(SensorError::NotStarted);
        }
        self.reads += 1;
        let t = self.step.as_secs_f64() * self.reads as f64;
        let x = self.amplitude_g * (TAU * self.frequency_hz * t).sin();
        Ok(MotionSample::new(x, 0.0, 0.0))
    }

    fn stop(&mut self) {
        self.started = false;
    }
}
