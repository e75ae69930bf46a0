use std::{fs, path::Path, time::Duration};

use anyhow::{Context, Result};

use super::{MotionSample, MotionSensor, SensorError};

/// Replays a recorded acceleration trace, wrapping around at the end.
///
/// Trace lines are `x,y,z` or `t_ms,x,y,z`. Blank lines, `#` comments and a
/// leading header row are skipped; the timestamp column is ignored because the
/// detector owns the sampling cadence.
pub struct ReplaySensor {
    samples: Vec<MotionSample>,
    cursor: usize,
    started: bool,
}

impl ReplaySensor {
    pub fn new(samples: Vec<MotionSample>) -> Self {
        Self {
            samples,
            cursor: 0,
            started: false,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read trace {}", path.display()))?;
        let samples =
            parse_trace(&text).map_err(|err| anyhow::anyhow!("{}:{err}", path.display()))?;
        Ok(Self::new(samples))
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl MotionSensor for ReplaySensor {
    fn start(&mut self, _interval: Duration) -> Result<(), SensorError> {
        if self.samples.is_empty() {
            return Err(SensorError::Unavailable("trace has no samples".into()));
        }
        self.started = true;
        Ok(())
    }

    fn read(&mut self) -> Result<MotionSample, SensorError> {
        if !self.started {
            return Err(SensorError::NotStarted);
        }
        let sample = self.samples[self.cursor % self.samples.len()];
        self.cursor = (self.cursor + 1) % self.samples.len();
        Ok(sample)
    }

    fn stop(&mut self) {
        self.started = false;
    }
}

pub fn parse_trace(text: &str) -> Result<Vec<MotionSample>, String> {
    let mut out = Vec::new();
    let mut seen_data_row = false;

    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let parts: Vec<&str> = trimmed.split(',').map(str::trim).collect();
        let axes = match parts.len() {
            3 => &parts[..],
            4 => &parts[1..],
            n => {
                return Err(format!(
                    "{line_no} invalid trace line, expected 3 or 4 columns, got {n}"
                ))
            }
        };

        if !seen_data_row && parts[0].parse::<f64>().is_err() {
            // header row
            seen_data_row = true;
            continue;
        }
        seen_data_row = true;

        let x = parse_axis(axes[0], line_no, "x")?;
        let y = parse_axis(axes[1], line_no, "y")?;
        let z = parse_axis(axes[2], line_no, "z")?;
        out.push(MotionSample::new(x, y, z));
    }

    Ok(out)
}

fn parse_axis(raw: &str, line_no: usize, field: &str) -> Result<f64, String> {
    let value = raw
        .parse::<f64>()
        .map_err(|e| format!("{line_no} invalid {field} value '{raw}': {e}"))?;
    if !value.is_finite() {
        return Err(format!("{line_no} non-finite {field} value '{raw}'"));
    }
    Ok(value)
}
