use chrono::NaiveTime;
use serde::Deserialize;

use super::IntensityLevel;

pub const DETECTION_TIME_PREFIX: &str = "Tremor detected at";

/// How the situation text is produced on each report tick.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LabelPolicy {
    /// Situation names the current intensity level.
    #[default]
    LevelName,
    /// Situation is a wall-clock stamp written on every tick, whatever the level.
    DetectionTime,
}

impl LabelPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LevelName => "level-name",
            Self::DetectionTime => "detection-time",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, String> {
        match raw.trim() {
            "level-name" => Ok(Self::LevelName),
            "detection-time" => Ok(Self::DetectionTime),
            other => Err(format!(
                "invalid label policy '{other}', expected level-name|detection-time"
            )),
        }
    }

    pub fn situation(self, level: IntensityLevel, now: NaiveTime) -> String {
        match self {
            Self::LevelName => level.label().to_string(),
            Self::DetectionTime => format!("{DETECTION_TIME_PREFIX} {}", now.format("%H:%M")),
        }
    }
}
