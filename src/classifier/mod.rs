//! Tremor intensity classification.
//!
//! A magnitude sample maps onto one of five discrete levels through fixed
//! thresholds evaluated highest-first. Each comparison is strict, so a sample
//! sitting exactly on a threshold resolves to the lower band.

mod label;

pub use label::{LabelPolicy, DETECTION_TIME_PREFIX};

pub const EXTRA_HIGH_THRESHOLD: f64 = 1.2;
pub const HIGH_THRESHOLD: f64 = 0.8;
pub const MEDIUM_THRESHOLD: f64 = 0.5;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Default, Hash)]
#[repr(u8)]
pub enum IntensityLevel {
    #[default]
    None = 0,
    Low = 1,
    Medium = 2,
    High = 3,
    ExtraHigh = 4,
}

impl IntensityLevel {
    pub const ALL: [Self; 5] = [
        Self::None,
        Self::Low,
        Self::Medium,
        Self::High,
        Self::ExtraHigh,
    ];

    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::None),
            1 => Some(Self::Low),
            2 => Some(Self::Medium),
            3 => Some(Self::High),
            4 => Some(Self::ExtraHigh),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::None => "No tremor",
            Self::Low => "Low intensity tremor",
            Self::Medium => "Medium intensity tremor",
            Self::High => "High intensity tremor",
            Self::ExtraHigh => "Extra high intensity tremor",
        }
    }
}

/// Classifies one acceleration magnitude.
///
/// Negative and NaN inputs cannot come from a vector norm; they fall through
/// every comparison and land on [`IntensityLevel::None`].
pub fn classify(magnitude: f64) -> IntensityLevel {
    if magnitude > EXTRA_HIGH_THRESHOLD {
        IntensityLevel::ExtraHigh
    } else if magnitude > HIGH_THRESHOLD {
        IntensityLevel::High
    } else if magnitude > MEDIUM_THRESHOLD {
        IntensityLevel::Medium
    } else if magnitude > 0.0 {
        IntensityLevel::Low
    } else {
        IntensityLevel::None
    }
}

/// Latest classification together with the situation text shown to the user
/// and sent to the collector.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct IntensityState {
    pub level: IntensityLevel,
    pub situation: String,
}

impl IntensityState {
    pub fn new(level: IntensityLevel, situation: impl Into<String>) -> Self {
        Self {
            level,
            situation: situation.into(),
        }
    }

    pub fn intensity(&self) -> u8 {
        self.level.as_u8()
    }
}
