//! Detection lifecycle: Idle/Detecting phases, the shared intensity state and
//! the loop that samples the sensor and emits periodic reports.

mod cell;
mod commands;
mod engine;
mod machine;
mod runtime;
mod schedule;
#[cfg(test)]
mod tests;

pub use cell::IntensityCell;
pub use commands::{DetectorApplyStatus, DetectorCommand, DetectorControl, Phase};
pub use engine::{DetectorApplyResult, DetectorEngine};
pub use runtime::{Detector, DetectorStatus, StartError};
pub use schedule::{local_wall_clock, DetectionLoop, LoopStats, LoopTick, WallClock};
