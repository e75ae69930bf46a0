//! Tremor magnitude classification, the Idle/Detecting lifecycle around a
//! motion sensor, and periodic fire-and-forget reporting to an HTTP collector.

pub mod classifier;
pub mod collector;
pub mod config;
pub mod detector;
pub mod env_utils;
pub mod logging;
pub mod report;
pub mod sensor;

#[cfg(test)]
mod test_support;
