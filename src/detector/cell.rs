use core::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Mutex, PoisonError};

use chrono::NaiveTime;

use crate::classifier::{IntensityLevel, IntensityState, LabelPolicy};

/// Latest intensity shared between the detection loop and its readers.
///
/// The loop is the only writer. The level is replaced on every sample; the
/// stamped situation only changes on report ticks.
pub struct IntensityCell {
    policy: LabelPolicy,
    level: AtomicU8,
    stamped: Mutex<String>,
}

impl IntensityCell {
    pub fn new(policy: LabelPolicy) -> Self {
        Self {
            policy,
            level: AtomicU8::new(IntensityLevel::None.as_u8()),
            stamped: Mutex::new(String::new()),
        }
    }

    pub fn policy(&self) -> LabelPolicy {
        self.policy
    }

    pub fn publish_level(&self, level: IntensityLevel) {
        self.level.store(level.as_u8(), Ordering::Relaxed);
    }

    pub fn level(&self) -> IntensityLevel {
        IntensityLevel::from_u8(self.level.load(Ordering::Relaxed)).unwrap_or_default()
    }

    /// Report-tick update: re-derives the situation for `now` and returns the
    /// snapshot to send.
    pub fn refresh_situation(&self, now: NaiveTime) -> IntensityState {
        let level = self.level();
        let situation = self.policy.situation(level, now);
        if matches!(self.policy, LabelPolicy::DetectionTime) {
            *self.lock_stamped() = situation.clone();
        }
        IntensityState::new(level, situation)
    }

    pub fn read(&self) -> IntensityState {
        let level = self.level();
        let situation = match self.policy {
            LabelPolicy::LevelName => level.label().to_string(),
            LabelPolicy::DetectionTime => self.lock_stamped().clone(),
        };
        IntensityState::new(level, situation)
    }

    pub fn reset(&self) {
        self.publish_level(IntensityLevel::None);
        self.lock_stamped().clear();
    }

    fn lock_stamped(&self) -> std::sync::MutexGuard<'_, String> {
        self.stamped.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
