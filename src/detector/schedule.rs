use std::{
    sync::Arc,
    thread::JoinHandle,
    time::{Duration, Instant},
};

use chrono::NaiveTime;
use log::{debug, warn};

use super::cell::IntensityCell;
use crate::{
    classifier::classify,
    report::{DeliveryOutcome, Reporter, TremorReport},
    sensor::MotionSensor,
};

pub type WallClock = fn() -> NaiveTime;

pub fn local_wall_clock() -> NaiveTime {
    chrono::Local::now().time()
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub samples_taken: u64,
    pub samples_dropped: u64,
    pub reports_dispatched: u64,
}

/// What one `poll` did.
#[derive(Debug, Default)]
pub struct LoopTick {
    pub sampled: bool,
    pub reported: bool,
    /// Handle of the in-flight delivery; dropping it detaches the request.
    pub delivery: Option<JoinHandle<DeliveryOutcome>>,
}

/// Single scheduling context for sampling and reporting.
///
/// Both tasks keep their own deadline. A late poll runs each due task once
/// and re-arms it at `now + interval`; missed ticks are never replayed, so at
/// most one report leaves per report interval.
pub struct DetectionLoop<S: MotionSensor> {
    sensor: S,
    cell: Arc<IntensityCell>,
    reporter: Reporter,
    sample_interval: Duration,
    report_interval: Duration,
    next_sample_at: Instant,
    next_report_at: Instant,
    wall_clock: WallClock,
    stats: LoopStats,
}

impl<S: MotionSensor> DetectionLoop<S> {
    pub fn new(
        sensor: S,
        cell: Arc<IntensityCell>,
        reporter: Reporter,
        sample_interval: Duration,
        report_interval: Duration,
        started_at: Instant,
    ) -> Self {
        Self {
            sensor,
            cell,
            reporter,
            sample_interval,
            report_interval,
            next_sample_at: started_at + sample_interval,
            next_report_at: started_at + report_interval,
            wall_clock: local_wall_clock,
            stats: LoopStats::default(),
        }
    }

    pub fn with_wall_clock(mut self, wall_clock: WallClock) -> Self {
        self.wall_clock = wall_clock;
        self
    }

    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    pub fn next_deadline(&self) -> Instant {
        self.next_sample_at.min(self.next_report_at)
    }

    pub fn poll(&mut self, now: Instant) -> LoopTick {
        let mut tick = LoopTick::default();

        if now >= self.next_sample_at {
            self.take_sample();
            self.next_sample_at = now + self.sample_interval;
            tick.sampled = true;
        }

        if now >= self.next_report_at {
            let state = self.cell.refresh_situation((self.wall_clock)());
            tick.delivery = self.reporter.dispatch(TremorReport::from_state(&state));
            self.next_report_at = now + self.report_interval;
            self.stats.reports_dispatched += 1;
            tick.reported = true;
        }

        tick
    }

    pub fn into_sensor(self) -> S {
        self.sensor
    }

    fn take_sample(&mut self) {
        match self.sensor.read() {
            Ok(sample) => {
                let level = classify(sample.magnitude());
                self.cell.publish_level(level);
                self.stats.samples_taken += 1;
            }
            Err(err) => {
                self.stats.samples_dropped += 1;
                if self.stats.samples_dropped == 1 || self.stats.samples_dropped % 100 == 0 {
                    warn!(
                        "detector: sample dropped err={err} dropped={}",
                        self.stats.samples_dropped
                    );
                } else {
                    debug!("detector: sample dropped err={err}");
                }
            }
        }
    }
}
