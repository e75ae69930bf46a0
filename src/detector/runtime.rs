use core::fmt;
use core::sync::atomic::{AtomicBool, Ordering};
use std::{
    io,
    sync::{mpsc, Arc},
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use anyhow::Result;
use log::{error, info};

use super::{
    cell::IntensityCell,
    commands::{DetectorApplyStatus, DetectorCommand, DetectorControl, Phase},
    engine::DetectorEngine,
    schedule::{local_wall_clock, DetectionLoop, WallClock},
};
use crate::{
    classifier::IntensityState,
    config::DetectorConfig,
    report::{HttpTransport, ReportTransport, Reporter},
    sensor::{MotionSensor, SensorError},
};

#[derive(Debug)]
pub enum StartError {
    SensorUnavailable(SensorError),
    /// A previous loop failed and did not hand the sensor back.
    SensorLost,
    Spawn(String),
}

impl fmt::Display for StartError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SensorUnavailable(err) => write!(f, "cannot start detection: {err}"),
            Self::SensorLost => f.write_str("cannot start detection: sensor was lost"),
            Self::Spawn(err) => write!(f, "cannot start detection loop: {err}"),
        }
    }
}

impl std::error::Error for StartError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::SensorUnavailable(err) => Some(err),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DetectorStatus {
    pub phase: Phase,
    pub state: IntensityState,
}

/// Loop thread body. Yields `None` if the loop never received its state.
pub(super) type LoopBody<S> = Box<dyn FnOnce() -> Option<S> + Send>;

pub(super) type LoopSpawner<S> = fn(LoopBody<S>) -> io::Result<JoinHandle<Option<S>>>;

fn spawn_named<S: Send + 'static>(body: LoopBody<S>) -> io::Result<JoinHandle<Option<S>>> {
    thread::Builder::new().name("tremor-detect".into()).spawn(body)
}

struct RunningLoop<S> {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<Option<S>>,
}

/// Owns the sensor, the shared intensity state and the detection loop.
///
/// The sensor moves into the loop thread on start and comes back on stop,
/// where its subscription is closed. Dropping the detector stops it.
pub struct Detector<S: MotionSensor + 'static> {
    sample_interval: Duration,
    report_interval: Duration,
    reporter: Reporter,
    cell: Arc<IntensityCell>,
    engine: DetectorEngine,
    sensor: Option<S>,
    running: Option<RunningLoop<S>>,
    wall_clock: WallClock,
    spawn_loop: LoopSpawner<S>,
}

impl<S: MotionSensor + 'static> Detector<S> {
    pub fn new(config: &DetectorConfig, sensor: S, transport: Arc<dyn ReportTransport>) -> Self {
        Self {
            sample_interval: config.sample_interval,
            report_interval: config.report_interval,
            reporter: Reporter::new(&config.endpoint, transport),
            cell: Arc::new(IntensityCell::new(config.label_policy)),
            engine: DetectorEngine::new(),
            sensor: Some(sensor),
            running: None,
            wall_clock: local_wall_clock,
            spawn_loop: spawn_named::<S>,
        }
    }

    /// Detector posting to the configured endpoint over HTTP.
    pub fn connect(config: &DetectorConfig, sensor: S) -> Result<Self> {
        let transport = HttpTransport::new(config.request_timeout, config.connect_timeout)?;
        Ok(Self::new(config, sensor, Arc::new(transport)))
    }

    pub fn with_wall_clock(mut self, wall_clock: WallClock) -> Self {
        self.wall_clock = wall_clock;
        self
    }

    #[cfg(test)]
    pub(super) fn set_loop_spawner(&mut self, spawn_loop: LoopSpawner<S>) {
        self.spawn_loop = spawn_loop;
    }

    pub fn phase(&self) -> Phase {
        self.engine.phase()
    }

    pub fn status(&self) -> DetectorStatus {
        DetectorStatus {
            phase: self.phase(),
            state: self.cell.read(),
        }
    }

    pub fn intensity_cell(&self) -> Arc<IntensityCell> {
        Arc::clone(&self.cell)
    }

    pub fn start(&mut self) -> Result<DetectorApplyStatus, StartError> {
        if self.phase() == Phase::Detecting {
            return Ok(self.engine.apply(DetectorCommand::Start).status);
        }

        let mut sensor = self.sensor.take().ok_or(StartError::SensorLost)?;
        if let Err(err) = sensor.start(self.sample_interval) {
            error!("detector: start refused err={err}");
            self.sensor = Some(sensor);
            return Err(StartError::SensorUnavailable(err));
        }

        let result = self.engine.apply(DetectorCommand::Start);
        debug_assert_eq!(result.control(), Some(DetectorControl::Subscribe));
        self.cell.reset();

        let stop = Arc::new(AtomicBool::new(false));
        let detection = DetectionLoop::new(
            sensor,
            Arc::clone(&self.cell),
            self.reporter.clone(),
            self.sample_interval,
            self.report_interval,
            Instant::now(),
        )
        .with_wall_clock(self.wall_clock);

        // The loop state is handed over after the spawn so that a refused
        // spawn leaves the sensor with us.
        let (handoff, received) = mpsc::sync_channel::<DetectionLoop<S>>(1);
        let loop_stop = Arc::clone(&stop);
        let body: LoopBody<S> = Box::new(move || {
            received
                .recv()
                .ok()
                .map(|detection| run_loop(detection, loop_stop))
        });

        let handle = match (self.spawn_loop)(body) {
            Ok(handle) => handle,
            Err(err) => {
                error!("detector: loop spawn failed err={err}");
                self.abort_start(detection.into_sensor());
                return Err(StartError::Spawn(err.to_string()));
            }
        };
        if let Err(mpsc::SendError(detection)) = handoff.send(detection) {
            let _ = handle.join();
            error!("detector: loop exited before handoff");
            self.abort_start(detection.into_sensor());
            return Err(StartError::Spawn("loop exited before handoff".into()));
        }

        self.running = Some(RunningLoop { stop, handle });
        info!(
            "detector: started sample_ms={} report_ms={} url={}",
            self.sample_interval.as_millis(),
            self.report_interval.as_millis(),
            self.reporter.url()
        );
        Ok(result.status)
    }

    fn abort_start(&mut self, mut sensor: S) {
        sensor.stop();
        self.sensor = Some(sensor);
        let _ = self.engine.apply(DetectorCommand::Stop);
    }

    pub fn stop(&mut self) -> DetectorApplyStatus {
        let result = self.engine.apply(DetectorCommand::Stop);
        if result.control() != Some(DetectorControl::Unsubscribe) {
            return result.status;
        }

        if let Some(running) = self.running.take() {
            running.stop.store(true, Ordering::Release);
            running.handle.thread().unpark();
            match running.handle.join() {
                Ok(Some(mut sensor)) => {
                    sensor.stop();
                    self.sensor = Some(sensor);
                }
                Ok(None) => error!("detector: loop never started, sensor lost"),
                Err(_) => error!("detector: loop panicked, sensor lost"),
            }
        }
        info!("detector: stopped");
        result.status
    }
}

impl<S: MotionSensor + 'static> Drop for Detector<S> {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

fn run_loop<S: MotionSensor>(mut detection: DetectionLoop<S>, stop: Arc<AtomicBool>) -> S {
    while !stop.load(Ordering::Acquire) {
        // Delivery handles are dropped: reports are fire-and-forget.
        let _ = detection.poll(Instant::now());
        let wait = detection
            .next_deadline()
            .saturating_duration_since(Instant::now());
        if !wait.is_zero() {
            thread::park_timeout(wait);
        }
    }
    detection.into_sensor()
}
