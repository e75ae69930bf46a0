use std::{
    io,
    sync::Arc,
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use chrono::NaiveTime;

use super::runtime::LoopBody;
use super::*;
use crate::{
    classifier::{IntensityLevel, LabelPolicy},
    config::DetectorConfig,
    report::{DeliveryOutcome, Reporter},
    test_support::{RecordingTransport, ScriptedSensor},
};

const SAMPLE: Duration = Duration::from_millis(100);
const REPORT: Duration = Duration::from_secs(60);

fn quarter_past_nine() -> NaiveTime {
    NaiveTime::from_hms_opt(9, 15, 0).unwrap()
}

fn detection_loop(
    sensor: ScriptedSensor,
    policy: LabelPolicy,
    transport: Arc<RecordingTransport>,
    started_at: Instant,
) -> (DetectionLoop<ScriptedSensor>, Arc<IntensityCell>) {
    let cell = Arc::new(IntensityCell::new(policy));
    let reporter = Reporter::new("http://collector:8880", transport);
    let detection =
        DetectionLoop::new(sensor, Arc::clone(&cell), reporter, SAMPLE, REPORT, started_at)
            .with_wall_clock(quarter_past_nine);
    (detection, cell)
}

fn join_delivery(tick: LoopTick) -> Option<DeliveryOutcome> {
    tick.delivery.map(|handle| handle.join().unwrap())
}

#[test]
fn nothing_is_due_before_first_interval() {
    let (sensor, probe) = ScriptedSensor::constant(1.0);
    let transport = RecordingTransport::replying(200);
    let t0 = Instant::now();
    let (mut detection, _) = detection_loop(sensor, LabelPolicy::LevelName, transport.clone(), t0);

    let tick = detection.poll(t0 + SAMPLE / 2);
    assert!(!tick.sampled);
    assert!(!tick.reported);
    assert_eq!(probe.reads(), 0);
    assert_eq!(detection.next_deadline(), t0 + SAMPLE);
}

#[test]
fn samples_update_level_without_reporting() {
    let (sensor, _) = ScriptedSensor::new(vec![Some(0.3), Some(0.9), Some(1.5)]);
    let transport = RecordingTransport::replying(200);
    let t0 = Instant::now();
    let (mut detection, cell) =
        detection_loop(sensor, LabelPolicy::LevelName, transport.clone(), t0);

    let expected = [IntensityLevel::Low, IntensityLevel::High, IntensityLevel::ExtraHigh];
    for (idx, level) in expected.into_iter().enumerate() {
        let tick = detection.poll(t0 + SAMPLE * (idx as u32 + 1));
        assert!(tick.sampled);
        assert_eq!(cell.level(), level);
    }
    assert_eq!(transport.post_count(), 0);
    assert_eq!(detection.stats().samples_taken, 3);
}

#[test]
fn at_most_one_report_per_period_under_fast_sampling() {
    let (sensor, _) = ScriptedSensor::constant(0.9);
    let transport = RecordingTransport::replying(200);
    let t0 = Instant::now();
    let (mut detection, _) = detection_loop(sensor, LabelPolicy::LevelName, transport.clone(), t0);

    let mut reports = 0;
    let mut now = t0;
    let end = t0 + REPORT * 3 + Duration::from_millis(500);
    while now <= end {
        let tick = detection.poll(now);
        if tick.reported {
            reports += 1;
            assert_eq!(join_delivery(tick), Some(DeliveryOutcome::Delivered));
        }
        now += Duration::from_millis(1);
    }

    assert_eq!(reports, 3);
    assert_eq!(transport.post_count(), 3);
    assert_eq!(detection.stats().reports_dispatched, 3);
}

#[test]
fn late_poll_does_not_replay_missed_reports() {
    let (sensor, _) = ScriptedSensor::constant(0.2);
    let transport = RecordingTransport::replying(200);
    let t0 = Instant::now();
    let (mut detection, _) = detection_loop(sensor, LabelPolicy::LevelName, transport.clone(), t0);

    let late = t0 + REPORT * 5;
    let tick = detection.poll(late);
    assert!(tick.sampled);
    assert!(tick.reported);
    let _ = join_delivery(tick);

    let again = detection.poll(late + Duration::from_millis(1));
    assert!(!again.reported);
    assert_eq!(transport.post_count(), 1);
}

#[test]
fn report_carries_latest_state() {
    let (sensor, _) = ScriptedSensor::constant(0.9);
    let transport = RecordingTransport::replying(200);
    let t0 = Instant::now();
    let (mut detection, _) = detection_loop(sensor, LabelPolicy::LevelName, transport.clone(), t0);

    let _ = detection.poll(t0 + SAMPLE);
    let tick = detection.poll(t0 + REPORT);
    let _ = join_delivery(tick);

    assert_eq!(
        transport.bodies(),
        vec![r#"{"intensity":3,"situation":"High intensity tremor"}"#.to_string()]
    );
}

#[test]
fn detection_time_policy_stamps_each_report() {
    let (sensor, _) = ScriptedSensor::constant(0.0);
    let transport = RecordingTransport::replying(200);
    let t0 = Instant::now();
    let (mut detection, cell) =
        detection_loop(sensor, LabelPolicy::DetectionTime, transport.clone(), t0);

    let _ = join_delivery(detection.poll(t0 + REPORT));

    assert_eq!(
        transport.bodies(),
        vec![r#"{"intensity":0,"situation":"Tremor detected at 09:15"}"#.to_string()]
    );
    assert_eq!(cell.read().situation, "Tremor detected at 09:15");
}

#[test]
fn failed_reads_are_dropped_and_loop_continues() {
    let (sensor, probe) = ScriptedSensor::new(vec![Some(0.6), None, Some(1.0)]);
    let transport = RecordingTransport::replying(200);
    let t0 = Instant::now();
    let (mut detection, cell) =
        detection_loop(sensor, LabelPolicy::LevelName, transport.clone(), t0);

    let _ = detection.poll(t0 + SAMPLE);
    assert_eq!(cell.level(), IntensityLevel::Medium);
    let _ = detection.poll(t0 + SAMPLE * 2);
    assert_eq!(cell.level(), IntensityLevel::Medium);
    let _ = detection.poll(t0 + SAMPLE * 3);
    assert_eq!(cell.level(), IntensityLevel::High);

    assert_eq!(probe.reads(), 3);
    let stats = detection.stats();
    assert_eq!(stats.samples_taken, 2);
    assert_eq!(stats.samples_dropped, 1);
}

#[test]
fn failed_delivery_is_not_retried() {
    let (sensor, _) = ScriptedSensor::constant(0.4);
    let transport = RecordingTransport::failing("network unreachable");
    let t0 = Instant::now();
    let (mut detection, _) = detection_loop(sensor, LabelPolicy::LevelName, transport.clone(), t0);

    let outcome = join_delivery(detection.poll(t0 + REPORT));
    assert!(matches!(outcome, Some(DeliveryOutcome::Transport(_))));
    let _ = detection.poll(t0 + REPORT + SAMPLE);
    assert_eq!(transport.post_count(), 1);
}

fn fast_config(report_interval: Duration) -> DetectorConfig {
    DetectorConfig {
        sample_interval: Duration::from_millis(1),
        report_interval,
        ..DetectorConfig::default()
    }
}

#[test]
fn stop_before_first_tick_sends_nothing() {
    let (sensor, probe) = ScriptedSensor::constant(1.5);
    let transport = RecordingTransport::replying(200);
    let config = fast_config(Duration::from_secs(30));
    let mut detector = Detector::new(&config, sensor, transport.clone());

    assert_eq!(detector.start().unwrap(), DetectorApplyStatus::Applied);
    assert_eq!(detector.phase(), Phase::Detecting);
    thread::sleep(Duration::from_millis(20));
    assert_eq!(detector.stop(), DetectorApplyStatus::Applied);

    assert_eq!(detector.phase(), Phase::Idle);
    assert_eq!(transport.post_count(), 0);
    assert_eq!(probe.starts(), 1);
    assert_eq!(probe.stops(), 1);
}

#[test]
fn double_start_and_double_stop_are_guarded() {
    let (sensor, probe) = ScriptedSensor::constant(0.2);
    let transport = RecordingTransport::replying(200);
    let mut detector = Detector::new(&fast_config(Duration::from_secs(30)), sensor, transport);

    assert_eq!(detector.stop(), DetectorApplyStatus::Unchanged);
    assert_eq!(detector.start().unwrap(), DetectorApplyStatus::Applied);
    assert_eq!(detector.start().unwrap(), DetectorApplyStatus::Unchanged);
    assert_eq!(probe.starts(), 1);

    assert_eq!(detector.stop(), DetectorApplyStatus::Applied);
    assert_eq!(detector.stop(), DetectorApplyStatus::Unchanged);
    assert_eq!(probe.stops(), 1);
}

#[test]
fn unavailable_sensor_keeps_detector_idle() {
    let (sensor, probe) = ScriptedSensor::unavailable();
    let transport = RecordingTransport::replying(200);
    let config = fast_config(Duration::from_millis(5));
    let mut detector = Detector::new(&config, sensor, transport.clone());

    let err = detector.start().unwrap_err();
    assert!(matches!(err, StartError::SensorUnavailable(_)));
    assert!(err.to_string().contains("unavailable"));
    assert_eq!(detector.phase(), Phase::Idle);
    assert_eq!(probe.starts(), 0);

    thread::sleep(Duration::from_millis(20));
    assert_eq!(transport.post_count(), 0);
}

#[test]
fn detector_can_restart_after_stop() {
    let (sensor, probe) = ScriptedSensor::constant(0.7);
    let transport = RecordingTransport::replying(200);
    let mut detector = Detector::new(&fast_config(Duration::from_secs(30)), sensor, transport);

    detector.start().unwrap();
    detector.stop();
    detector.start().unwrap();
    assert_eq!(detector.phase(), Phase::Detecting);
    detector.stop();

    assert_eq!(probe.starts(), 2);
    assert_eq!(probe.stops(), 2);
}

#[test]
fn running_detector_reports_periodically() {
    let (sensor, probe) = ScriptedSensor::constant(0.9);
    let transport = RecordingTransport::replying(200);
    let report_interval = Duration::from_millis(40);
    let mut detector = Detector::new(&fast_config(report_interval), sensor, transport.clone());

    let started = Instant::now();
    detector.start().unwrap();
    let deadline = started + Duration::from_secs(5);
    while transport.post_count() == 0 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    let status = detector.status();
    detector.stop();
    let elapsed = started.elapsed();

    assert!(probe.reads() > 0);
    assert_eq!(status.phase, Phase::Detecting);
    assert_eq!(status.state.level, IntensityLevel::High);

    let posts = transport.post_count();
    assert!(posts >= 1);
    let ceiling = (elapsed.as_millis() / report_interval.as_millis()) as usize + 1;
    assert!(posts <= ceiling, "posts={posts} ceiling={ceiling}");
}

#[test]
fn dropping_detector_stops_loop() {
    let (sensor, probe) = ScriptedSensor::constant(0.1);
    let transport = RecordingTransport::replying(200);
    {
        let mut detector = Detector::new(&fast_config(Duration::from_secs(30)), sensor, transport);
        detector.start().unwrap();
    }
    assert_eq!(probe.stops(), 1);
    let reads = probe.reads();
    thread::sleep(Duration::from_millis(20));
    assert_eq!(probe.reads(), reads);
}

fn refuse_spawn<S>(_body: LoopBody<S>) -> io::Result<JoinHandle<Option<S>>> {
    Err(io::Error::other("thread limit reached"))
}

fn spawn_unnamed<S: Send + 'static>(body: LoopBody<S>) -> io::Result<JoinHandle<Option<S>>> {
    Ok(thread::spawn(body))
}

#[test]
fn refused_loop_spawn_closes_sensor_and_allows_retry() {
    let (sensor, probe) = ScriptedSensor::constant(0.9);
    let transport = RecordingTransport::replying(200);
    let config = fast_config(Duration::from_secs(30));
    let mut detector = Detector::new(&config, sensor, transport);

    detector.set_loop_spawner(refuse_spawn);
    let err = detector.start().unwrap_err();
    assert!(matches!(err, StartError::Spawn(_)));
    assert!(err.to_string().contains("thread limit reached"));
    assert_eq!(detector.phase(), Phase::Idle);
    assert_eq!(probe.starts(), 1);
    assert_eq!(probe.stops(), 1);

    detector.set_loop_spawner(spawn_unnamed);
    assert_eq!(detector.start().unwrap(), DetectorApplyStatus::Applied);
    assert_eq!(detector.phase(), Phase::Detecting);
    assert_eq!(detector.stop(), DetectorApplyStatus::Applied);
    assert_eq!(probe.starts(), 2);
    assert_eq!(probe.stops(), 2);
}
