use core::sync::atomic::{AtomicUsize, Ordering};
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use crate::{
    report::{ReportTransport, TransportError},
    sensor::{MotionSample, MotionSensor, SensorError},
};

/// Records every post and answers with a fixed result.
pub(crate) struct RecordingTransport {
    pub(crate) posts: Mutex<Vec<(String, Vec<u8>)>>,
    reply: Result<u16, TransportError>,
}

impl RecordingTransport {
    pub(crate) fn replying(status: u16) -> Arc<Self> {
        Arc::new(Self {
            posts: Mutex::new(Vec::new()),
            reply: Ok(status),
        })
    }

    pub(crate) fn failing(reason: &str) -> Arc<Self> {
        Arc::new(Self {
            posts: Mutex::new(Vec::new()),
            reply: Err(TransportError(reason.into())),
        })
    }

    pub(crate) fn post_count(&self) -> usize {
        self.posts.lock().unwrap().len()
    }

    pub(crate) fn bodies(&self) -> Vec<String> {
        self.posts
            .lock()
            .unwrap()
            .iter()
            .map(|(_, body)| String::from_utf8_lossy(body).into_owned())
            .collect()
    }
}

impl ReportTransport for RecordingTransport {
    fn post_json(&self, url: &str, body: Vec<u8>) -> Result<u16, TransportError> {
        self.posts.lock().unwrap().push((url.to_string(), body));
        self.reply.clone()
    }
}

#[derive(Clone, Default)]
pub(crate) struct SensorProbe {
    pub(crate) starts: Arc<AtomicUsize>,
    pub(crate) stops: Arc<AtomicUsize>,
    pub(crate) reads: Arc<AtomicUsize>,
}

impl SensorProbe {
    pub(crate) fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub(crate) fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub(crate) fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

/// Cycles through fixed x-axis magnitudes; `None` entries fail the read.
pub(crate) struct ScriptedSensor {
    script: Vec<Option<f64>>,
    cursor: usize,
    available: bool,
    probe: SensorProbe,
}

impl ScriptedSensor {
    pub(crate) fn new(script: Vec<Option<f64>>) -> (Self, SensorProbe) {
        let probe = SensorProbe::default();
        let sensor = Self {
            script,
            cursor: 0,
            available: true,
            probe: probe.clone(),
        };
        (sensor, probe)
    }

    pub(crate) fn constant(magnitude: f64) -> (Self, SensorProbe) {
        Self::new(vec![Some(magnitude)])
    }

    pub(crate) fn unavailable() -> (Self, SensorProbe) {
        let (mut sensor, probe) = Self::new(vec![Some(0.0)]);
        sensor.available = false;
        (sensor, probe)
    }
}

impl MotionSensor for ScriptedSensor {
    fn start(&mut self, _interval: Duration) -> Result<(), SensorError> {
        if !self.available {
            return Err(SensorError::Unavailable("device motion not available".into()));
        }
        self.probe.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn read(&mut self) -> Result<MotionSample, SensorError> {
        self.probe.reads.fetch_add(1, Ordering::SeqCst);
        let entry = self.script[self.cursor % self.script.len()];
        self.cursor += 1;
        match entry {
            Some(x) => Ok(MotionSample::new(x, 0.0, 0.0)),
            None => Err(SensorError::Read("scripted failure".into())),
        }
    }

    fn stop(&mut self) {
        self.probe.stops.fetch_add(1, Ordering::SeqCst);
    }
}
