use std::{
    sync::Arc,
    thread::{self, JoinHandle},
};

use log::{info, warn};

use super::{transport::tremor_url, DeliveryOutcome, ReportTransport, TremorReport};

const HTTP_OK: u16 = 200;

#[derive(Clone)]
pub struct Reporter {
    url: String,
    transport: Arc<dyn ReportTransport>,
}

impl Reporter {
    pub fn new(endpoint: &str, transport: Arc<dyn ReportTransport>) -> Self {
        Self {
            url: tremor_url(endpoint),
            transport,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Posts the report on the calling thread and logs the outcome.
    pub fn deliver(&self, report: &TremorReport) -> DeliveryOutcome {
        let outcome = deliver_once(self.transport.as_ref(), &self.url, report);
        log_outcome(&self.url, report, &outcome);
        outcome
    }

    /// Posts the report on a detached worker and returns immediately.
    ///
    /// Callers may drop the handle; the request then completes or fails on
    /// its own. `None` means the worker could not be spawned and the report
    /// was dropped.
    pub fn dispatch(&self, report: TremorReport) -> Option<JoinHandle<DeliveryOutcome>> {
        let reporter = self.clone();
        let spawned = thread::Builder::new()
            .name("tremor-report".into())
            .spawn(move || reporter.deliver(&report));
        match spawned {
            Ok(handle) => Some(handle),
            Err(err) => {
                warn!("reporter: dispatch dropped err={err}");
                None
            }
        }
    }
}

fn deliver_once(
    transport: &dyn ReportTransport,
    url: &str,
    report: &TremorReport,
) -> DeliveryOutcome {
    let body = match report.encode() {
        Ok(body) => body,
        Err(err) => return DeliveryOutcome::Encode(err.to_string()),
    };
    match transport.post_json(url, body) {
        Ok(HTTP_OK) => DeliveryOutcome::Delivered,
        Ok(status) => DeliveryOutcome::UnexpectedStatus(status),
        Err(err) => DeliveryOutcome::Transport(err.to_string()),
    }
}

fn log_outcome(url: &str, report: &TremorReport, outcome: &DeliveryOutcome) {
    match outcome {
        DeliveryOutcome::Delivered => info!(
            "reporter: sent intensity={} situation={:?}",
            report.intensity, report.situation
        ),
        DeliveryOutcome::UnexpectedStatus(status) => {
            warn!("reporter: dropped url={url} status={status}")
        }
        DeliveryOutcome::Transport(err) => warn!("reporter: dropped url={url} err={err}"),
        DeliveryOutcome::Encode(err) => warn!("reporter: dropped encode err={err}"),
    }
}
