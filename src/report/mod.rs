//! Outbound tremor reports.
//!
//! One report per timer tick, posted as JSON to `<endpoint>/tremor`. Delivery
//! is best effort: failures are logged and the report is dropped.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::classifier::IntensityState;

mod reporter;
mod transport;

pub use reporter::Reporter;
pub use transport::{tremor_url, HttpTransport, ReportTransport, TransportError};

pub const TREMOR_ROUTE: &str = "/tremor";
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Wire body. Field order is part of the format.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct TremorReport {
    pub intensity: u8,
    pub situation: String,
}

impl TremorReport {
    pub fn from_state(state: &IntensityState) -> Self {
        Self {
            intensity: state.intensity(),
            situation: state.situation.clone(),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum DeliveryOutcome {
    Delivered,
    UnexpectedStatus(u16),
    Transport(String),
    Encode(String),
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered)
    }
}

impl fmt::Display for DeliveryOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Delivered => f.write_str("delivered"),
            Self::UnexpectedStatus(code) => write!(f, "unexpected status {code}"),
            Self::Transport(err) => write!(f, "transport error: {err}"),
            Self::Encode(err) => write!(f, "encode error: {err}"),
        }
    }
}
