use core::fmt;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{blocking::Client, header::CONTENT_TYPE};

use super::{JSON_CONTENT_TYPE, TREMOR_ROUTE};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransportError(pub String);

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for TransportError {}

/// Sends one JSON body and returns the response status code.
pub trait ReportTransport: Send + Sync {
    fn post_json(&self, url: &str, body: Vec<u8>) -> Result<u16, TransportError>;
}

pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(request_timeout: Duration, connect_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .no_proxy()
            .timeout(request_timeout)
            .connect_timeout(connect_timeout)
            .build()
            .context("failed to build http client")?;
        Ok(Self { client })
    }
}

impl ReportTransport for HttpTransport {
    fn post_json(&self, url: &str, body: Vec<u8>) -> Result<u16, TransportError> {
        let resp = self
            .client
            .post(url)
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
            .body(body)
            .send()
            .map_err(|err| TransportError(format!("POST {url} send failed: {err}")))?;
        Ok(resp.status().as_u16())
    }
}

pub fn tremor_url(endpoint: &str) -> String {
    let mut url = endpoint.trim().trim_end_matches('/').to_string();
    url.push_str(TREMOR_ROUTE);
    url
}
