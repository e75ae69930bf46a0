use std::{fs, path::Path, time::Duration};

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;

use crate::{classifier::LabelPolicy, env_utils};

pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8880";
pub const DEFAULT_SAMPLE_INTERVAL_MS: u64 = 100;
pub const DEFAULT_REPORT_INTERVAL_MS: u64 = 60_000;
pub const DEFAULT_REQUEST_TIMEOUT_SEC: f64 = 10.0;
pub const DEFAULT_CONNECT_TIMEOUT_SEC: f64 = 4.0;
pub const DEFAULT_COLLECTOR_BIND: &str = "0.0.0.0:8880";

pub const ENV_ENDPOINT: &str = "TREMOR_ENDPOINT";
pub const ENV_SAMPLE_INTERVAL_MS: &str = "TREMOR_SAMPLE_INTERVAL_MS";
pub const ENV_REPORT_INTERVAL_MS: &str = "TREMOR_REPORT_INTERVAL_MS";
pub const ENV_LABEL_POLICY: &str = "TREMOR_LABEL_POLICY";
pub const ENV_REQUEST_TIMEOUT_SEC: &str = "TREMOR_REQUEST_TIMEOUT_SEC";
pub const ENV_CONNECT_TIMEOUT_SEC: &str = "TREMOR_CONNECT_TIMEOUT_SEC";

#[derive(Clone, Debug, PartialEq)]
pub struct DetectorConfig {
    /// Collector base URL; reports go to `<endpoint>/tremor`.
    pub endpoint: String,
    pub sample_interval: Duration,
    pub report_interval: Duration,
    pub label_policy: LabelPolicy,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            sample_interval: Duration::from_millis(DEFAULT_SAMPLE_INTERVAL_MS),
            report_interval: Duration::from_millis(DEFAULT_REPORT_INTERVAL_MS),
            label_policy: LabelPolicy::LevelName,
            request_timeout: Duration::from_secs_f64(DEFAULT_REQUEST_TIMEOUT_SEC),
            connect_timeout: Duration::from_secs_f64(DEFAULT_CONNECT_TIMEOUT_SEC),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    endpoint: Option<String>,
    sample_interval_ms: Option<u64>,
    report_interval_ms: Option<u64>,
    label_policy: Option<LabelPolicy>,
    request_timeout_sec: Option<f64>,
    connect_timeout_sec: Option<f64>,
}

impl DetectorConfig {
    /// Defaults, then the optional TOML file, then `TREMOR_*` environment
    /// overrides. The result is validated.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let text = fs::read_to_string(path)
                    .with_context(|| format!("failed to read config {}", path.display()))?;
                Self::from_toml_str(&text)
                    .with_context(|| format!("invalid config {}", path.display()))?
            }
            None => Self::default(),
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(text)?;
        let mut config = Self::default();
        if let Some(endpoint) = file.endpoint {
            config.endpoint = endpoint;
        }
        if let Some(ms) = file.sample_interval_ms {
            config.sample_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = file.report_interval_ms {
            config.report_interval = Duration::from_millis(ms);
        }
        if let Some(policy) = file.label_policy {
            config.label_policy = policy;
        }
        if let Some(sec) = file.request_timeout_sec {
            config.request_timeout = seconds("request_timeout_sec", sec)?;
        }
        if let Some(sec) = file.connect_timeout_sec {
            config.connect_timeout = seconds("connect_timeout_sec", sec)?;
        }
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(endpoint) = env_utils::env_string(ENV_ENDPOINT)? {
            self.endpoint = endpoint;
        }
        if let Some(ms) = env_utils::parse_env_u64(ENV_SAMPLE_INTERVAL_MS)? {
            self.sample_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = env_utils::parse_env_u64(ENV_REPORT_INTERVAL_MS)? {
            self.report_interval = Duration::from_millis(ms);
        }
        if let Some(raw) = env_utils::env_string(ENV_LABEL_POLICY)? {
            self.label_policy =
                LabelPolicy::parse(&raw).map_err(|err| anyhow!("{ENV_LABEL_POLICY}: {err}"))?;
        }
        if let Some(sec) = env_utils::parse_env_f64(ENV_REQUEST_TIMEOUT_SEC)? {
            self.request_timeout = seconds(ENV_REQUEST_TIMEOUT_SEC, sec)?;
        }
        if let Some(sec) = env_utils::parse_env_f64(ENV_CONNECT_TIMEOUT_SEC)? {
            self.connect_timeout = seconds(ENV_CONNECT_TIMEOUT_SEC, sec)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let url = reqwest::Url::parse(&self.endpoint)
            .with_context(|| format!("endpoint `{}` is not a valid URL", self.endpoint))?;
        if !matches!(url.scheme(), "http" | "https") {
            bail!("endpoint `{}` must use http or https", self.endpoint);
        }
        if self.sample_interval.is_zero() {
            bail!("sample interval must be non-zero");
        }
        if self.report_interval.is_zero() {
            bail!("report interval must be non-zero");
        }
        if self.request_timeout.is_zero() || self.connect_timeout.is_zero() {
            bail!("http timeouts must be non-zero");
        }
        // Each report tick spawns one delivery worker; keep at most one in flight.
        if self.report_interval < self.request_timeout {
            bail!(
                "report interval {} ms is shorter than request timeout {} ms",
                self.report_interval.as_millis(),
                self.request_timeout.as_millis()
            );
        }
        Ok(())
    }
}

fn seconds(name: &str, sec: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(sec).map_err(|err| anyhow!("{name} invalid: {err}"))
}
