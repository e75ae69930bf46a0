use anyhow::{anyhow, Context, Result};

pub fn parse_env_u64(name: &str) -> Result<Option<u64>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .with_context(|| format!("{name} must be an unsigned integer")),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(err) => Err(anyhow!("{name} invalid: {err}")),
    }
}

pub fn parse_env_f64(name: &str) -> Result<Option<f64>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<f64>()
            .map(Some)
            .with_context(|| format!("{name} must be a number")),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(err) => Err(anyhow!("{name} invalid: {err}")),
    }
}

/// Unset and blank values both read as absent.
pub fn env_string(name: &str) -> Result<Option<String>> {
    match std::env::var(name) {
        Ok(raw) if raw.trim().is_empty() => Ok(None),
        Ok(raw) => Ok(Some(raw.trim().to_string())),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(err) => Err(anyhow!("{name} invalid: {err}")),
    }
}
