use std::{
    fs::{self, File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
    time::{SystemTime, UNIX_EPOCH},
};

use anyhow::{Context, Result};
use log::{Level, LevelFilter, Log, Metadata, Record};
use serde_json::json;

pub const ENV_LOG_JSON_PATH: &str = "TREMOR_LOG_JSON_PATH";

/// `log` backend: info and below to stdout, warnings and errors to stderr,
/// plus an optional JSON-lines mirror on disk.
pub struct Logger {
    level: LevelFilter,
    json_file: Mutex<Option<File>>,
}

impl Logger {
    pub fn new(level: LevelFilter, path: Option<PathBuf>) -> Result<Self> {
        let json_file = match path {
            Some(path) => {
                ensure_parent_dir(&path)?;
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&path)
                    .with_context(|| format!("failed to open log file {}", path.display()))?;
                Some(file)
            }
            None => None,
        };
        Ok(Self {
            level,
            json_file: Mutex::new(json_file),
        })
    }

    fn event(&self, level: Level, target: &str, message: &str) {
        let mut guard = self.json_file.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(file) = guard.as_mut() else {
            return;
        };

        let ts_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        let _ = writeln!(file, "{}", json_line(ts_ms, level, target, message));
        let _ = file.flush();
    }
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let message = record.args().to_string();
        match record.level() {
            Level::Error | Level::Warn => eprintln!("{message}"),
            _ => println!("{message}"),
        }
        self.event(record.level(), record.target(), &message);
    }

    fn flush(&self) {
        let mut guard = self.json_file.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(file) = guard.as_mut() {
            let _ = file.flush();
        }
    }
}

/// Installs the process logger. The JSON mirror path falls back to
/// `TREMOR_LOG_JSON_PATH`.
pub fn init(level: LevelFilter, json_path: Option<PathBuf>) -> Result<()> {
    let json_path = json_path.or_else(|| std::env::var(ENV_LOG_JSON_PATH).ok().map(PathBuf::from));
    let logger = Logger::new(level, json_path)?;
    log::set_boxed_logger(Box::new(logger)).context("logger already installed")?;
    log::set_max_level(level);
    Ok(())
}

fn json_line(ts_ms: u64, level: Level, target: &str, message: &str) -> String {
    json!({
        "ts_ms": ts_ms,
        "level": level.as_str().to_ascii_lowercase(),
        "target": target,
        "msg": message,
    })
    .to_string()
}

pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}
