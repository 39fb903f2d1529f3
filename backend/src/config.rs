//! Runtime configuration, read from `TRACKER_*` environment variables.

use std::path::PathBuf;
use thiserror::Error;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_DB_PATH: &str = "tracker.sqlite";
pub const DEFAULT_REPORT_QUEUE: usize = 100;
pub const DEFAULT_REPORT_WORKERS: usize = 4;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerConfig {
    pub host: String,
    pub port: u16,
    /// SQLite database holding the associations and the inventory tables.
    pub db_path: PathBuf,
    /// Capacity of the progress report channel.
    pub report_queue_capacity: usize,
    /// Reports applied concurrently by the updater.
    pub report_workers: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            report_queue_capacity: DEFAULT_REPORT_QUEUE,
            report_workers: DEFAULT_REPORT_WORKERS,
        }
    }
}

impl TrackerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup; unset keys keep their default.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(host) = lookup("TRACKER_HOST") {
            config.host = host;
        }
        if let Some(port) = lookup("TRACKER_PORT") {
            config.port = parse("TRACKER_PORT", port)?;
        }
        if let Some(path) = lookup("TRACKER_DB_PATH") {
            config.db_path = PathBuf::from(path);
        }
        if let Some(capacity) = lookup("TRACKER_REPORT_QUEUE") {
            // tokio channels cannot have zero capacity
            config.report_queue_capacity = parse_positive("TRACKER_REPORT_QUEUE", capacity)?;
        }
        if let Some(workers) = lookup("TRACKER_REPORT_WORKERS") {
            config.report_workers = parse_positive("TRACKER_REPORT_WORKERS", workers)?;
        }
        Ok(config)
    }

    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

fn parse<T: std::str::FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue { key, value })
}

fn parse_positive(key: &'static str, value: String) -> Result<usize, ConfigError> {
    match parse(key, value.clone())? {
        0 => Err(ConfigError::InvalidValue { key, value }),
        parsed => Ok(parsed),
    }
}
