#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]

use anyhow::{Context, Result as AnyResult};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 7000;
pub const DEFAULT_SECRET_TOKEN: &str = "secret";
pub const DEFAULT_SAMPLE_FILE: &str = "data/sample_data.txt";
pub const DEFAULT_INTERNET_CHECK_URL: &str = "http://www.google.com/";
pub const DEFAULT_INTERNET_CHECK_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_CPU_SAMPLE_MS: u64 = 200;

/// Process configuration, read once at startup.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub secret_token: String,
    pub sample_file: PathBuf,
    pub internet_check_url: String,
    pub internet_check_timeout: Duration,
    pub cpu_sample_interval: Duration,
    /// Overrides the number of duty-cycle workers. `None` uses every
    /// available processing unit.
    pub cpu_workers: Option<usize>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            secret_token: DEFAULT_SECRET_TOKEN.to_string(),
            sample_file: PathBuf::from(DEFAULT_SAMPLE_FILE),
            internet_check_url: DEFAULT_INTERNET_CHECK_URL.to_string(),
            internet_check_timeout: Duration::from_millis(DEFAULT_INTERNET_CHECK_TIMEOUT_MS),
            cpu_sample_interval: Duration::from_millis(DEFAULT_CPU_SAMPLE_MS),
            cpu_workers: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> AnyResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup. Unset keys fall back
    /// to defaults; set but unparsable keys are an error.
    pub fn from_lookup<F>(lookup: F) -> AnyResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let port = parse_var(&lookup, "APP_PORT")?.unwrap_or(defaults.port);
        let secret_token = lookup("APP_SECRET_TOKEN").unwrap_or(defaults.secret_token);
        let sample_file = lookup("APP_SAMPLE_FILE").map_or(defaults.sample_file, PathBuf::from);
        let internet_check_url =
            lookup("APP_INTERNET_CHECK_URL").unwrap_or(defaults.internet_check_url);
        let internet_check_timeout = parse_var::<u64, _>(&lookup, "APP_INTERNET_CHECK_TIMEOUT_MS")?
            .map_or(defaults.internet_check_timeout, Duration::from_millis);
        let cpu_sample_interval = parse_var::<u64, _>(&lookup, "APP_CPU_SAMPLE_MS")?
            .map_or(defaults.cpu_sample_interval, Duration::from_millis);
        let cpu_workers = parse_var(&lookup, "APP_CPU_WORKERS")?;
        Ok(Self {
            port,
            secret_token,
            sample_file,
            internet_check_url,
            internet_check_timeout,
            cpu_sample_interval,
            cpu_workers,
        })
    }

    pub fn uses_default_secret(&self) -> bool {
        self.secret_token == DEFAULT_SECRET_TOKEN
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> AnyResult<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .with_context(|| format!("invalid value for {key}: {raw:?}")),
    }
}
