#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]

use microapp::config::{AppConfig, DEFAULT_PORT, DEFAULT_SECRET_TOKEN};
use std::collections::HashMap;
use std::time::Duration;

fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    move |key: &str| map.get(key).cloned()
}

#[test]
fn defaults_when_unset() {
    let cfg = AppConfig::from_lookup(lookup(&[])).expect("config");
    assert_eq!(cfg.port, DEFAULT_PORT);
    assert_eq!(cfg.secret_token, DEFAULT_SECRET_TOKEN);
    assert!(cfg.uses_default_secret());
    assert_eq!(cfg.cpu_workers, None);
    assert_eq!(cfg.cpu_sample_interval, Duration::from_millis(200));
}

#[test]
fn overrides_from_env() {
    let cfg = AppConfig::from_lookup(lookup(&[
        ("APP_PORT", "8080"),
        ("APP_SECRET_TOKEN", "s3cret"),
        ("APP_SAMPLE_FILE", "/tmp/sample.txt"),
        ("APP_INTERNET_CHECK_URL", "http://127.0.0.1:9/"),
        ("APP_INTERNET_CHECK_TIMEOUT_MS", "250"),
        ("APP_CPU_WORKERS", "3"),
    ]))
    .expect("config");
    assert_eq!(cfg.port, 8080);
    assert!(!cfg.uses_default_secret());
    assert_eq!(cfg.sample_file.to_str(), Some("/tmp/sample.txt"));
    assert_eq!(cfg.internet_check_timeout, Duration::from_millis(250));
    assert_eq!(cfg.cpu_workers, Some(3));
}

#[test]
fn invalid_value_is_an_error() {
    let err = AppConfig::from_lookup(lookup(&[("APP_PORT", "seventy")])).unwrap_err();
    assert!(format!("{err:#}").contains("APP_PORT"));
}
