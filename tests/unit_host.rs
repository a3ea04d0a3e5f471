#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]

use microapp::host::{HostMonitor, Reachability};
use microapp::AppConfig;
use std::time::{Duration, Instant};

fn monitor(url: &str, timeout: Duration) -> HostMonitor {
    let config = AppConfig {
        internet_check_url: url.into(),
        internet_check_timeout: timeout,
        ..AppConfig::default()
    };
    HostMonitor::new(&config).expect("host monitor")
}

#[tokio::test]
async fn refused_connection_is_unreachable() {
    let host = monitor("http://127.0.0.1:9/", Duration::from_millis(500));
    let reach = host.check_internet().await;
    assert!(matches!(reach, Reachability::Unreachable(_)), "got {reach:?}");
    assert!(!reach.is_reachable());
}

#[tokio::test]
async fn slow_endpoint_times_out_as_unreachable() {
    // Blackholed address: the connect either hangs until the timeout or
    // fails at once when there is no route.
    let host = monitor("http://10.255.255.1/", Duration::from_millis(200));
    let started = Instant::now();
    let reach = host.check_internet().await;
    assert!(matches!(reach, Reachability::Unreachable(_)), "got {reach:?}");
    assert!(started.elapsed() < Duration::from_secs(3), "took {:?}", started.elapsed());
}

#[tokio::test]
async fn health_reports_no_connection_when_check_fails() {
    let host = monitor("http://127.0.0.1:9/", Duration::from_millis(500));
    let snapshot = host.health().await;
    assert!(!snapshot.has_internet_connection);
    assert!(snapshot.memory.total_mb >= snapshot.memory.available_mb);
}
