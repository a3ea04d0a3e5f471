#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]

//! Read-only host and process metrics.
//!
//! Nothing here is cached: every call reflects the instant it was made, and
//! any value the platform cannot report degrades to `None`.

use anyhow::{Context, Result as AnyResult};
use serde::Serialize;
use std::net::ToSocketAddrs;
use std::time::Duration;
use sysinfo::{Networks, System, MINIMUM_CPU_UPDATE_INTERVAL};
use tracing::debug;

use crate::config::AppConfig;

const BYTES_PER_MB: u64 = 1024 * 1024;

#[derive(Clone, Debug, Serialize)]
pub struct SystemInfo {
    pub host_name: Option<String>,
    pub host_ip: Option<String>,
    pub arch: String,
    pub processor: Option<String>,
    pub n_processors: Option<usize>,
    pub processor_freq_ghz: Option<f64>,
    pub memory_mb: Option<u64>,
    pub mac_address: Option<String>,
    pub os: Option<String>,
    pub os_release: Option<String>,
    pub os_version: Option<String>,
    pub user: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct MemoryUsage {
    pub total_mb: u64,
    pub used_mb: u64,
    pub available_mb: u64,
    pub usage_perc: Option<f64>,
}

#[derive(Clone, Debug, Serialize)]
pub struct CpuUsage {
    pub usage_perc: Option<f32>,
    /// 1, 5 and 15 minute load averages as a percentage of all cores.
    pub average_load_perc: Option<[f64; 3]>,
}

#[derive(Clone, Debug, Serialize)]
pub struct HealthSnapshot {
    pub memory: MemoryUsage,
    pub cpu: CpuUsage,
    pub has_internet_connection: bool,
}

/// Outcome of one outbound reachability check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reachability {
    Reachable,
    Unreachable(String),
}

impl Reachability {
    pub fn is_reachable(&self) -> bool {
        matches!(self, Reachability::Reachable)
    }
}

#[derive(Clone)]
pub struct HostMonitor {
    http: reqwest::Client,
    check_url: String,
    cpu_sample: Duration,
}

impl HostMonitor {
    pub fn new(config: &AppConfig) -> AnyResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.internet_check_timeout)
            .build()
            .context("build reachability http client")?;
        Ok(Self {
            http,
            check_url: config.internet_check_url.clone(),
            cpu_sample: config.cpu_sample_interval.max(MINIMUM_CPU_UPDATE_INTERVAL),
        })
    }

    /// Static description of the host. Blocking: resolves the hostname.
    pub fn describe(&self) -> SystemInfo {
        let mut sys = System::new();
        sys.refresh_cpu();
        sys.refresh_memory();

        let host_name = System::host_name();
        let host_ip = host_name.as_deref().and_then(resolve_host_ip);
        let cpus = sys.cpus();
        let processor = cpus
            .first()
            .map(|cpu| cpu.brand().trim().to_string())
            .filter(|brand| !brand.is_empty());
        let n_processors = (!cpus.is_empty()).then_some(cpus.len());
        let processor_freq_ghz = cpus.first().and_then(|cpu| mhz_to_ghz(cpu.frequency()));
        let memory_mb = Some(to_mb(sys.total_memory())).filter(|mb| *mb > 0);

        SystemInfo {
            host_name,
            host_ip,
            arch: std::env::consts::ARCH.to_string(),
            processor,
            n_processors,
            processor_freq_ghz,
            memory_mb,
            mac_address: first_mac_address(),
            os: System::name(),
            os_release: System::kernel_version(),
            os_version: System::os_version(),
            user: current_user(),
        }
    }

    /// Current memory, cpu and reachability. Cpu sampling and the
    /// reachability check run concurrently.
    pub async fn health(&self) -> HealthSnapshot {
        let (cpu, reachability) = tokio::join!(self.sample_cpu(), self.check_internet());
        HealthSnapshot {
            memory: memory_usage(),
            cpu,
            has_internet_connection: reachability.is_reachable(),
        }
    }

    /// Any HTTP answer counts as reachable; transport errors and timeouts
    /// do not.
    pub async fn check_internet(&self) -> Reachability {
        match self.http.head(&self.check_url).send().await {
            Ok(resp) => {
                debug!(
                    url = %self.check_url,
                    status = %resp.status(),
                    "reachability check answered"
                );
                Reachability::Reachable
            }
            Err(e) => {
                debug!(url = %self.check_url, error = %e, "reachability check failed");
                Reachability::Unreachable(e.to_string())
            }
        }
    }

    async fn sample_cpu(&self) -> CpuUsage {
        let mut sys = System::new();
        sys.refresh_cpu();
        tokio::time::sleep(self.cpu_sample).await;
        sys.refresh_cpu();

        let cores = sys.cpus().len();
        if cores == 0 {
            return CpuUsage {
                usage_perc: None,
                average_load_perc: None,
            };
        }
        let load = System::load_average();
        CpuUsage {
            usage_perc: Some(sys.global_cpu_info().cpu_usage()),
            average_load_perc: Some([
                per_core_perc(load.one, cores),
                per_core_perc(load.five, cores),
                per_core_perc(load.fifteen, cores),
            ]),
        }
    }
}

pub fn memory_usage() -> MemoryUsage {
    let mut sys = System::new();
    sys.refresh_memory();
    let total = sys.total_memory();
    let available = sys.available_memory();
    MemoryUsage {
        total_mb: to_mb(total),
        used_mb: to_mb(sys.used_memory()),
        available_mb: to_mb(available),
        usage_perc: percent(total.saturating_sub(available), total),
    }
}

#[allow(clippy::cast_precision_loss)]
pub fn per_core_perc(load: f64, cores: usize) -> f64 {
    load / cores as f64 * 100.0
}

#[allow(clippy::cast_precision_loss)]
fn percent(part: u64, total: u64) -> Option<f64> {
    if total == 0 {
        return None;
    }
    let perc = part as f64 / total as f64 * 100.0;
    Some((perc * 10.0).round() / 10.0)
}

/// Bytes to MB, rounded to nearest.
pub fn to_mb(bytes: u64) -> u64 {
    bytes.saturating_add(BYTES_PER_MB / 2) / BYTES_PER_MB
}

#[allow(clippy::cast_precision_loss)]
fn mhz_to_ghz(mhz: u64) -> Option<f64> {
    (mhz > 0).then(|| mhz as f64 / 1000.0)
}

fn resolve_host_ip(host: &str) -> Option<String> {
    let addrs: Vec<_> = (host, 0).to_socket_addrs().ok()?.collect();
    addrs
        .iter()
        .find(|addr| addr.is_ipv4())
        .or_else(|| addrs.first())
        .map(|addr| addr.ip().to_string())
}

fn first_mac_address() -> Option<String> {
    let networks = Networks::new_with_refreshed_list();
    let mut candidates: Vec<(&String, String)> = networks
        .iter()
        .filter(|(_, data)| data.mac_address().0 != [0u8; 6])
        .map(|(name, data)| (name, data.mac_address().to_string()))
        .collect();
    candidates.sort_by(|a, b| a.0.cmp(b.0));
    candidates.into_iter().next().map(|(_, mac)| mac)
}

fn current_user() -> Option<String> {
    ["USER", "LOGNAME", "USERNAME"]
        .iter()
        .find_map(|key| std::env::var(key).ok().filter(|v| !v.is_empty()))
}
