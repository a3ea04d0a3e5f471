#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]

use anyhow::{Context, Result as AnyResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::sync::Arc;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::host::HostMonitor;
use crate::lib_cpu::CpuLoadGenerator;
use crate::lib_mem::SampleBlock;
use crate::metrics::Metrics;

pub const APP_ID: &str = "microapp";
pub const APP_NAME: &str = "Micro Application";
pub const APP_DESCRIPTION: &str = "Synthetic workload and health-probe service for testing.";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const FORMAT_UTC_DATETIME: &str = "%Y-%m-%dT%H:%M:%SZ";

pub fn format_utc(ts: &DateTime<Utc>) -> String {
    ts.format(FORMAT_UTC_DATETIME).to_string()
}

pub fn serialize_utc<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(&ts.format(FORMAT_UTC_DATETIME))
}

/// Identity of this process. Created once at startup, never mutated.
#[derive(Clone, Debug)]
pub struct WorkerIdentity {
    pub worker_id: String,
    pub started_at: DateTime<Utc>,
    pub version: String,
}

impl WorkerIdentity {
    pub fn generate(version: &str) -> Self {
        let mut worker_id = Uuid::new_v4().simple().to_string();
        worker_id.truncate(8);
        Self {
            worker_id,
            started_at: Utc::now(),
            version: version.to_string(),
        }
    }
}

#[derive(Clone, Deserialize, Serialize)]
pub struct LoadJobRequest {
    pub secret_token: String,
    pub handle_id: String,
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
    pub duration_s: u64,
    #[serde(default)]
    pub target_load: Option<f64>,
    #[serde(default)]
    pub memory_mb: Option<i64>,
}

impl std::fmt::Debug for LoadJobRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadJobRequest")
            .field("secret_token", &"<redacted>")
            .field("handle_id", &self.handle_id)
            .field("metadata", &self.metadata)
            .field("duration_s", &self.duration_s)
            .field("target_load", &self.target_load)
            .field("memory_mb", &self.memory_mb)
            .finish()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LoadParams {
    pub duration_s: u64,
    pub target_load: f64,
    pub memory_mb: u32,
}

/// Request-level status. Sub-phase outcomes are reported separately.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Ok,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseOutcome {
    Done,
    Failed,
}

impl std::fmt::Display for PhaseOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PhaseOutcome::Done => f.write_str("done"),
            PhaseOutcome::Failed => f.write_str("failed"),
        }
    }
}

/// Steps of one load job, in order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobPhase {
    Received,
    Authenticated,
    MemoryLoaded,
    CpuLoaded,
    Completed,
}

impl std::fmt::Display for JobPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobPhase::Received => "received",
            JobPhase::Authenticated => "authenticated",
            JobPhase::MemoryLoaded => "memory_loaded",
            JobPhase::CpuLoaded => "cpu_loaded",
            JobPhase::Completed => "completed",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct LoadJobResult {
    pub job_id: String,
    pub worker_id: String,
    pub version: String,
    pub handle_id: String,
    pub metadata: Option<Map<String, Value>>,
    pub params: LoadParams,
    #[serde(serialize_with = "serialize_utc")]
    pub started_at: DateTime<Utc>,
    pub status: JobStatus,
    pub memory_used_mb: f64,
    pub memory_result: PhaseOutcome,
    pub cpu_result: PhaseOutcome,
    pub cpu_busy_perc: Option<f64>,
    pub time_taken_ms: f64,
}

#[derive(Clone)]
pub struct AppState {
    pub identity: Arc<WorkerIdentity>,
    pub config: Arc<AppConfig>,
    pub metrics: Metrics,
    pub host: HostMonitor,
    pub sample: SampleBlock,
    pub cpu: CpuLoadGenerator,
}

impl AppState {
    pub fn new(config: AppConfig, sample: SampleBlock) -> AnyResult<Self> {
        let metrics = Metrics::new().context("metrics init")?;
        let host = HostMonitor::new(&config).context("host monitor init")?;
        let cpu = CpuLoadGenerator::new(config.cpu_workers, metrics.clone());
        Ok(Self {
            identity: Arc::new(WorkerIdentity::generate(VERSION)),
            config: Arc::new(config),
            metrics,
            host,
            sample,
            cpu,
        })
    }

    pub fn from_config(config: AppConfig) -> AnyResult<Self> {
        let sample = SampleBlock::load_or_synthesize(&config.sample_file);
        Self::new(config, sample)
    }
}
