#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]

use actix_web::web;
use chrono::Utc;
use prometheus::IntGauge;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::domain::{
    AppState, JobPhase, JobStatus, LoadJobRequest, LoadJobResult, LoadParams, PhaseOutcome,
};
use crate::lib_cpu::{CpuLoadError, CpuReport};
use crate::lib_mem::MemoryLoad;
use crate::validation::{authenticate, clamp_params, AuthError};

/// Runs load jobs against the shared application state.
#[derive(Clone)]
pub struct LoadJobRunner {
    state: AppState,
}

impl LoadJobRunner {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Runs one job to completion. Only authentication can fail the call;
    /// sub-phase failures are reported inside the result.
    pub async fn run(&self, req: LoadJobRequest) -> Result<LoadJobResult, AuthError> {
        debug!(handle = %req.handle_id, phase = %JobPhase::Received, "load job");
        if let Err(e) = authenticate(&req.secret_token, &self.state.config.secret_token) {
            self.state.metrics.auth_failures_total.inc();
            warn!(handle = %req.handle_id, "load job rejected: bad secret token");
            return Err(e);
        }

        let started = Instant::now();
        let started_at = Utc::now();
        let job_id = Uuid::new_v4().simple().to_string();
        let params = clamp_params(&req);
        let _active = ActiveJob::enter(&self.state.metrics.load_jobs_active);
        self.state.metrics.load_jobs_total.inc();
        debug!(job = %job_id, phase = %JobPhase::Authenticated, "load job");
        info!(
            job = %job_id,
            handle = %req.handle_id,
            duration_s = params.duration_s,
            target_load = params.target_load,
            memory_mb = params.memory_mb,
            "load job started"
        );

        // Held until the end of this function, whatever the cpu phase does.
        let allocated =
            MemoryLoad::allocate(&self.state.sample, params.memory_mb, &self.state.metrics);
        let memory = match allocated {
            Ok(load) => Some(load),
            Err(e) => {
                error!(job = %job_id, error = %e, "memory load failed");
                None
            }
        };
        let (memory_used_mb, memory_result) = match &memory {
            Some(load) => (load.used_mb(), PhaseOutcome::Done),
            None => (0.0, PhaseOutcome::Failed),
        };
        debug!(job = %job_id, phase = %JobPhase::MemoryLoaded, memory_used_mb, "load job");

        let (cpu_result, cpu_busy_perc) = match self.run_cpu(&params).await {
            Ok(report) => {
                debug!(
                    job = %job_id,
                    workers = report.workers,
                    busy_fraction = report.busy_fraction(),
                    "cpu phase finished"
                );
                (PhaseOutcome::Done, Some(report.busy_fraction() * 100.0))
            }
            Err(e) => {
                self.state.metrics.cpu_load_failures_total.inc();
                warn!(job = %job_id, error = %e, "cpu load failed");
                (PhaseOutcome::Failed, None)
            }
        };
        debug!(job = %job_id, phase = %JobPhase::CpuLoaded, %cpu_result, "load job");

        let mut result = LoadJobResult {
            job_id,
            worker_id: self.state.identity.worker_id.clone(),
            version: self.state.identity.version.clone(),
            handle_id: req.handle_id,
            metadata: req.metadata,
            params,
            started_at,
            status: JobStatus::Ok,
            memory_used_mb,
            memory_result,
            cpu_result,
            cpu_busy_perc,
            time_taken_ms: 0.0,
        };
        result.time_taken_ms = started.elapsed().as_secs_f64() * 1000.0;
        drop(memory);

        info!(
            job = %result.job_id,
            handle = %result.handle_id,
            %memory_result,
            %cpu_result,
            time_taken_ms = result.time_taken_ms,
            "load job finished"
        );
        debug!(job = %result.job_id, phase = %JobPhase::Completed, "load job");
        Ok(result)
    }

    async fn run_cpu(&self, params: &LoadParams) -> Result<CpuReport, CpuLoadError> {
        let cpu = self.state.cpu.clone();
        let duration = Duration::from_secs(params.duration_s);
        let target_load = params.target_load;
        web::block(move || cpu.run(duration, target_load))
            .await
            .map_err(|e| CpuLoadError::Blocking(e.to_string()))?
    }
}

/// Keeps the active-jobs gauge honest even if the request future is dropped.
struct ActiveJob(IntGauge);

impl ActiveJob {
    fn enter(gauge: &IntGauge) -> Self {
        gauge.inc();
        Self(gauge.clone())
    }
}

impl Drop for ActiveJob {
    fn drop(&mut self) {
        self.0.dec();
    }
}
