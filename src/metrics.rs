#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]

use anyhow::{Context, Result as AnyResult};
use prometheus::{Encoder, IntCounter, IntGauge, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    pub registry: Registry,
    pub load_jobs_active: IntGauge,
    pub load_jobs_total: IntCounter,
    pub auth_failures_total: IntCounter,
    pub cpu_workers_active: IntGauge,
    pub cpu_load_failures_total: IntCounter,
    pub memory_load_bytes: IntGauge,
}

impl Metrics {
    pub fn new() -> AnyResult<Self> {
        let registry = Registry::new();
        let load_jobs_active = register_gauge(
            &registry,
            "microapp_load_jobs_active",
            "load jobs currently running",
        )?;
        let load_jobs_total = register_counter(
            &registry,
            "microapp_load_jobs_total",
            "authenticated load jobs started",
        )?;
        let auth_failures_total = register_counter(
            &registry,
            "microapp_auth_failures_total",
            "load-test requests rejected for a bad token",
        )?;
        let cpu_workers_active = register_gauge(
            &registry,
            "microapp_cpu_workers_active",
            "duty-cycle threads currently running",
        )?;
        let cpu_load_failures_total = register_counter(
            &registry,
            "microapp_cpu_load_failures_total",
            "cpu phases that reported failed",
        )?;
        let memory_load_bytes = register_gauge(
            &registry,
            "microapp_memory_load_bytes",
            "bytes held by in-flight memory loads",
        )?;
        Ok(Self {
            registry,
            load_jobs_active,
            load_jobs_total,
            auth_failures_total,
            cpu_workers_active,
            cpu_load_failures_total,
            memory_load_bytes,
        })
    }

    pub fn encode_text(&self) -> AnyResult<Vec<u8>> {
        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        let mf = self.registry.gather();
        encoder.encode(&mf, &mut buf).context("encode metrics")?;
        Ok(buf)
    }
}

fn register_gauge(registry: &Registry, name: &str, help: &str) -> AnyResult<IntGauge> {
    let gauge =
        IntGauge::with_opts(Opts::new(name, help)).with_context(|| format!("create {name}"))?;
    registry
        .register(Box::new(gauge.clone()))
        .with_context(|| format!("register {name}"))?;
    Ok(gauge)
}

fn register_counter(registry: &Registry, name: &str, help: &str) -> AnyResult<IntCounter> {
    let counter =
        IntCounter::with_opts(Opts::new(name, help)).with_context(|| format!("create {name}"))?;
    registry
        .register(Box::new(counter.clone()))
        .with_context(|| format!("register {name}"))?;
    Ok(counter)
}
