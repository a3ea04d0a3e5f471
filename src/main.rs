#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]

use anyhow::Context;
use microapp::{serve, AppConfig, AppState};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt = tracing_subscriber::fmt().with_env_filter(filter);
    fmt.json().init();
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let config = AppConfig::from_env().context("load config")?;
    if config.uses_default_secret() {
        warn!("APP_SECRET_TOKEN not set, using the default secret token");
    }
    let state = AppState::from_config(config).context("init state")?;
    info!(
        worker = %state.identity.worker_id,
        port = state.config.port,
        cpu_workers = state.cpu.workers(),
        "initializing service"
    );
    serve(state).await.context("http server")?;
    Ok(())
}
