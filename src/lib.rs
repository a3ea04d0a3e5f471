#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod domain;
pub mod host;
pub mod http;
pub mod lib_cpu;
pub mod lib_mem;
pub mod metrics;
pub mod service;
pub mod validation;

pub use config::AppConfig;
pub use domain::{AppState, LoadJobRequest, LoadJobResult, PhaseOutcome, WorkerIdentity};
pub use http::serve;
pub use http::{health, index, load_test, routes, scrape_metrics};
pub use metrics::Metrics;
pub use service::LoadJobRunner;
pub use validation::{authenticate, clamp_params};
