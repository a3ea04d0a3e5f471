#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]

use thiserror::Error;

use crate::domain::{LoadJobRequest, LoadParams};

pub const MEMORY_MB_MIN: u32 = 1;
pub const MEMORY_MB_MAX: u32 = 1000;
pub const DEFAULT_MEMORY_MB: i64 = 1;
pub const DEFAULT_TARGET_LOAD: f64 = 0.2;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Authentication Failed! Please provide a valid secret token.")]
pub struct AuthError;

pub fn authenticate(supplied: &str, expected: &str) -> Result<(), AuthError> {
    if supplied == expected {
        Ok(())
    } else {
        Err(AuthError)
    }
}

pub fn clamp_memory_mb(requested: i64) -> u32 {
    let clamped = requested.clamp(i64::from(MEMORY_MB_MIN), i64::from(MEMORY_MB_MAX));
    u32::try_from(clamped).unwrap_or(MEMORY_MB_MIN)
}

pub fn clamp_target_load(requested: f64) -> f64 {
    if requested.is_finite() {
        requested.clamp(0.0, 1.0)
    } else {
        DEFAULT_TARGET_LOAD
    }
}

/// Parameters a job actually runs with. `duration_s` passes through.
pub fn clamp_params(req: &LoadJobRequest) -> LoadParams {
    LoadParams {
        duration_s: req.duration_s,
        target_load: clamp_target_load(req.target_load.unwrap_or(DEFAULT_TARGET_LOAD)),
        memory_mb: clamp_memory_mb(req.memory_mb.unwrap_or(DEFAULT_MEMORY_MB)),
    }
}
