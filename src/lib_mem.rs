#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]

use prometheus::IntGauge;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::metrics::Metrics;

/// Nominal size of the sample block, in MB.
pub const SAMPLE_FILE_SIZE_MB: u32 = 1;

const BYTES_PER_MB: usize = 1024 * 1024;

#[derive(Debug, Error)]
pub enum MemoryLoadError {
    #[error("reserve {bytes} bytes: {source}")]
    Allocation {
        bytes: usize,
        #[source]
        source: std::collections::TryReserveError,
    },
}

/// Seed content repeated to build a memory load. Read once, shared by all
/// jobs.
#[derive(Clone, Debug)]
pub struct SampleBlock(Arc<[u8]>);

impl SampleBlock {
    pub fn from_bytes(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self(bytes.into())
    }

    /// Reads the sample file, or synthesises a block of the nominal size
    /// when it cannot be read.
    pub fn load_or_synthesize(path: &Path) -> Self {
        match std::fs::read(path) {
            Ok(bytes) if !bytes.is_empty() => {
                let nominal = SAMPLE_FILE_SIZE_MB as usize * BYTES_PER_MB;
                if bytes.len() != nominal {
                    warn!(
                        path = %path.display(),
                        bytes = bytes.len(),
                        nominal,
                        "sample file size differs from nominal size"
                    );
                }
                info!(path = %path.display(), bytes = bytes.len(), "sample block loaded");
                Self::from_bytes(bytes)
            }
            Ok(_) => {
                warn!(path = %path.display(), "sample file is empty, synthesizing block");
                Self::synthesize()
            }
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "sample file unreadable, synthesizing block"
                );
                Self::synthesize()
            }
        }
    }

    /// Deterministic text block of exactly `SAMPLE_FILE_SIZE_MB`.
    pub fn synthesize() -> Self {
        const LINE: &[u8] =
            b"microapp sample data: the quick brown fox jumps over the lazy dog 0123456789\n";
        let size = SAMPLE_FILE_SIZE_MB as usize * BYTES_PER_MB;
        let bytes: Vec<u8> = LINE.iter().copied().cycle().take(size).collect();
        Self::from_bytes(bytes)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Number of block copies a request for `memory_mb` holds.
pub fn repeats_for(memory_mb: u32) -> usize {
    (memory_mb / SAMPLE_FILE_SIZE_MB) as usize
}

/// A buffer held for the lifetime of one job. Dropping it releases the
/// memory.
pub struct MemoryLoad {
    buf: Vec<u8>,
    accounted: i64,
    gauge: IntGauge,
}

impl MemoryLoad {
    pub fn allocate(
        block: &SampleBlock,
        memory_mb: u32,
        metrics: &Metrics,
    ) -> Result<Self, MemoryLoadError> {
        let repeats = repeats_for(memory_mb);
        let bytes = block.len().saturating_mul(repeats);
        let mut buf = Vec::new();
        buf.try_reserve_exact(bytes)
            .map_err(|source| MemoryLoadError::Allocation { bytes, source })?;
        for _ in 0..repeats {
            buf.extend_from_slice(block.as_bytes());
        }
        let load = Self {
            accounted: i64::try_from(buf.capacity()).unwrap_or(i64::MAX),
            buf,
            gauge: metrics.memory_load_bytes.clone(),
        };
        load.gauge.add(load.accounted);
        debug!(memory_mb, repeats, bytes = load.used_bytes(), "memory load allocated");
        Ok(load)
    }

    /// Measured footprint: the buffer's allocation plus its header.
    pub fn used_bytes(&self) -> usize {
        self.buf.capacity() + std::mem::size_of::<Vec<u8>>()
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn used_mb(&self) -> f64 {
        self.used_bytes() as f64 / BYTES_PER_MB as f64
    }
}

impl Drop for MemoryLoad {
    fn drop(&mut self) {
        self.gauge.sub(self.accounted);
        debug!(bytes = self.used_bytes(), "memory load released");
    }
}
