#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]

use parking_lot::RwLock;
use prometheus::IntGauge;
use std::hint::black_box;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

use crate::metrics::Metrics;

/// Length of one duty-cycle slice.
pub const SLICE: Duration = Duration::from_millis(50);

/// Iterations of busy arithmetic between clock reads.
const SPIN_BATCH: u64 = 4096;

#[derive(Debug, Error)]
pub enum CpuLoadError {
    #[error("no cpu workers available")]
    NoWorkers,
    #[error("spawn cpu worker {index}: {source}")]
    Spawn {
        index: usize,
        #[source]
        source: std::io::Error,
    },
    #[error("{0} cpu worker(s) panicked")]
    WorkerPanicked(usize),
    #[error("blocking pool: {0}")]
    Blocking(String),
    #[error("duration of {0:?} overflows the clock")]
    DurationOverflow(Duration),
}

/// What one cpu phase actually consumed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CpuReport {
    pub workers: usize,
    pub elapsed: Duration,
    /// Busy time summed over all workers.
    pub busy: Duration,
}

impl CpuReport {
    pub fn idle() -> Self {
        Self {
            workers: 0,
            elapsed: Duration::ZERO,
            busy: Duration::ZERO,
        }
    }

    /// Fraction of the workers' wall-clock capacity spent spinning.
    #[allow(clippy::cast_precision_loss)]
    pub fn busy_fraction(&self) -> f64 {
        let capacity = self.elapsed.as_secs_f64() * self.workers as f64;
        if capacity <= 0.0 {
            0.0
        } else {
            (self.busy.as_secs_f64() / capacity).min(1.0)
        }
    }
}

/// Shared time base for every worker of one phase. Slices are aligned to
/// `origin` so all workers go busy and idle together.
#[derive(Clone, Copy, Debug)]
struct SliceClock {
    origin: Instant,
    slice: Duration,
    deadline: Instant,
    target_load: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Window {
    busy_until: Instant,
    end: Instant,
}

impl SliceClock {
    fn window(&self, now: Instant) -> Option<Window> {
        if now >= self.deadline {
            return None;
        }
        let slice_nanos = self.slice.as_nanos().max(1);
        let into_slice = now.saturating_duration_since(self.origin).as_nanos() % slice_nanos;
        // remainder is below one slice, so it fits in u64
        #[allow(clippy::cast_possible_truncation)]
        let slice_start = now - Duration::from_nanos(into_slice as u64);
        let end = (slice_start + self.slice).min(self.deadline);
        let busy_until = (slice_start + self.slice.mul_f64(self.target_load)).min(end);
        Some(Window { busy_until, end })
    }
}

#[derive(Clone)]
pub struct CpuLoadGenerator {
    workers: usize,
    slice: Duration,
    metrics: Metrics,
}

impl CpuLoadGenerator {
    pub fn new(workers: Option<usize>, metrics: Metrics) -> Self {
        Self {
            workers: workers.unwrap_or_else(available_workers),
            slice: SLICE,
            metrics,
        }
    }

    #[must_use]
    pub fn with_slice(mut self, slice: Duration) -> Self {
        self.slice = slice;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Duty-cycles every worker at `target_load` until `duration` has
    /// elapsed. Blocks the calling thread.
    pub fn run(&self, duration: Duration, target_load: f64) -> Result<CpuReport, CpuLoadError> {
        if duration.is_zero() {
            return Ok(CpuReport::idle());
        }
        if self.workers == 0 {
            return Err(CpuLoadError::NoWorkers);
        }
        if Instant::now().checked_add(duration).is_none() {
            return Err(CpuLoadError::DurationOverflow(duration));
        }
        let target_load = if target_load.is_finite() {
            target_load.clamp(0.0, 1.0)
        } else {
            0.0
        };

        // Workers block on the read side until the clock is published.
        let gate: Arc<RwLock<Option<SliceClock>>> = Arc::new(RwLock::new(None));
        let mut guard = gate.write();
        let mut handles = Vec::with_capacity(self.workers);
        let mut spawn_error = None;
        for index in 0..self.workers {
            let gate = Arc::clone(&gate);
            let active = self.metrics.cpu_workers_active.clone();
            let spawned = thread::Builder::new()
                .name(format!("cpu-load-{index}"))
                .spawn(move || {
                    let Some(clock) = *gate.read() else {
                        return Duration::ZERO;
                    };
                    let _active = ActiveWorker::enter(&active);
                    duty_cycle(clock)
                });
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(source) => {
                    spawn_error = Some(CpuLoadError::Spawn { index, source });
                    break;
                }
            }
        }
        let origin = Instant::now();
        if spawn_error.is_none() {
            match origin.checked_add(duration) {
                Some(deadline) => {
                    *guard = Some(SliceClock {
                        origin,
                        slice: self.slice,
                        deadline,
                        target_load,
                    });
                }
                None => spawn_error = Some(CpuLoadError::DurationOverflow(duration)),
            }
        }
        drop(guard);
        debug!(
            workers = handles.len(),
            target_load,
            duration_s = duration.as_secs_f64(),
            "cpu workers released"
        );

        let mut busy = Duration::ZERO;
        let mut panicked = 0usize;
        for handle in handles {
            match handle.join() {
                Ok(worker_busy) => busy += worker_busy,
                Err(_) => panicked += 1,
            }
        }
        let elapsed = origin.elapsed();

        if let Some(err) = spawn_error {
            return Err(err);
        }
        if panicked > 0 {
            return Err(CpuLoadError::WorkerPanicked(panicked));
        }
        Ok(CpuReport {
            workers: self.workers,
            elapsed,
            busy,
        })
    }
}

pub fn available_workers() -> usize {
    match thread::available_parallelism() {
        Ok(n) => n.get(),
        Err(e) => {
            warn!(error = %e, "available_parallelism unknown, using one cpu worker");
            1
        }
    }
}

/// Counts a duty-cycle thread as active until it exits or unwinds.
struct ActiveWorker(IntGauge);

impl ActiveWorker {
    fn enter(gauge: &IntGauge) -> Self {
        gauge.inc();
        Self(gauge.clone())
    }
}

impl Drop for ActiveWorker {
    fn drop(&mut self) {
        self.0.dec();
    }
}

fn duty_cycle(clock: SliceClock) -> Duration {
    let mut busy = Duration::ZERO;
    while let Some(window) = clock.window(Instant::now()) {
        if Instant::now() < window.busy_until {
            busy += spin_until(window.busy_until);
        }
        let now = Instant::now();
        if now < window.end {
            thread::sleep(window.end - now);
        }
    }
    busy
}

fn spin_until(until: Instant) -> Duration {
    let started = Instant::now();
    let mut acc: u64 = 0x9E37_79B9_7F4A_7C15;
    while Instant::now() < until {
        for i in 0..SPIN_BATCH {
            acc = black_box(acc.rotate_left(5) ^ i).wrapping_mul(0x0100_0000_01B3);
        }
    }
    black_box(acc);
    started.elapsed()
}
