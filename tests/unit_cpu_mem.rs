#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]

use microapp::lib_cpu::{CpuLoadError, CpuLoadGenerator};
use microapp::lib_mem::{repeats_for, MemoryLoad, SampleBlock, SAMPLE_FILE_SIZE_MB};
use microapp::metrics::Metrics;
use std::path::Path;
use std::time::{Duration, Instant};

fn generator(workers: usize) -> (CpuLoadGenerator, Metrics) {
    let m = Metrics::new().expect("metrics");
    (CpuLoadGenerator::new(Some(workers), m.clone()), m)
}

#[test]
fn cpu_zero_duration_is_noop() {
    let (gen, _) = generator(2);
    let started = Instant::now();
    let report = gen.run(Duration::ZERO, 0.5).expect("ok");
    assert_eq!(report.workers, 0);
    assert!(started.elapsed() < Duration::from_millis(50));
}

#[test]
fn cpu_returns_after_full_duration() {
    let (gen, m) = generator(2);
    let started = Instant::now();
    let report = gen.run(Duration::from_secs(1), 0.2).expect("ok");
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(1), "returned early: {elapsed:?}");
    assert!(elapsed < Duration::from_millis(1500), "overran: {elapsed:?}");
    assert_eq!(report.workers, 2);
    assert!(report.elapsed >= Duration::from_secs(1));
    assert_eq!(m.cpu_workers_active.get(), 0);
}

#[test]
fn cpu_busy_fraction_follows_target_load() {
    let (gen, _) = generator(2);
    let run = |load: f64| {
        gen.run(Duration::from_millis(600), load)
            .expect("ok")
            .busy_fraction()
    };
    let idle = run(0.0);
    let half = run(0.5);
    let full = run(1.0);
    assert!(idle < 0.05, "idle={idle}");
    assert!((0.3..0.75).contains(&half), "half={half}");
    assert!(full > 0.9, "full={full}");
    assert!(idle < half && half < full);
}

#[test]
fn cpu_short_slices_keep_deadline() {
    let (gen, _) = generator(1);
    let gen = gen.with_slice(Duration::from_millis(10));
    assert_eq!(gen.workers(), 1);
    let started = Instant::now();
    let report = gen.run(Duration::from_millis(300), 0.5).expect("ok");
    assert!(started.elapsed() >= Duration::from_millis(300));
    assert!(report.busy_fraction() > 0.2);
}

#[test]
fn cpu_without_workers_fails() {
    let (gen, _) = generator(0);
    let res = gen.run(Duration::from_millis(100), 0.5);
    assert!(matches!(res, Err(CpuLoadError::NoWorkers)));
}

#[test]
fn cpu_unbounded_duration_is_rejected() {
    let (gen, m) = generator(2);
    let started = Instant::now();
    let res = gen.run(Duration::from_secs(u64::MAX), 0.5);
    assert!(matches!(res, Err(CpuLoadError::DurationOverflow(_))));
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(m.cpu_workers_active.get(), 0);
}

#[test]
fn cpu_out_of_range_load_is_clamped() {
    let (gen, _) = generator(1);
    let report = gen.run(Duration::from_millis(200), 7.0).expect("ok");
    assert!(report.busy_fraction() <= 1.0);
}

#[test]
fn mem_footprint_is_monotonic() {
    let m = Metrics::new().expect("metrics");
    let block = SampleBlock::from_bytes(vec![b'x'; 1024]);
    let mut last = 0.0;
    for mb in [1, 2, 5, 10, 100, 1000] {
        let load = MemoryLoad::allocate(&block, mb, &m).expect("alloc");
        let used = load.used_mb();
        assert!(used >= 0.0);
        assert!(used >= last, "{mb} MB: {used} < {last}");
        last = used;
    }
}

#[test]
fn mem_measures_actual_size() {
    let m = Metrics::new().expect("metrics");
    let block = SampleBlock::synthesize();
    let load = MemoryLoad::allocate(&block, 3, &m).expect("alloc");
    assert!(load.used_mb() >= 3.0);
    assert!(load.used_mb() < 3.01);
}

#[test]
fn mem_below_block_size_is_near_zero() {
    let m = Metrics::new().expect("metrics");
    assert_eq!(repeats_for(SAMPLE_FILE_SIZE_MB - 1), 0);
    let load = MemoryLoad::allocate(&SampleBlock::synthesize(), 0, &m).expect("alloc");
    assert!(load.used_mb() < 0.001);
}

#[test]
fn mem_released_on_drop() {
    let m = Metrics::new().expect("metrics");
    let load = MemoryLoad::allocate(&SampleBlock::synthesize(), 2, &m).expect("alloc");
    assert!(m.memory_load_bytes.get() >= 2 * 1024 * 1024);
    drop(load);
    assert_eq!(m.memory_load_bytes.get(), 0);
}

#[test]
fn missing_sample_file_is_synthesized() {
    let block = SampleBlock::load_or_synthesize(Path::new("/nonexistent/sample_data.txt"));
    assert_eq!(block.len(), SAMPLE_FILE_SIZE_MB as usize * 1024 * 1024);
}
