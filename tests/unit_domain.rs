#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]

use chrono::{TimeZone, Utc};
use microapp::domain::{
    format_utc, JobStatus, LoadJobRequest, LoadJobResult, LoadParams, PhaseOutcome,
    WorkerIdentity,
};
use serde_json::json;

#[test]
fn worker_id_is_short_and_unique() {
    let a = WorkerIdentity::generate("1.0.0");
    let b = WorkerIdentity::generate("1.0.0");
    assert_eq!(a.worker_id.len(), 8);
    assert!(a.worker_id.chars().all(|c| c.is_ascii_hexdigit()));
    assert_ne!(a.worker_id, b.worker_id);
    assert_eq!(a.version, "1.0.0");
}

#[test]
fn request_optional_fields_default() {
    let req: LoadJobRequest = serde_json::from_value(json!({
        "secret_token": "secret",
        "handle_id": "t1",
        "duration_s": 2
    }))
    .expect("parse");
    assert!(req.metadata.is_none());
    assert!(req.target_load.is_none());
    assert!(req.memory_mb.is_none());
}

#[test]
fn request_rejects_negative_duration() {
    let res: Result<LoadJobRequest, _> = serde_json::from_value(json!({
        "secret_token": "secret",
        "handle_id": "t1",
        "duration_s": -1
    }));
    assert!(res.is_err());
}

#[test]
fn request_debug_hides_token() {
    let req: LoadJobRequest = serde_json::from_value(json!({
        "secret_token": "hunter2",
        "handle_id": "t1",
        "duration_s": 0
    }))
    .expect("parse");
    assert!(!format!("{req:?}").contains("hunter2"));
}

#[test]
fn result_serializes_two_tier_status() {
    let started_at = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();
    let result = LoadJobResult {
        job_id: "abc".into(),
        worker_id: "w1".into(),
        version: "0.1.0".into(),
        handle_id: "t1".into(),
        metadata: None,
        params: LoadParams {
            duration_s: 1,
            target_load: 0.2,
            memory_mb: 5,
        },
        started_at,
        status: JobStatus::Ok,
        memory_used_mb: 5.0,
        memory_result: PhaseOutcome::Done,
        cpu_result: PhaseOutcome::Failed,
        cpu_busy_perc: None,
        time_taken_ms: 12.5,
    };
    let v = serde_json::to_value(&result).expect("json");
    assert_eq!(v["status"], "ok");
    assert_eq!(v["cpu_result"], "failed");
    assert_eq!(v["memory_result"], "done");
    assert_eq!(v["started_at"], "2024-05-06T07:08:09Z");
    assert_eq!(v["params"]["memory_mb"], 5);
    assert!(v["metadata"].is_null());
    assert!(v["cpu_busy_perc"].is_null());
}

#[test]
fn utc_format_has_second_precision() {
    let ts = Utc.with_ymd_and_hms(2023, 1, 2, 3, 4, 5).unwrap();
    assert_eq!(format_utc(&ts), "2023-01-02T03:04:05Z");
    assert_eq!(PhaseOutcome::Done.to_string(), "done");
}
