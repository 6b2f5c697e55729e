//! Shared helpers for transport tests.

mod fake_backend;

use serde_json::{Value, json};

pub(crate) use fake_backend::{AckMode, FakeBackend, Step};

/// A `{"job": {...}}` body with the given status and progress.
pub(crate) fn job_body(status: &str, stage: &str, percent: f64, documents: u64) -> Value {
    json!({"job": {
        "job_id": "job-42",
        "source_alias": null,
        "status": status,
        "stage": stage,
        "percent_complete": percent,
        "documents_processed": documents,
        "requested_at": "2025-01-01T00:00:00Z",
        "trigger": "manual",
    }})
}

/// A health summary body.
pub(crate) fn health_body(trace_id: Option<&str>) -> Value {
    let mut body = json!({
        "overall_status": "warn",
        "results": [
            {"component": "disk_capacity", "status": "warn", "message": "82% used",
             "remediation": "free space", "metrics": {"used_ratio": 0.82}},
            {"component": "index_freshness", "status": "pass", "message": "ok"},
        ],
    });
    if let (Some(trace), Some(object)) = (trace_id, body.as_object_mut()) {
        object.insert(String::from("trace_id"), json!(trace));
    }
    body
}

/// A three-step successful reindex script: queued, running, succeeded.
pub(crate) fn reindex_script() -> Vec<Step> {
    vec![
        Step::Reply(202, job_body("queued", "queued", 0.0, 0)),
        Step::Event(202, job_body("running", "chunking", 45.0, 12)),
        Step::Event(200, job_body("succeeded", "completed", 100.0, 30)),
    ]
}
