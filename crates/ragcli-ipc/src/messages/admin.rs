use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::null_as_default;
use super::sources::SourceRecord;

/// Body of a `/v1/admin/health` request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthRequest {
    /// Trace identifier; filled in by the client when blank.
    pub trace_id: String,
}

/// Aggregated backend health.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSummary {
    /// Worst status across all components.
    pub overall_status: String,
    /// Trace identifier of the check.
    #[serde(default, deserialize_with = "null_as_default")]
    pub trace_id: String,
    /// One entry per component.
    #[serde(default, deserialize_with = "null_as_default")]
    pub results: Vec<HealthResult>,
}

/// Health of a single component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResult {
    /// Component name, for example `disk_capacity`.
    pub component: String,
    /// `pass`, `warn` or `fail`.
    pub status: String,
    /// Human-readable detail.
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: String,
    /// Suggested fix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
    /// Numeric measurements backing the status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<BTreeMap<String, f64>>,
}

/// Body of a `/v1/admin/init` request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitRequest {
    /// Trace identifier; filled in by the client when blank.
    pub trace_id: String,
}

/// Result of first-run initialisation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitResponse {
    /// Catalog version after initialisation.
    #[serde(default, deserialize_with = "null_as_default")]
    pub catalog_version: u64,
    /// Directories created by this run.
    #[serde(default, deserialize_with = "null_as_default")]
    pub created_directories: Vec<String>,
    /// Sources added to the catalog by this run.
    #[serde(default, deserialize_with = "null_as_default")]
    pub seeded_sources: Vec<SourceRecord>,
    /// Host tools the backend depends on.
    #[serde(default, deserialize_with = "null_as_default")]
    pub dependency_checks: Vec<DependencyCheck>,
    /// Trace identifier of the run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
}

/// Availability of one host dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyCheck {
    /// Dependency name.
    pub name: String,
    /// `pass`, `warn` or `fail`.
    pub status: String,
    /// Human-readable detail.
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: String,
    /// Suggested fix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
}
