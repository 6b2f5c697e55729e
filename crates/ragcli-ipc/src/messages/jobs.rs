use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::null_as_default;
use crate::error::IpcError;

/// Lifecycle state of an ingestion job.
///
/// Parsing is lenient: case and surrounding whitespace are ignored, a blank
/// status reads as [`JobStatus::Running`], and unknown values are kept
/// verbatim as non-terminal [`JobStatus::Other`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JobStatus {
    /// Waiting for a worker.
    Queued,
    /// In progress.
    #[default]
    Running,
    /// Finished without error.
    Succeeded,
    /// Finished with an error.
    Failed,
    /// Stopped before finishing.
    Cancelled,
    /// A status this client does not know.
    Other(String),
}

impl JobStatus {
    /// Parses a raw status string.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "running" => Self::Running,
            "queued" => Self::Queued,
            "succeeded" => Self::Succeeded,
            "failed" => Self::Failed,
            "cancelled" | "canceled" => Self::Cancelled,
            other => Self::Other(other.to_owned()),
        }
    }

    /// `true` for `succeeded`, `failed`, and `cancelled`.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }

    /// Wire spelling of the status.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Other(raw) => raw,
        }
    }
}

impl From<String> for JobStatus {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<JobStatus> for String {
    fn from(status: JobStatus) -> Self {
        status.as_str().to_owned()
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Snapshot of an ingestion job. Each snapshot supersedes earlier ones for
/// the same `job_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionJob {
    /// Backend job identifier.
    pub job_id: String,
    /// Source being ingested; absent when the job covers every source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_alias: Option<String>,
    /// Raw reported status.
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: JobStatus,
    /// Current pipeline stage.
    #[serde(default, deserialize_with = "null_as_default")]
    pub stage: String,
    /// Completion estimate between 0 and 100.
    #[serde(default)]
    pub percent_complete: Option<f64>,
    /// Documents handled so far.
    #[serde(default, deserialize_with = "null_as_default")]
    pub documents_processed: u64,
    /// When the job was requested.
    #[serde(default, deserialize_with = "null_as_default")]
    pub requested_at: String,
    /// When a worker picked the job up.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    /// When the job reached a terminal state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    /// Failure description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// What started the job.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<String>,
}

impl IngestionJob {
    /// Status after normalisation: a `succeeded` job that still reports an
    /// error message counts as `failed`.
    #[must_use]
    pub fn normalized_status(&self) -> JobStatus {
        match self.status {
            JobStatus::Succeeded if self.error().is_some() => JobStatus::Failed,
            ref status => status.clone(),
        }
    }

    /// `true` once the normalised status is terminal.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.normalized_status().is_terminal()
    }

    /// Trimmed error message, when one is present.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error_message
            .as_deref()
            .map(str::trim)
            .filter(|message| !message.is_empty())
    }

    /// Source alias, or `*` when the job covers every source.
    #[must_use]
    pub fn target(&self) -> &str {
        self.source_alias
            .as_deref()
            .map(str::trim)
            .filter(|alias| !alias.is_empty())
            .unwrap_or("*")
    }

    /// Completion rounded to a whole percentage and clamped to 0..=100.
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "value is clamped to 0..=100 and rounded before the cast"
    )]
    pub fn percent(&self) -> Option<u8> {
        self.percent_complete
            .filter(|value| value.is_finite())
            .map(|value| value.clamp(0.0, 100.0).round() as u8)
    }

    /// Converts a terminal `failed` or `cancelled` snapshot into
    /// [`IpcError::JobFailed`]; other snapshots pass through.
    pub fn into_outcome(self) -> Result<Self, IpcError> {
        match self.normalized_status() {
            JobStatus::Failed | JobStatus::Cancelled => Err(IpcError::JobFailed {
                job: Box::new(self),
            }),
            _ => Ok(self),
        }
    }
}

/// `{"job": {...}}` wrapper used by job-returning routes.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct JobEnvelope {
    pub(crate) job: IngestionJob,
}

/// What caused a reindex.
///
/// Parsing is case-insensitive and ignores surrounding whitespace. A blank
/// string parses as [`ReindexTrigger::Manual`], so an empty `--trigger`
/// behaves like omitting the flag; any other unknown spelling is rejected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReindexTrigger {
    /// An operator asked for it.
    #[default]
    Manual,
    /// First-run initialisation.
    Init,
    /// A timer.
    Scheduled,
}

impl ReindexTrigger {
    /// Wire spelling of the trigger.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Init => "init",
            Self::Scheduled => "scheduled",
        }
    }
}

impl FromStr for ReindexTrigger {
    type Err = IpcError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_ascii_lowercase().as_str() {
            "" | "manual" => Ok(Self::Manual),
            "init" => Ok(Self::Init),
            "scheduled" => Ok(Self::Scheduled),
            _ => Err(IpcError::InvalidArgument(format!(
                "unsupported trigger {:?} (expected manual|init|scheduled)",
                input.trim()
            ))),
        }
    }
}

impl fmt::Display for ReindexTrigger {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Body of a `/v1/index/reindex` request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReindexRequest {
    /// Trace identifier; filled in by the client when blank.
    pub trace_id: String,
    /// Why the rebuild was requested.
    pub trigger: ReindexTrigger,
    /// Rebuild even when source checksums are unchanged.
    #[serde(skip_serializing_if = "is_false")]
    pub force: bool,
}

impl ReindexRequest {
    /// Builds a request from a user-supplied trigger string.
    pub fn with_trigger(trigger: &str) -> Result<Self, IpcError> {
        Ok(Self {
            trigger: trigger.parse()?,
            ..Self::default()
        })
    }
}

#[expect(
    clippy::trivially_copy_pass_by_ref,
    reason = "serde's skip_serializing_if passes a reference"
)]
fn is_false(value: &bool) -> bool {
    !*value
}
