use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::jobs::IngestionJob;
use super::{non_blank, null_as_default};
use crate::error::IpcError;

/// Catalog entry for a knowledge source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    /// Unique source alias.
    pub alias: String,
    /// Source kind as reported by the backend.
    #[serde(rename = "type", default)]
    pub source_type: String,
    /// Filesystem path or URL.
    #[serde(default, deserialize_with = "null_as_default")]
    pub location: String,
    /// Content language.
    #[serde(default, deserialize_with = "null_as_default")]
    pub language: String,
    /// Size on disk.
    #[serde(default, deserialize_with = "null_as_default")]
    pub size_bytes: u64,
    /// Last catalog change.
    #[serde(default, deserialize_with = "null_as_default")]
    pub last_updated: String,
    /// Catalog status.
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: String,
    /// Content checksum.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    /// Operator notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Kinds of source the backend can ingest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Manual pages.
    Man,
    /// Kiwix ZIM archives.
    Kiwix,
    /// GNU info documents.
    Info,
}

impl SourceKind {
    /// Wire spelling of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Man => "man",
            Self::Kiwix => "kiwix",
            Self::Info => "info",
        }
    }
}

impl FromStr for SourceKind {
    type Err = IpcError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_ascii_lowercase().as_str() {
            "man" => Ok(Self::Man),
            "kiwix" => Ok(Self::Kiwix),
            "info" => Ok(Self::Info),
            _ => Err(IpcError::InvalidArgument(format!(
                "unsupported source type {:?} (expected man|kiwix|info)",
                input.trim()
            ))),
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Catalog statuses an operator may set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    /// Waiting for validation.
    PendingValidation,
    /// Indexed and served.
    Active,
    /// Excluded from retrieval.
    Quarantined,
    /// Ingestion failed.
    Error,
}

impl SourceStatus {
    /// Wire spelling of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PendingValidation => "pending_validation",
            Self::Active => "active",
            Self::Quarantined => "quarantined",
            Self::Error => "error",
        }
    }
}

impl FromStr for SourceStatus {
    type Err = IpcError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_ascii_lowercase().as_str() {
            "pending_validation" => Ok(Self::PendingValidation),
            "active" => Ok(Self::Active),
            "quarantined" => Ok(Self::Quarantined),
            "error" => Ok(Self::Error),
            _ => Err(IpcError::InvalidArgument(format!(
                "unsupported status {:?} (expected pending_validation|active|quarantined|error)",
                input.trim()
            ))),
        }
    }
}

impl fmt::Display for SourceStatus {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Body of a catalog listing request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceListRequest {
    /// Trace identifier; filled in by the client when blank.
    pub trace_id: String,
}

/// Body of a source registration request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceCreateRequest {
    /// Trace identifier; filled in by the client when blank.
    pub trace_id: String,
    /// Requested alias; the backend derives one when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    /// Source kind.
    #[serde(rename = "type")]
    pub kind: SourceKind,
    /// Filesystem path or URL.
    pub location: String,
    /// Content language.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Operator notes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Expected content checksum.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

impl SourceCreateRequest {
    /// Builds a request for `kind` at `location`.
    #[must_use]
    pub fn new(kind: SourceKind, location: impl Into<String>) -> Self {
        Self {
            trace_id: String::new(),
            alias: None,
            kind,
            location: location.into(),
            language: None,
            notes: None,
            checksum: None,
        }
    }

    /// Trims every field, rejecting a blank location.
    pub fn normalized(self) -> Result<Self, IpcError> {
        let location = self.location.trim().to_owned();
        if location.is_empty() {
            return Err(IpcError::InvalidArgument(String::from(
                "source location is required",
            )));
        }
        Ok(Self {
            trace_id: self.trace_id.trim().to_owned(),
            alias: non_blank(self.alias),
            kind: self.kind,
            location,
            language: non_blank(self.language),
            notes: non_blank(self.notes),
            checksum: non_blank(self.checksum),
        })
    }
}

/// Body of a source metadata update. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceUpdateRequest {
    /// Trace identifier; filled in by the client when blank.
    pub trace_id: String,
    /// New location.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// New language.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// New catalog status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<SourceStatus>,
    /// New notes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl SourceUpdateRequest {
    /// `true` when no field would change.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.location.is_none()
            && self.language.is_none()
            && self.status.is_none()
            && self.notes.is_none()
    }

    /// Trims every field; blank values count as unchanged.
    #[must_use]
    pub fn normalized(self) -> Self {
        Self {
            trace_id: self.trace_id.trim().to_owned(),
            location: non_blank(self.location),
            language: non_blank(self.language),
            status: self.status,
            notes: non_blank(self.notes),
        }
    }
}

/// Body of a source quarantine request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceRemoveRequest {
    /// Trace identifier; filled in by the client when blank.
    pub trace_id: String,
    /// Why the source is being removed.
    pub reason: String,
}

impl SourceRemoveRequest {
    /// Builds a removal request.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            trace_id: String::new(),
            reason: reason.into(),
        }
    }

    /// Trims every field, rejecting a blank reason.
    pub fn normalized(self) -> Result<Self, IpcError> {
        let reason = self.reason.trim().to_owned();
        if reason.is_empty() {
            return Err(IpcError::InvalidArgument(String::from(
                "reason must be provided",
            )));
        }
        Ok(Self {
            trace_id: self.trace_id.trim().to_owned(),
            reason,
        })
    }
}

/// Catalog snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceListResponse {
    /// Every catalog entry.
    #[serde(default, deserialize_with = "null_as_default")]
    pub sources: Vec<SourceRecord>,
    /// When the catalog last changed.
    #[serde(default, deserialize_with = "null_as_default")]
    pub updated_at: String,
    /// Trace identifier of the listing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
}

/// Result of an add, update or remove.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceMutationResponse {
    /// The source after the mutation.
    pub source: SourceRecord,
    /// Ingestion queued by the mutation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingestion_job: Option<IngestionJob>,
    /// Quarantine details for removals.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quarantine: Option<QuarantineInfo>,
    /// Trace identifier of the mutation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
}

/// Quarantine state reported by a removal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuarantineInfo {
    /// Reason given for the removal.
    #[serde(default, deserialize_with = "null_as_default")]
    pub reason: String,
    /// When the quarantine was requested.
    #[serde(default, deserialize_with = "null_as_default")]
    pub requested: String,
    /// Trace identifier of the removal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    /// Documents moved to quarantine.
    #[serde(default, deserialize_with = "null_as_default")]
    pub documents: u64,
    /// What the operator should do next.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_steps: Option<String>,
}
