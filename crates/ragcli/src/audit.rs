//! Append-only JSON Lines record of administrative actions.
//!
//! Every successful (or failed, for reindex) `ragadmin` mutation appends one
//! object per line. Failing to write the log never fails the command; the
//! problem is reported as a warning instead.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::OpenOptionsExt;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{debug, warn};

const AUDIT_TARGET: &str = "ragcli::audit";

/// Actor recorded in every entry.
pub(crate) const AUDIT_ACTOR: &str = "ragadmin";

const AUDIT_FILE_MODE: u32 = 0o600;

/// One line of the audit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct AuditEntry {
    timestamp: String,
    actor: &'static str,
    action: String,
    target: String,
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    trace_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl AuditEntry {
    pub(crate) fn new(
        action: impl Into<String>,
        target: impl Into<String>,
        status: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: now_rfc3339(),
            actor: AUDIT_ACTOR,
            action: action.into(),
            target: target.into(),
            status: status.into(),
            trace_id: None,
            details: None,
        }
    }

    pub(crate) fn with_trace_id(mut self, trace_id: Option<&str>) -> Self {
        self.trace_id = trace_id
            .map(str::trim)
            .filter(|trace| !trace.is_empty())
            .map(str::to_owned);
        self
    }

    pub(crate) fn with_details(mut self, details: impl Into<String>) -> Self {
        let text = details.into();
        self.details = (!text.trim().is_empty()).then_some(text);
        self
    }
}

fn now_rfc3339() -> String {
    // Formatting a UTC timestamp as RFC 3339 only fails for years outside
    // 0..=9999; fall back to the Unix epoch rendering in that case.
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}

#[derive(Debug, Error)]
pub(crate) enum AuditError {
    #[error("failed to create audit directory {path}: {source}")]
    CreateDirectory {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to open audit log {path}: {source}")]
    Open {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to encode audit entry: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("failed to write audit log {path}: {source}")]
    Write {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Audit log bound to a file, or disabled when no location is known.
#[derive(Debug, Clone, Default)]
pub(crate) struct AuditLog {
    path: Option<Utf8PathBuf>,
}

impl AuditLog {
    pub(crate) const fn new(path: Option<Utf8PathBuf>) -> Self {
        Self { path }
    }

    /// Appends `entry`, creating the file and its directory on demand.
    pub(crate) fn append(&self, entry: &AuditEntry) -> Result<(), AuditError> {
        let Some(path) = self.path.as_deref() else {
            debug!(target: AUDIT_TARGET, action = %entry.action, "audit log disabled");
            return Ok(());
        };
        ensure_parent(path)?;
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .mode(AUDIT_FILE_MODE)
            .open(path)
            .map_err(|source| AuditError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        file.write_all(&line).map_err(|source| AuditError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Appends `entry`, logging instead of failing when the write fails.
    pub(crate) fn record(&self, entry: &AuditEntry) {
        if let Err(error) = self.append(entry) {
            warn!(
                target: AUDIT_TARGET,
                action = %entry.action,
                error = %error,
                "failed to append audit entry"
            );
        }
    }
}

fn ensure_parent(path: &Utf8Path) -> Result<(), AuditError> {
    match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|source| AuditError::CreateDirectory {
                path: parent.to_path_buf(),
                source,
            })
        }
        _ => Ok(()),
    }
}
