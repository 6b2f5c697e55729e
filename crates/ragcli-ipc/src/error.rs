//! Errors surfaced by the transport and the request façade.
//!
//! Large payloads are boxed and I/O errors are wrapped in `Arc` so the error
//! stays small enough for the `result_large_err` lint and cheap to clone into
//! log fields.

use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::messages::IngestionJob;

/// Boxed error returned by a progress callback.
pub type CallbackError = Box<dyn StdError + Send + Sync + 'static>;

/// Failures raised while talking to the backend.
#[derive(Debug, Error)]
pub enum IpcError {
    /// The socket could not be opened, the handshake failed, the backend
    /// closed the connection, or the session is unusable after an earlier
    /// failure.
    #[error("connection to {endpoint} failed: {message}")]
    Connection {
        /// Socket path or other description of the peer.
        endpoint: String,
        /// What went wrong.
        message: String,
        /// Underlying I/O error, when there is one.
        #[source]
        source: Option<Arc<io::Error>>,
    },
    /// A frame violated the wire format or carried an unexpected shape.
    #[error("malformed frame: {reason}")]
    MalformedFrame {
        /// Description of the violation.
        reason: String,
    },
    /// The stream ended part-way through a frame.
    #[error("connection closed part-way through a frame")]
    UnexpectedEof,
    /// The caller's deadline expired before the exchange finished.
    #[error("{path} timed out after {elapsed:?}")]
    Timeout {
        /// Route of the timed-out request.
        path: String,
        /// Time spent waiting before giving up.
        elapsed: Duration,
    },
    /// No frame arrived within the per-frame stall limit.
    #[error("{path} stalled: no frame received for {idle:?}")]
    StalledStream {
        /// Route of the stalled request.
        path: String,
        /// The stall limit that expired.
        idle: Duration,
    },
    /// The exchange was cancelled through a cancellation token.
    #[error("request cancelled")]
    Cancelled,
    /// Caller input was rejected before any frame was sent.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The progress callback returned an error and the stream was abandoned.
    #[error("progress callback aborted the stream: {source}")]
    CallbackAborted {
        /// The callback's own error, unchanged.
        #[source]
        source: CallbackError,
    },
    /// A job reached the `failed` or `cancelled` terminal state.
    #[error("job {} finished with status {}{}", .job.job_id, .job.normalized_status(), failure_suffix(.job))]
    JobFailed {
        /// Final snapshot of the job.
        job: Box<IngestionJob>,
    },
    /// The backend answered with an error status.
    #[error(transparent)]
    Rejected(Box<Rejection>),
    /// The session was closed by its owner.
    #[error("session is closed")]
    SessionClosed,
    /// The offline guard blocked a request to a non-loopback host.
    #[error("external network access blocked: {host}")]
    ExternalNetworkBlocked {
        /// Host that was refused.
        host: String,
    },
}

impl IpcError {
    pub(crate) fn connection(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connection {
            endpoint: endpoint.into(),
            message: message.into(),
            source: None,
        }
    }

    pub(crate) fn connection_io(
        endpoint: impl Into<String>,
        message: impl Into<String>,
        source: io::Error,
    ) -> Self {
        Self::Connection {
            endpoint: endpoint.into(),
            message: message.into(),
            source: Some(Arc::new(source)),
        }
    }

    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedFrame {
            reason: reason.into(),
        }
    }

    /// Returns the callback's error when this is [`IpcError::CallbackAborted`]
    /// and the callback error has type `E`.
    #[must_use]
    pub fn callback_error<E>(&self) -> Option<&E>
    where
        E: StdError + 'static,
    {
        match self {
            Self::CallbackAborted { source } => source.downcast_ref::<E>(),
            _ => None,
        }
    }

    /// Returns the rejection details when the backend answered with an error
    /// status.
    #[must_use]
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Self::Rejected(rejection) => Some(rejection),
            _ => None,
        }
    }

    /// Returns the final job snapshot carried by [`IpcError::JobFailed`].
    #[must_use]
    pub fn failed_job(&self) -> Option<&IngestionJob> {
        match self {
            Self::JobFailed { job } => Some(job),
            _ => None,
        }
    }

    /// `true` when the failure left the session unusable.
    #[must_use]
    pub const fn is_transport_failure(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::MalformedFrame { .. }
                | Self::UnexpectedEof
                | Self::Timeout { .. }
                | Self::StalledStream { .. }
                | Self::Cancelled
        )
    }
}

fn failure_suffix(job: &IngestionJob) -> String {
    job.error()
        .map(|message| format!(": {message}"))
        .unwrap_or_default()
}

/// Error status returned by the backend, with its decoded error body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    /// Route of the rejected request.
    pub path: String,
    /// Status code, always 400 or above.
    pub status: u16,
    /// Machine-readable error code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Suggested fix, if the backend offered one.
    pub remediation: Option<String>,
}

impl fmt::Display for Rejection {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "backend rejected {} with status {} ({}): {}",
            self.path, self.status, self.code, self.message
        )?;
        if let Some(remediation) = &self.remediation {
            write!(formatter, "; remediation: {remediation}")?;
        }
        Ok(())
    }
}

impl StdError for Rejection {}
