//! Drives a streamed ingestion job to its terminal snapshot.
//!
//! The backend answers a streamed request with a sequence of frames whose
//! bodies are `{"job": {...}}` snapshots. The first frame must carry status
//! 202. Every snapshot is handed to the caller's callback in arrival order;
//! the first snapshot with a terminal normalised status ends the exchange.

use std::error::Error as StdError;

use serde_json::Value;
use tracing::debug;

use crate::codec::{Reply, STATUS_ACCEPTED};
use crate::error::IpcError;
use crate::messages::{ErrorBody, IngestionJob, JobEnvelope, JobStatus, decode_body};
use crate::session::{CallOptions, Flow, Session};

const STREAM_TARGET: &str = "ragcli_ipc::stream";

/// Tracks one job stream and forwards snapshots to a callback.
#[derive(Debug)]
pub struct JobStream<'a, F> {
    path: &'a str,
    on_job: F,
    frames: usize,
    last_status: Option<JobStatus>,
}

impl<'a, F, E> JobStream<'a, F>
where
    F: FnMut(&IngestionJob) -> Result<(), E>,
    E: StdError + Send + Sync + 'static,
{
    /// Creates a controller for a stream on `path`.
    pub fn new(path: &'a str, on_job: F) -> Self {
        Self {
            path,
            on_job,
            frames: 0,
            last_status: None,
        }
    }

    /// Number of snapshots seen so far.
    #[must_use]
    pub const fn frames(&self) -> usize {
        self.frames
    }

    /// Handles one reply of the stream.
    ///
    /// # Errors
    ///
    /// [`IpcError::Rejected`] for an error status, [`IpcError::MalformedFrame`]
    /// for a first frame that is not 202 or a body that is not a job, and
    /// [`IpcError::CallbackAborted`] when the callback fails.
    pub fn accept(&mut self, reply: Reply) -> Result<Flow<IngestionJob>, IpcError> {
        if reply.is_error() {
            return Err(IpcError::Rejected(Box::new(ErrorBody::rejection(
                self.path,
                reply.status,
                &reply.body,
            ))));
        }
        if self.frames == 0 && reply.status != STATUS_ACCEPTED {
            return Err(IpcError::malformed(format!(
                "stream for {} opened with status {} instead of {STATUS_ACCEPTED}",
                self.path, reply.status
            )));
        }
        let job = decode_job(self.path, &reply.body)?;
        self.frames = self.frames.saturating_add(1);

        let status = job.normalized_status();
        if self.last_status.as_ref() != Some(&status) {
            debug!(
                target: STREAM_TARGET,
                job_id = %job.job_id,
                status = %status,
                stage = %job.stage,
                "job status changed"
            );
        }
        (self.on_job)(&job).map_err(|error| IpcError::CallbackAborted {
            source: Box::new(error),
        })?;

        let terminal = status.is_terminal();
        self.last_status = Some(status);
        if terminal {
            Ok(Flow::Complete(job))
        } else {
            Ok(Flow::Continue)
        }
    }
}

/// Sends `body` to `path` and feeds every job snapshot to `on_job` until the
/// job reaches a terminal state.
///
/// Returns the terminal snapshot even when the job failed; use
/// [`IngestionJob::into_outcome`] to turn a failure into an error.
///
/// # Errors
///
/// Transport failures from the session, plus the errors of
/// [`JobStream::accept`].
pub fn drive_job_stream<F, E>(
    session: &mut Session,
    path: &str,
    body: Value,
    options: &CallOptions,
    on_job: F,
) -> Result<IngestionJob, IpcError>
where
    F: FnMut(&IngestionJob) -> Result<(), E>,
    E: StdError + Send + Sync + 'static,
{
    let mut controller = JobStream::new(path, on_job);
    session.stream(path, body, options, |reply| controller.accept(reply))
}

fn decode_job(path: &str, body: &Value) -> Result<IngestionJob, IpcError> {
    decode_body::<JobEnvelope>(path, body).map(|envelope| envelope.job)
}
