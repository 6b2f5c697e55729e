//! Client side of the ragcli backend protocol.
//!
//! The backend listens on a Unix domain socket and speaks length-prefixed
//! JSON frames. A [`Session`] owns one connection, performs the handshake,
//! and runs one exchange at a time: either a single request/response
//! [`Session::call`] or a multi-frame [`Session::stream`]. Long-running jobs
//! such as a reindex report progress as a stream of job snapshots, which the
//! [`JobStream`] controller hands to a callback until the job reaches a
//! terminal status.
//!
//! [`Client`] layers typed operations on top: it validates input before
//! anything is written, fills in trace ids, and decodes replies into the
//! structures in [`messages`].
//!
//! ```no_run
//! use ragcli_ipc::{CallOptions, Client, HealthRequest, SessionSettings};
//!
//! # fn main() -> Result<(), ragcli_ipc::IpcError> {
//! let settings = SessionSettings::new("/run/user/1000/ragcli/backend.sock");
//! let mut client = Client::connect(&settings)?;
//! let summary = client.health_check(HealthRequest::default(), &CallOptions::new())?;
//! println!("{}", summary.overall_status);
//! # Ok(())
//! # }
//! ```

mod cancel;
mod client;
pub mod codec;
mod correlation;
mod error;
pub mod messages;
mod offline_guard;
mod session;
mod stream;

pub use cancel::CancellationToken;
pub use client::Client;
pub use codec::{CodecError, Frame, Reply};
pub use correlation::{IdGenerator, RandomIds, SequentialIds, new_id};
pub use error::{CallbackError, IpcError, Rejection};
pub use messages::{
    HealthRequest, HealthSummary, IngestionJob, InitRequest, InitResponse, JobStatus,
    QueryRequest, QueryResponse, ReindexRequest, ReindexTrigger, ResponseBody, Route,
    SourceCreateRequest, SourceKind, SourceListRequest, SourceListResponse, SourceMutationResponse,
    SourceRecord, SourceRemoveRequest, SourceStatus, SourceUpdateRequest,
};
pub use offline_guard::{OfflineGuard, OfflineGuardHandle};
pub use session::{
    CallOptions, DEFAULT_CLIENT_ID, DEFAULT_DIAL_TIMEOUT, DEFAULT_HANDSHAKE_TIMEOUT,
    DEFAULT_STALL_TIMEOUT, Flow, Session, SessionSettings,
};
pub use stream::{JobStream, drive_job_stream};

#[cfg(test)]
mod tests;
