//! Typed operations over a [`Session`].
//!
//! The client validates and normalises requests before anything reaches the
//! wire, fills in missing trace ids, and decodes replies into the typed
//! bodies of [`crate::messages`].

use std::error::Error as StdError;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::info;

use crate::codec::{STATUS_ACCEPTED, STATUS_CREATED, STATUS_OK};
use crate::correlation::{IdGenerator, RandomIds};
use crate::error::IpcError;
use crate::messages::{
    HealthRequest, HealthSummary, IngestionJob, InitRequest, InitResponse, JobEnvelope,
    QueryRequest, QueryResponse, ReindexRequest, ResponseBody, Route, SourceCreateRequest,
    SourceListRequest, SourceListResponse, SourceMutationResponse, SourceRemoveRequest,
    SourceUpdateRequest, decode_body, encode_body,
};
use crate::session::{CallOptions, Session, SessionSettings};
use crate::stream::drive_job_stream;

const CLIENT_TARGET: &str = "ragcli_ipc::client";

/// Request façade owning one session.
pub struct Client {
    session: Session,
    traces: Arc<dyn IdGenerator>,
}

impl Client {
    /// Connects a new session with random trace ids.
    ///
    /// # Errors
    ///
    /// Returns [`IpcError::Connection`] when the backend cannot be reached.
    pub fn connect(settings: &SessionSettings) -> Result<Self, IpcError> {
        Session::connect(settings).map(Self::new)
    }

    /// Wraps a session, generating trace ids at random.
    #[must_use]
    pub fn new(session: Session) -> Self {
        Self::with_trace_ids(session, Arc::new(RandomIds))
    }

    /// Wraps a session with an explicit trace id strategy.
    #[must_use]
    pub fn with_trace_ids(session: Session, traces: Arc<dyn IdGenerator>) -> Self {
        Self { session, traces }
    }

    /// The underlying session.
    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    /// Closes the underlying session.
    pub fn close(&mut self) {
        self.session.close();
    }

    /// Runs the aggregated health check.
    ///
    /// # Errors
    ///
    /// Transport failures, rejections, or an unexpected reply.
    pub fn health_check(
        &mut self,
        mut request: HealthRequest,
        options: &CallOptions,
    ) -> Result<HealthSummary, IpcError> {
        self.fill_trace(&mut request.trace_id);
        let mut summary: HealthSummary =
            self.call_expecting(&Route::Health, &request, STATUS_OK, options)?;
        inherit_trace(&mut summary.trace_id, &request.trace_id);
        Ok(summary)
    }

    /// Asks a question.
    ///
    /// # Errors
    ///
    /// [`IpcError::InvalidArgument`] for a blank question, otherwise as
    /// [`Client::health_check`].
    pub fn query(
        &mut self,
        request: QueryRequest,
        options: &CallOptions,
    ) -> Result<QueryResponse, IpcError> {
        let mut normalized = request.normalized()?;
        self.fill_trace(&mut normalized.trace_id);
        let mut response: QueryResponse =
            self.call_expecting(&Route::Query, &normalized, STATUS_OK, options)?;
        inherit_trace(&mut response.trace_id, &normalized.trace_id);
        info!(
            target: CLIENT_TARGET,
            trace_id = %response.trace_id,
            latency_ms = response.latency_ms,
            "query answered"
        );
        Ok(response)
    }

    /// Starts a reindex and returns the accepted job without waiting.
    ///
    /// # Errors
    ///
    /// As [`Client::health_check`], plus [`IpcError::JobFailed`] when the
    /// accepted job is already failed.
    pub fn start_reindex(
        &mut self,
        mut request: ReindexRequest,
        options: &CallOptions,
    ) -> Result<IngestionJob, IpcError> {
        self.fill_trace(&mut request.trace_id);
        let envelope: JobEnvelope =
            self.call_expecting(&Route::Reindex, &request, STATUS_ACCEPTED, options)?;
        envelope.job.into_outcome()
    }

    /// Starts a reindex and follows its progress, calling `on_job` for every
    /// snapshot, the terminal one included.
    ///
    /// # Errors
    ///
    /// Transport failures, [`IpcError::CallbackAborted`] when `on_job`
    /// fails, and [`IpcError::JobFailed`] when the job ends `failed` or
    /// `cancelled`.
    pub fn start_reindex_stream<F, E>(
        &mut self,
        mut request: ReindexRequest,
        options: &CallOptions,
        on_job: F,
    ) -> Result<IngestionJob, IpcError>
    where
        F: FnMut(&IngestionJob) -> Result<(), E>,
        E: StdError + Send + Sync + 'static,
    {
        self.fill_trace(&mut request.trace_id);
        let path = Route::Reindex.path();
        let body = encode_body(&path, &request)?;
        info!(
            target: CLIENT_TARGET,
            trace_id = %request.trace_id,
            trigger = %request.trigger,
            force = request.force,
            "following reindex"
        );
        drive_job_stream(&mut self.session, &path, body, options, on_job)?.into_outcome()
    }

    /// Runs first-time initialisation.
    ///
    /// # Errors
    ///
    /// As [`Client::health_check`].
    pub fn init_system(
        &mut self,
        mut request: InitRequest,
        options: &CallOptions,
    ) -> Result<InitResponse, IpcError> {
        self.fill_trace(&mut request.trace_id);
        let mut response: InitResponse =
            self.call_expecting(&Route::Init, &request, STATUS_OK, options)?;
        inherit_optional_trace(&mut response.trace_id, &request.trace_id);
        Ok(response)
    }

    /// Lists the source catalog.
    ///
    /// # Errors
    ///
    /// As [`Client::health_check`].
    pub fn list_sources(
        &mut self,
        mut request: SourceListRequest,
        options: &CallOptions,
    ) -> Result<SourceListResponse, IpcError> {
        self.fill_trace(&mut request.trace_id);
        let mut response: SourceListResponse =
            self.call_expecting(&Route::Sources, &request, STATUS_OK, options)?;
        inherit_optional_trace(&mut response.trace_id, &request.trace_id);
        Ok(response)
    }

    /// Registers a new source.
    ///
    /// # Errors
    ///
    /// [`IpcError::InvalidArgument`] for a blank location, otherwise as
    /// [`Client::health_check`].
    pub fn create_source(
        &mut self,
        request: SourceCreateRequest,
        options: &CallOptions,
    ) -> Result<SourceMutationResponse, IpcError> {
        let mut normalized = request.normalized()?;
        self.fill_trace(&mut normalized.trace_id);
        let mut response: SourceMutationResponse =
            self.call_expecting(&Route::Sources, &normalized, STATUS_CREATED, options)?;
        inherit_optional_trace(&mut response.trace_id, &normalized.trace_id);
        Ok(response)
    }

    /// Updates the metadata of the source called `alias`.
    ///
    /// # Errors
    ///
    /// [`IpcError::InvalidArgument`] for a blank alias or an update that
    /// changes nothing, otherwise as [`Client::health_check`].
    pub fn update_source(
        &mut self,
        alias: &str,
        request: SourceUpdateRequest,
        options: &CallOptions,
    ) -> Result<SourceMutationResponse, IpcError> {
        let route = Route::source(alias)?;
        let mut normalized = request.normalized();
        if normalized.is_empty() {
            return Err(IpcError::InvalidArgument(String::from(
                "update requires at least one field to change",
            )));
        }
        self.fill_trace(&mut normalized.trace_id);
        let mut response: SourceMutationResponse =
            self.call_expecting(&route, &normalized, STATUS_OK, options)?;
        inherit_optional_trace(&mut response.trace_id, &normalized.trace_id);
        Ok(response)
    }

    /// Quarantines the source called `alias`.
    ///
    /// # Errors
    ///
    /// [`IpcError::InvalidArgument`] for a blank alias or reason, otherwise
    /// as [`Client::health_check`].
    pub fn remove_source(
        &mut self,
        alias: &str,
        request: SourceRemoveRequest,
        options: &CallOptions,
    ) -> Result<SourceMutationResponse, IpcError> {
        let route = Route::source(alias)?;
        let mut normalized = request.normalized()?;
        self.fill_trace(&mut normalized.trace_id);
        let mut response: SourceMutationResponse =
            self.call_expecting(&route, &normalized, STATUS_ACCEPTED, options)?;
        inherit_optional_trace(&mut response.trace_id, &normalized.trace_id);
        Ok(response)
    }

    /// Sends an arbitrary body to `route` and decodes the reply by route and
    /// status.
    ///
    /// # Errors
    ///
    /// Transport failures, rejections, or a body that does not match the
    /// route.
    pub fn request(
        &mut self,
        route: &Route,
        body: Value,
        options: &CallOptions,
    ) -> Result<ResponseBody, IpcError> {
        let reply = self.session.call(&route.path(), body, options)?;
        ResponseBody::decode(route, reply.status, &reply.body)
    }

    fn call_expecting<T, B>(
        &mut self,
        route: &Route,
        request: &B,
        expected: u16,
        options: &CallOptions,
    ) -> Result<T, IpcError>
    where
        T: DeserializeOwned,
        B: Serialize,
    {
        let path = route.path();
        let body = encode_body(&path, request)?;
        let reply = self.session.call(&path, body, options)?;
        if reply.status != expected {
            return Err(IpcError::malformed(format!(
                "unexpected status {} for {path} (expected {expected})",
                reply.status
            )));
        }
        decode_body(&path, &reply.body)
    }

    fn fill_trace(&self, trace_id: &mut String) {
        let trimmed = trace_id.trim();
        if trimmed.is_empty() {
            *trace_id = self.traces.next_id();
        } else if trimmed.len() != trace_id.len() {
            *trace_id = trimmed.to_owned();
        }
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Client")
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

fn inherit_trace(response: &mut String, request: &str) {
    if response.trim().is_empty() {
        request.clone_into(response);
    }
}

fn inherit_optional_trace(response: &mut Option<String>, request: &str) {
    if response.as_deref().is_none_or(|trace| trace.trim().is_empty()) {
        *response = Some(request.to_owned());
    }
}
