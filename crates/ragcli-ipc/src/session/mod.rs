//! A framed exchange over one Unix socket connection.
//!
//! A [`Session`] owns the socket and keeps exactly one exchange in flight;
//! `call` and `stream` take `&mut self`. The handshake frame is written when
//! the session opens and its acknowledgement is consumed lazily, right before
//! the first reply is read.
//!
//! Any transport failure part-way through an exchange poisons the session:
//! the socket is shut down and later exchanges fail fast instead of reading
//! the remains of a half-consumed frame.

use std::io::{self, BufReader, Write};
use std::net::Shutdown;
use std::os::fd::OwnedFd;
use std::os::unix::net::UnixStream;
use std::sync::Arc;
use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use serde_json::Value;
use socket2::{Domain, SockAddr, Socket, Type};
use tracing::{debug, warn};

use crate::cancel::{CancellationToken, Registration};
use crate::codec::{self, CodecError, Frame, Handshake, PROTOCOL_NAME, PROTOCOL_VERSION, Reply, Request};
use crate::correlation::{IdGenerator, RandomIds};
use crate::error::IpcError;
use crate::messages::ErrorBody;

mod deadline;

use deadline::DeadlineReader;

const SESSION_TARGET: &str = "ragcli_ipc::session";

/// Client identifier sent when none is configured.
pub const DEFAULT_CLIENT_ID: &str = "ragcli";
/// Time allowed for the socket connect.
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(2);
/// Time allowed for the handshake acknowledgement.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(2);
/// Longest silence tolerated between two frames of a stream.
pub const DEFAULT_STALL_TIMEOUT: Duration = Duration::from_secs(600);

/// Socket timeouts of zero mean "block forever" to the OS, so every wait is
/// at least this long.
const MIN_WAIT: Duration = Duration::from_millis(1);

/// How a session connects and identifies itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    /// Backend socket.
    pub socket_path: Utf8PathBuf,
    /// Identifier sent in the handshake.
    pub client_id: String,
    /// Connect timeout.
    pub dial_timeout: Duration,
    /// Time allowed for the handshake acknowledgement.
    pub handshake_timeout: Duration,
    /// Per-frame silence limit for streams.
    pub stall_timeout: Duration,
    /// Whether to perform the handshake at all.
    pub handshake: bool,
}

impl SessionSettings {
    /// Settings for `socket_path` with default timeouts and client id.
    #[must_use]
    pub fn new(socket_path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            client_id: DEFAULT_CLIENT_ID.to_owned(),
            dial_timeout: DEFAULT_DIAL_TIMEOUT,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            stall_timeout: DEFAULT_STALL_TIMEOUT,
            handshake: true,
        }
    }

    /// Replaces the client id; blank values keep the current one.
    #[must_use]
    pub fn with_client_id(mut self, client_id: &str) -> Self {
        let trimmed = client_id.trim();
        if !trimmed.is_empty() {
            trimmed.clone_into(&mut self.client_id);
        }
        self
    }

    /// Replaces the connect timeout.
    #[must_use]
    pub const fn with_dial_timeout(mut self, timeout: Duration) -> Self {
        self.dial_timeout = timeout;
        self
    }

    /// Replaces the handshake timeout.
    #[must_use]
    pub const fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Replaces the stream stall limit.
    #[must_use]
    pub const fn with_stall_timeout(mut self, timeout: Duration) -> Self {
        self.stall_timeout = timeout;
        self
    }

    /// Skips the handshake, for peers that do not speak it.
    #[must_use]
    pub const fn without_handshake(mut self) -> Self {
        self.handshake = false;
        self
    }
}

/// Per-exchange deadline and cancellation.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    deadline: Option<Instant>,
    cancel: Option<CancellationToken>,
}

impl CallOptions {
    /// No deadline and no cancellation.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the deadline `timeout` from now.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Instant::now().checked_add(timeout);
        self
    }

    /// Sets an absolute deadline.
    #[must_use]
    pub const fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Attaches a cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// The absolute deadline, if any.
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// The cancellation token, if any.
    #[must_use]
    pub const fn cancellation(&self) -> Option<&CancellationToken> {
        self.cancel.as_ref()
    }
}

/// What a stream consumer wants after seeing a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow<T> {
    /// Keep reading.
    Continue,
    /// Stop and return the value.
    Complete(T),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum SessionState {
    AwaitingAck,
    Ready,
    Poisoned(String),
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Handshake,
    Call,
    Stream,
}

/// Limits for one read.
struct Wait<'a> {
    path: &'a str,
    started: Instant,
    deadline: Option<Instant>,
    idle: Option<Duration>,
    phase: Phase,
    cancel: Option<&'a CancellationToken>,
}

enum Received {
    Response(Reply),
    Event(Reply),
}

/// One connection to the backend.
pub struct Session {
    endpoint: String,
    writer: UnixStream,
    reader: BufReader<DeadlineReader>,
    ids: Arc<dyn IdGenerator>,
    state: SessionState,
    handshake_timeout: Duration,
    stall_timeout: Duration,
    server: Option<String>,
}

impl Session {
    /// Connects to the configured socket and sends the handshake.
    ///
    /// # Errors
    ///
    /// Returns [`IpcError::Connection`] when the socket cannot be reached or
    /// the handshake cannot be written.
    pub fn connect(settings: &SessionSettings) -> Result<Self, IpcError> {
        Self::connect_with_ids(settings, Arc::new(RandomIds))
    }

    /// Like [`Session::connect`], with an explicit correlation id strategy.
    ///
    /// # Errors
    ///
    /// See [`Session::connect`].
    pub fn connect_with_ids(
        settings: &SessionSettings,
        ids: Arc<dyn IdGenerator>,
    ) -> Result<Self, IpcError> {
        debug!(
            target: SESSION_TARGET,
            socket = %settings.socket_path,
            client = %settings.client_id,
            "dialling backend"
        );
        let stream = dial(&settings.socket_path, settings.dial_timeout).map_err(|error| {
            let message = format!("unable to connect: {error}");
            IpcError::connection_io(settings.socket_path.as_str(), message, error)
        })?;
        Self::from_stream(stream, settings, ids)
    }

    /// Wraps an already connected stream. The socket path in `settings` is
    /// only used to label errors.
    ///
    /// # Errors
    ///
    /// Returns [`IpcError::Connection`] when the stream cannot be cloned or
    /// the handshake cannot be written.
    pub fn from_stream(
        stream: UnixStream,
        settings: &SessionSettings,
        ids: Arc<dyn IdGenerator>,
    ) -> Result<Self, IpcError> {
        let endpoint = settings.socket_path.to_string();
        let reader = stream
            .try_clone()
            .map_err(|error| IpcError::connection_io(&endpoint, "unable to clone socket", error))?;
        let mut session = Self {
            endpoint,
            writer: stream,
            reader: BufReader::new(DeadlineReader::new(reader)),
            ids,
            state: SessionState::Ready,
            handshake_timeout: settings.handshake_timeout,
            stall_timeout: settings.stall_timeout,
            server: None,
        };
        if settings.handshake {
            session.send_handshake(&settings.client_id)?;
        }
        Ok(session)
    }

    /// Socket path or peer description used in errors.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Server identifier from the handshake acknowledgement, once received.
    #[must_use]
    pub fn server(&self) -> Option<&str> {
        self.server.as_deref()
    }

    /// `true` until the session is closed or poisoned.
    #[must_use]
    pub const fn is_usable(&self) -> bool {
        matches!(self.state, SessionState::AwaitingAck | SessionState::Ready)
    }

    /// Sends one request and waits for the matching response.
    ///
    /// Event frames for the exchange are skipped. Statuses of 400 and above
    /// become [`IpcError::Rejected`].
    ///
    /// # Errors
    ///
    /// Transport failures, a passed deadline, cancellation, or a rejection.
    pub fn call(
        &mut self,
        path: &str,
        body: Value,
        options: &CallOptions,
    ) -> Result<Reply, IpcError> {
        self.exchange(path, body, options, Phase::Call, |received| match received {
            Received::Event(reply) => {
                debug!(
                    target: SESSION_TARGET,
                    path,
                    status = reply.status,
                    "skipping event frame during call"
                );
                Ok(Flow::Continue)
            }
            Received::Response(reply) if reply.is_error() => Err(IpcError::Rejected(Box::new(
                ErrorBody::rejection(path, reply.status, &reply.body),
            ))),
            Received::Response(reply) => Ok(Flow::Complete(reply)),
        })
    }

    /// Sends one request and hands every reply of the exchange, response or
    /// event, to `on_reply` until it returns [`Flow::Complete`].
    ///
    /// Each read is bounded by the stall limit as well as the deadline.
    ///
    /// # Errors
    ///
    /// Transport failures, a passed deadline, a stalled stream,
    /// cancellation, or whatever `on_reply` returns.
    pub fn stream<T, F>(
        &mut self,
        path: &str,
        body: Value,
        options: &CallOptions,
        mut on_reply: F,
    ) -> Result<T, IpcError>
    where
        F: FnMut(Reply) -> Result<Flow<T>, IpcError>,
    {
        self.exchange(path, body, options, Phase::Stream, |received| match received {
            Received::Response(reply) | Received::Event(reply) => on_reply(reply),
        })
    }

    /// Shuts the socket down. Later exchanges fail with
    /// [`IpcError::SessionClosed`]. Closing twice is harmless.
    pub fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        if let Err(error) = self.writer.shutdown(Shutdown::Both) {
            debug!(target: SESSION_TARGET, error = %error, "socket shutdown failed");
        }
        self.state = SessionState::Closed;
        debug!(target: SESSION_TARGET, endpoint = %self.endpoint, "session closed");
    }

    fn exchange<T>(
        &mut self,
        path: &str,
        body: Value,
        options: &CallOptions,
        phase: Phase,
        on_reply: impl FnMut(Received) -> Result<Flow<T>, IpcError>,
    ) -> Result<T, IpcError> {
        self.ensure_usable()?;
        if options.cancellation().is_some_and(CancellationToken::is_cancelled) {
            return Err(IpcError::Cancelled);
        }
        let _registration = options
            .cancellation()
            .map(|token| self.shutdown_on_cancel(token))
            .transpose()?;

        let result = self.run_exchange(path, body, options, phase, on_reply);
        if let Err(error) = &result
            && (error.is_transport_failure() || matches!(error, IpcError::CallbackAborted { .. }))
        {
            self.poison(error);
        }
        result
    }

    fn run_exchange<T>(
        &mut self,
        path: &str,
        body: Value,
        options: &CallOptions,
        phase: Phase,
        mut on_reply: impl FnMut(Received) -> Result<Flow<T>, IpcError>,
    ) -> Result<T, IpcError> {
        let started = Instant::now();
        let correlation_id = self.ids.next_id();
        let request = Frame::Request(Request {
            path: path.to_owned(),
            correlation_id: correlation_id.clone(),
            body,
        });
        let bytes = codec::encode(&request)
            .map_err(|error| IpcError::InvalidArgument(format!("cannot encode request: {error}")))?;

        let mut wait = Wait {
            path,
            started,
            deadline: options.deadline(),
            idle: None,
            phase,
            cancel: options.cancellation(),
        };
        debug!(
            target: SESSION_TARGET,
            path,
            correlation_id = %correlation_id,
            "sending request"
        );
        self.write_bytes(&bytes, &wait)?;

        if self.state == SessionState::AwaitingAck {
            wait.phase = Phase::Handshake;
            wait.idle = Some(self.handshake_timeout);
            self.consume_ack(&wait)?;
            wait.phase = phase;
        }
        wait.idle = (phase == Phase::Stream).then_some(self.stall_timeout);

        loop {
            let received = self.next_reply(&correlation_id, &wait)?;
            if let Flow::Complete(value) = on_reply(received)? {
                debug!(
                    target: SESSION_TARGET,
                    path,
                    correlation_id = %correlation_id,
                    elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                    "exchange complete"
                );
                return Ok(value);
            }
        }
    }

    fn send_handshake(&mut self, client_id: &str) -> Result<(), IpcError> {
        let frame = Frame::Handshake(Handshake::new(client_id));
        let bytes = codec::encode(&frame)
            .map_err(|error| IpcError::connection(&self.endpoint, error.to_string()))?;
        self.writer
            .set_write_timeout(Some(self.handshake_timeout.max(MIN_WAIT)))
            .map_err(|error| {
                IpcError::connection_io(&self.endpoint, "unable to configure socket", error)
            })?;
        let written = self.writer.write_all(&bytes);
        written.map_err(|error| {
            let message = format!("failed to send handshake: {error}");
            IpcError::connection_io(&self.endpoint, message, error)
        })?;
        self.state = SessionState::AwaitingAck;
        debug!(target: SESSION_TARGET, client = client_id, "handshake sent");
        Ok(())
    }

    fn consume_ack(&mut self, wait: &Wait<'_>) -> Result<(), IpcError> {
        let ack = match self.next_frame(wait)? {
            Frame::HandshakeAck(ack) => ack,
            other => {
                return Err(IpcError::connection(
                    &self.endpoint,
                    format!("expected handshake_ack, received {}", other.kind()),
                ));
            }
        };
        if ack.protocol != PROTOCOL_NAME {
            return Err(IpcError::connection(
                &self.endpoint,
                format!("server protocol mismatch {:?}", ack.protocol),
            ));
        }
        if ack.version != PROTOCOL_VERSION {
            return Err(IpcError::connection(
                &self.endpoint,
                format!("server protocol version {} unsupported", ack.version),
            ));
        }
        debug!(target: SESSION_TARGET, server = %ack.server, "handshake acknowledged");
        self.server = Some(ack.server);
        self.state = SessionState::Ready;
        Ok(())
    }

    fn next_reply(&mut self, correlation_id: &str, wait: &Wait<'_>) -> Result<Received, IpcError> {
        loop {
            let (received, reply_id) = match self.next_frame(wait)? {
                Frame::Response(reply) => {
                    let id = reply.correlation_id.clone();
                    (Received::Response(reply), id)
                }
                Frame::Event(reply) => {
                    let id = reply.correlation_id.clone();
                    (Received::Event(reply), id)
                }
                other => {
                    return Err(IpcError::malformed(format!(
                        "unexpected {} frame from backend",
                        other.kind()
                    )));
                }
            };
            if reply_id == correlation_id {
                return Ok(received);
            }
            warn!(
                target: SESSION_TARGET,
                path = wait.path,
                expected = correlation_id,
                received = %reply_id,
                "skipping frame with foreign correlation id"
            );
        }
    }

    fn next_frame(&mut self, wait: &Wait<'_>) -> Result<Frame, IpcError> {
        let now = Instant::now();
        if wait.deadline.is_some_and(|deadline| deadline <= now) {
            return Err(timeout(wait));
        }
        // The stall bound covers the whole frame, not each partial read.
        let stall = wait.idle.and_then(|idle| now.checked_add(idle));
        let (expires, idle_bound) = match (wait.deadline, stall) {
            (Some(deadline), Some(stalled)) if stalled < deadline => (Some(stalled), wait.idle),
            (Some(deadline), _) => (Some(deadline), None),
            (None, Some(stalled)) => (Some(stalled), wait.idle),
            (None, None) => (None, None),
        };
        self.reader.get_mut().expire_at(expires);
        let frame = codec::read_frame(&mut self.reader);
        frame.map_err(|error| self.classify(error, wait, idle_bound))
    }

    fn write_bytes(&mut self, bytes: &[u8], wait: &Wait<'_>) -> Result<(), IpcError> {
        let limit = wait
            .deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()).max(MIN_WAIT));
        self.writer.set_write_timeout(limit).map_err(|error| {
            IpcError::connection_io(&self.endpoint, "unable to configure socket", error)
        })?;
        let written = self.writer.write_all(bytes);
        written.map_err(|error| {
            if wait.cancel.is_some_and(CancellationToken::is_cancelled) {
                IpcError::Cancelled
            } else if is_timeout(&error) {
                timeout(wait)
            } else {
                let message = format!("failed to write request: {error}");
                IpcError::connection_io(&self.endpoint, message, error)
            }
        })
    }

    fn classify(&self, error: CodecError, wait: &Wait<'_>, idle_bound: Option<Duration>) -> IpcError {
        if wait.cancel.is_some_and(CancellationToken::is_cancelled) {
            return IpcError::Cancelled;
        }
        if error.io_kind().is_some_and(|kind| {
            matches!(kind, io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
        }) {
            return match (idle_bound, wait.phase) {
                (None, _) => timeout(wait),
                (Some(idle), Phase::Handshake) => IpcError::connection(
                    &self.endpoint,
                    format!("no handshake acknowledgement within {idle:?}"),
                ),
                (Some(idle), Phase::Call | Phase::Stream) => IpcError::StalledStream {
                    path: wait.path.to_owned(),
                    idle,
                },
            };
        }
        match (wait.phase, error) {
            (Phase::Handshake, CodecError::Io(source)) => {
                let message = format!("handshake failed: {source}");
                IpcError::connection_io(&self.endpoint, message, source)
            }
            (Phase::Handshake, other) => {
                IpcError::connection(&self.endpoint, format!("handshake failed: {other}"))
            }
            (Phase::Stream, CodecError::Closed) => IpcError::connection(
                &self.endpoint,
                "stream ended before the job reached a terminal state",
            ),
            (Phase::Call, CodecError::Closed) => {
                IpcError::connection(&self.endpoint, "backend closed the connection")
            }
            (_, CodecError::UnexpectedEof) => IpcError::UnexpectedEof,
            (_, CodecError::Malformed(reason)) => IpcError::MalformedFrame { reason },
            (_, CodecError::Encode(source)) => IpcError::malformed(source.to_string()),
            (_, CodecError::Io(source)) => {
                let message = format!("read failed: {source}");
                IpcError::connection_io(&self.endpoint, message, source)
            }
        }
    }

    fn shutdown_on_cancel(&self, token: &CancellationToken) -> Result<Registration, IpcError> {
        let socket = self.writer.try_clone().map_err(|error| {
            IpcError::connection_io(&self.endpoint, "unable to clone socket", error)
        })?;
        Ok(token.on_cancel(move || {
            if let Err(error) = socket.shutdown(Shutdown::Both) {
                debug!(target: SESSION_TARGET, error = %error, "cancel shutdown failed");
            }
        }))
    }

    fn ensure_usable(&self) -> Result<(), IpcError> {
        match &self.state {
            SessionState::Closed => Err(IpcError::SessionClosed),
            SessionState::Poisoned(reason) => Err(IpcError::connection(
                &self.endpoint,
                format!("session unusable after an earlier failure: {reason}"),
            )),
            SessionState::AwaitingAck | SessionState::Ready => Ok(()),
        }
    }

    fn poison(&mut self, error: &IpcError) {
        warn!(
            target: SESSION_TARGET,
            endpoint = %self.endpoint,
            error = %error,
            "exchange failed; closing session"
        );
        if let Err(shutdown) = self.writer.shutdown(Shutdown::Both) {
            debug!(target: SESSION_TARGET, error = %shutdown, "socket shutdown failed");
        }
        self.state = SessionState::Poisoned(error.to_string());
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Session")
            .field("endpoint", &self.endpoint)
            .field("state", &self.state)
            .field("server", &self.server)
            .finish_non_exhaustive()
    }
}

fn timeout(wait: &Wait<'_>) -> IpcError {
    IpcError::Timeout {
        path: wait.path.to_owned(),
        elapsed: wait.started.elapsed(),
    }
}

fn is_timeout(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}

fn dial(path: &Utf8Path, timeout: Duration) -> io::Result<UnixStream> {
    let socket = Socket::new(Domain::UNIX, Type::STREAM, None)?;
    let address = SockAddr::unix(path.as_std_path())?;
    socket.connect_timeout(&address, timeout.max(MIN_WAIT))?;
    Ok(UnixStream::from(OwnedFd::from(socket)))
}
