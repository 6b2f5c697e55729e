//! Scripted backend speaking the framed protocol on a real Unix socket.
//!
//! The backend accepts one connection, answers the handshake according to
//! its [`AckMode`], then plays one script per request it receives.

use std::io::{self, BufReader, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use camino::Utf8PathBuf;
use serde_json::Value;
use tempfile::TempDir;

use crate::codec::{
    self, CodecError, Frame, Handshake, HandshakeAck, PROTOCOL_NAME, PROTOCOL_VERSION, Reply,
    Request,
};
use crate::session::SessionSettings;

/// How the backend treats the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AckMode {
    /// Read the handshake and acknowledge it.
    Valid,
    /// Acknowledge with another protocol name.
    WrongProtocol,
    /// Acknowledge with another protocol version.
    WrongVersion,
    /// Read the handshake and never answer.
    Silent,
    /// Expect no handshake at all.
    Disabled,
}

/// One scripted action taken after a request arrives.
#[derive(Debug, Clone)]
pub(crate) enum Step {
    /// Response frame carrying the request's correlation id.
    Reply(u16, Value),
    /// Event frame carrying the request's correlation id.
    Event(u16, Value),
    /// Response frame carrying someone else's correlation id.
    Foreign(u16, Value),
    /// Bytes written verbatim.
    Raw(Vec<u8>),
    /// Sleep before the next step.
    Pause(Duration),
    /// Drop the connection.
    Close,
}

/// A fake backend bound to a socket inside a temporary directory.
pub(crate) struct FakeBackend {
    _dir: TempDir,
    socket: Utf8PathBuf,
    ack: AckMode,
    requests: Arc<Mutex<Vec<Request>>>,
    handshakes: Arc<Mutex<Vec<Handshake>>>,
    result: Arc<Mutex<Option<Result<()>>>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl FakeBackend {
    /// Starts a backend that plays `scripts` in order, one per request.
    pub(crate) fn start(ack: AckMode, scripts: Vec<Vec<Step>>) -> Result<Self> {
        let dir = tempfile::tempdir().context("socket directory")?;
        let socket = Utf8PathBuf::from_path_buf(dir.path().join("backend.sock"))
            .map_err(|path| anyhow!("non UTF-8 socket path {}", path.display()))?;
        let listener = UnixListener::bind(&socket).context("bind fake backend")?;
        listener
            .set_nonblocking(true)
            .context("fake backend nonblocking")?;

        let requests = Arc::new(Mutex::new(Vec::new()));
        let handshakes = Arc::new(Mutex::new(Vec::new()));
        let result: Arc<Mutex<Option<Result<()>>>> = Arc::new(Mutex::new(None));
        let recorder = Recorder {
            requests: Arc::clone(&requests),
            handshakes: Arc::clone(&handshakes),
        };
        let result_clone = Arc::clone(&result);
        let handle = thread::spawn(move || {
            let outcome = serve(&listener, ack, &scripts, &recorder);
            if let Ok(mut guard) = result_clone.lock() {
                *guard = Some(outcome);
            }
        });
        Ok(Self {
            _dir: dir,
            socket,
            ack,
            requests,
            handshakes,
            result,
            handle: Some(handle),
        })
    }

    pub(crate) fn socket_path(&self) -> &Utf8PathBuf {
        &self.socket
    }

    /// Session settings pointing at this backend with short timeouts.
    pub(crate) fn settings(&self) -> SessionSettings {
        let settings = SessionSettings::new(self.socket.clone())
            .with_client_id("fake-test")
            .with_handshake_timeout(Duration::from_millis(500))
            .with_stall_timeout(Duration::from_secs(5));
        if self.ack == AckMode::Disabled {
            settings.without_handshake()
        } else {
            settings
        }
    }

    /// Waits for the backend thread and returns every recorded request.
    pub(crate) fn take_requests(&mut self) -> Result<Vec<Request>> {
        if let Some(handle) = self.handle.take() {
            handle
                .join()
                .map_err(|_| anyhow!("fake backend thread panicked"))?;
        }
        if let Some(outcome) = self
            .result
            .lock()
            .map_err(|error| anyhow!("lock fake backend result: {error}"))?
            .take()
        {
            outcome.context("fake backend failed")?;
        }
        let requests = self
            .requests
            .lock()
            .map_err(|error| anyhow!("lock requests: {error}"))?;
        Ok(requests.clone())
    }

    /// Handshakes received so far.
    pub(crate) fn handshakes(&self) -> Result<Vec<Handshake>> {
        let handshakes = self
            .handshakes
            .lock()
            .map_err(|error| anyhow!("lock handshakes: {error}"))?;
        Ok(handshakes.clone())
    }
}

impl Drop for FakeBackend {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

struct Recorder {
    requests: Arc<Mutex<Vec<Request>>>,
    handshakes: Arc<Mutex<Vec<Handshake>>>,
}

fn serve(
    listener: &UnixListener,
    ack: AckMode,
    scripts: &[Vec<Step>],
    recorder: &Recorder,
) -> Result<()> {
    let Some(stream) = accept(listener)? else {
        return Ok(());
    };
    stream
        .set_nonblocking(false)
        .context("fake backend blocking stream")?;
    let mut reader = BufReader::new(stream.try_clone().context("clone stream")?);
    let mut writer = stream;

    if ack != AckMode::Disabled {
        let handshake = match next_frame(&mut reader)? {
            None => return Ok(()),
            Some(Frame::Handshake(handshake)) => handshake,
            Some(other) => return Err(anyhow!("expected handshake, got {}", other.kind())),
        };
        push(&recorder.handshakes, handshake)?;
        let reply = match ack {
            AckMode::Valid => Some((PROTOCOL_NAME, PROTOCOL_VERSION)),
            AckMode::WrongProtocol => Some(("other-ipc", PROTOCOL_VERSION)),
            AckMode::WrongVersion => Some((PROTOCOL_NAME, PROTOCOL_VERSION + 1)),
            AckMode::Silent | AckMode::Disabled => None,
        };
        if let Some((protocol, version)) = reply {
            let frame = Frame::HandshakeAck(HandshakeAck {
                protocol: protocol.to_owned(),
                version,
                server: String::from("fake-backend"),
            });
            if !send(&mut writer, &frame)? {
                return Ok(());
            }
        }
    }

    for script in scripts {
        let request = match next_frame(&mut reader)? {
            None => return Ok(()),
            Some(Frame::Request(request)) => request,
            Some(other) => return Err(anyhow!("expected request, got {}", other.kind())),
        };
        let correlation_id = request.correlation_id.clone();
        push(&recorder.requests, request)?;
        if !play(&mut writer, &correlation_id, script)? {
            return Ok(());
        }
    }

    Ok(())
}

fn play(writer: &mut UnixStream, correlation_id: &str, script: &[Step]) -> Result<bool> {
    for step in script {
        let frame = match step {
            Step::Reply(status, body) => reply(Frame::Response, *status, correlation_id, body),
            Step::Event(status, body) => reply(Frame::Event, *status, correlation_id, body),
            Step::Foreign(status, body) => reply(Frame::Response, *status, "not-yours", body),
            Step::Raw(bytes) => {
                if !tolerate(writer.write_all(bytes).and_then(|()| writer.flush()))? {
                    return Ok(false);
                }
                continue;
            }
            Step::Pause(duration) => {
                thread::sleep(*duration);
                continue;
            }
            Step::Close => {
                let _ = writer.shutdown(std::net::Shutdown::Both);
                return Ok(false);
            }
        };
        if !send(writer, &frame)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn reply(wrap: fn(Reply) -> Frame, status: u16, correlation_id: &str, body: &Value) -> Frame {
    wrap(Reply {
        status,
        correlation_id: correlation_id.to_owned(),
        body: body.clone(),
    })
}

fn accept(listener: &UnixListener) -> Result<Option<UnixStream>> {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        match listener.accept() {
            Ok((stream, _)) => return Ok(Some(stream)),
            Err(ref error)
                if error.kind() == io::ErrorKind::WouldBlock && Instant::now() < deadline =>
            {
                thread::sleep(Duration::from_millis(5));
            }
            Err(ref error) if error.kind() == io::ErrorKind::WouldBlock => return Ok(None),
            Err(error) => return Err(error).context("accept connection"),
        }
    }
}

/// Reads one frame; `None` once the client has gone away.
fn next_frame(reader: &mut BufReader<UnixStream>) -> Result<Option<Frame>> {
    match codec::read_frame(reader) {
        Ok(frame) => Ok(Some(frame)),
        Err(CodecError::Closed | CodecError::UnexpectedEof) => Ok(None),
        Err(error)
            if matches!(
                error.io_kind(),
                Some(io::ErrorKind::ConnectionReset | io::ErrorKind::BrokenPipe)
            ) =>
        {
            Ok(None)
        }
        Err(error) => Err(error).context("read client frame"),
    }
}

/// Writes a frame; `false` once the client has gone away.
fn send(writer: &mut UnixStream, frame: &Frame) -> Result<bool> {
    match codec::write_frame(writer, frame) {
        Ok(()) => Ok(true),
        Err(CodecError::Io(error)) => tolerate(Err(error)),
        Err(error) => Err(error).context("write frame"),
    }
}

fn tolerate(outcome: io::Result<()>) -> Result<bool> {
    match outcome {
        Ok(()) => Ok(true),
        Err(error)
            if matches!(
                error.kind(),
                io::ErrorKind::BrokenPipe | io::ErrorKind::ConnectionReset
            ) =>
        {
            Ok(false)
        }
        Err(error) => Err(error).context("write to client"),
    }
}

fn push<T>(target: &Mutex<Vec<T>>, value: T) -> Result<()> {
    target
        .lock()
        .map_err(|error| anyhow!("lock recorder: {error}"))?
        .push(value);
    Ok(())
}
