//! Scripted backend for front-end tests.
//!
//! Accepts one connection on a Unix socket inside a temporary directory,
//! acknowledges the handshake, and answers each request with the next
//! scripted list of frames. Requests are recorded for later assertions.

use std::io::{self, BufReader};
use std::os::unix::net::{UnixListener, UnixStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use camino::Utf8PathBuf;
use ragcli_ipc::codec::{
    self, CodecError, Frame, HandshakeAck, PROTOCOL_NAME, PROTOCOL_VERSION, Reply, Request,
};
use serde_json::Value;
use tempfile::TempDir;

const ACCEPT_DEADLINE: Duration = Duration::from_secs(5);

/// One frame sent in answer to a request.
#[derive(Debug, Clone)]
pub(crate) enum Step {
    /// A response frame.
    Reply(u16, Value),
    /// An event frame.
    Event(u16, Value),
}

pub(crate) struct FakeBackend {
    _dir: TempDir,
    socket: Utf8PathBuf,
    requests: Arc<Mutex<Vec<Request>>>,
    handle: Option<thread::JoinHandle<Result<()>>>,
}

impl FakeBackend {
    /// Binds the socket and serves `scripts`, one per request, on a thread.
    pub(crate) fn start(scripts: Vec<Vec<Step>>) -> Result<Self> {
        let dir = tempfile::tempdir().context("create socket directory")?;
        let socket = Utf8PathBuf::from_path_buf(dir.path().join("backend.sock"))
            .map_err(|path| anyhow!("socket path is not UTF-8: {}", path.display()))?;
        let listener = UnixListener::bind(&socket).context("bind fake backend")?;
        listener
            .set_nonblocking(true)
            .context("set listener nonblocking")?;

        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&requests);
        let handle = thread::spawn(move || serve(&listener, &scripts, &recorded));
        Ok(Self {
            _dir: dir,
            socket,
            requests,
            handle: Some(handle),
        })
    }

    pub(crate) fn socket_path(&self) -> &Utf8PathBuf {
        &self.socket
    }

    /// Waits for the backend to finish and returns what it received.
    pub(crate) fn take_requests(&mut self) -> Result<Vec<Request>> {
        if let Some(handle) = self.handle.take() {
            handle
                .join()
                .map_err(|_| anyhow!("fake backend thread panicked"))??;
        }
        let requests = self
            .requests
            .lock()
            .map_err(|error| anyhow!("lock requests: {error}"))?;
        Ok(requests.clone())
    }
}

fn serve(
    listener: &UnixListener,
    scripts: &[Vec<Step>],
    recorded: &Mutex<Vec<Request>>,
) -> Result<()> {
    let Some(stream) = accept(listener)? else {
        return Ok(());
    };
    stream
        .set_nonblocking(false)
        .context("set stream blocking")?;
    let mut reader = BufReader::new(stream.try_clone().context("clone stream")?);
    let mut writer = stream;

    match next_frame(&mut reader)? {
        Some(Frame::Handshake(_)) => {}
        Some(other) => return Err(anyhow!("expected handshake, got {}", other.kind())),
        None => return Ok(()),
    }
    let ack = Frame::HandshakeAck(HandshakeAck {
        protocol: PROTOCOL_NAME.to_owned(),
        version: PROTOCOL_VERSION,
        server: String::from("fake-backend"),
    });
    if !send(&mut writer, &ack)? {
        return Ok(());
    }

    for script in scripts {
        let request = match next_frame(&mut reader)? {
            Some(Frame::Request(request)) => request,
            Some(other) => return Err(anyhow!("expected request, got {}", other.kind())),
            None => return Ok(()),
        };
        let correlation_id = request.correlation_id.clone();
        recorded
            .lock()
            .map_err(|error| anyhow!("lock requests: {error}"))?
            .push(request);
        for step in script {
            let frame = match step {
                Step::Reply(status, body) => Frame::Response(reply(*status, &correlation_id, body)),
                Step::Event(status, body) => Frame::Event(reply(*status, &correlation_id, body)),
            };
            if !send(&mut writer, &frame)? {
                return Ok(());
            }
        }
    }
    Ok(())
}

fn reply(status: u16, correlation_id: &str, body: &Value) -> Reply {
    Reply {
        status,
        correlation_id: correlation_id.to_owned(),
        body: body.clone(),
    }
}

fn accept(listener: &UnixListener) -> Result<Option<UnixStream>> {
    let deadline = Instant::now() + ACCEPT_DEADLINE;
    loop {
        match listener.accept() {
            Ok((stream, _)) => return Ok(Some(stream)),
            Err(ref error) if error.kind() == io::ErrorKind::WouldBlock => {
                if Instant::now() >= deadline {
                    return Ok(None);
                }
                thread::sleep(Duration::from_millis(5));
            }
            Err(error) => return Err(error).context("accept connection"),
        }
    }
}

fn next_frame(reader: &mut BufReader<UnixStream>) -> Result<Option<Frame>> {
    match codec::read_frame(reader) {
        Ok(frame) => Ok(Some(frame)),
        Err(CodecError::Closed | CodecError::UnexpectedEof) => Ok(None),
        Err(error) if error.io_kind() == Some(io::ErrorKind::ConnectionReset) => Ok(None),
        Err(error) => Err(error).context("read client frame"),
    }
}

fn send(writer: &mut UnixStream, frame: &Frame) -> Result<bool> {
    match codec::write_frame(writer, frame) {
        Ok(()) => Ok(true),
        Err(error)
            if matches!(
                error.io_kind(),
                Some(io::ErrorKind::BrokenPipe | io::ErrorKind::ConnectionReset)
            ) =>
        {
            Ok(false)
        }
        Err(error) => Err(error).context("write frame"),
    }
}
