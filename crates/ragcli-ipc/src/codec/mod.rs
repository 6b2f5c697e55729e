//! Length-prefixed JSON framing.
//!
//! Each frame is the payload length as ASCII decimal, a newline, the JSON
//! payload, and a closing newline:
//!
//! ```text
//! 58\n{"type":"request","path":"/v1/query","correlation_id":"ab",...}\n
//! ```
//!
//! Payloads above [`MAX_FRAME_SIZE`] are refused on both the read and the
//! write side.

use std::io::{self, BufRead, Read, Write};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Protocol name exchanged in the handshake.
pub const PROTOCOL_NAME: &str = "rag-cli-ipc";

/// Protocol version exchanged in the handshake.
pub const PROTOCOL_VERSION: u32 = 1;

/// Largest accepted frame payload, in bytes (16 MiB).
pub const MAX_FRAME_SIZE: usize = 16 << 20;

/// Longest accepted length prefix including its newline.
const MAX_PREFIX_LEN: usize = 21;

/// Success status for a completed request.
pub const STATUS_OK: u16 = 200;
/// Success status for a request that created a resource.
pub const STATUS_CREATED: u16 = 201;
/// Status for a request accepted for asynchronous processing.
pub const STATUS_ACCEPTED: u16 = 202;
/// Smallest status treated as an error.
pub const STATUS_ERROR_THRESHOLD: u16 = 400;

/// Unit of the wire protocol, discriminated by its `type` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    /// Sent once by the client after connecting.
    Handshake(Handshake),
    /// The backend's reply to [`Frame::Handshake`].
    HandshakeAck(HandshakeAck),
    /// A client request addressed to a route.
    Request(Request),
    /// A backend reply; streams send several with one correlation id.
    Response(Reply),
    /// An intermediate backend notification belonging to an exchange.
    Event(Reply),
}

impl Frame {
    /// Short name of the frame type, as written on the wire.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Handshake(_) => "handshake",
            Self::HandshakeAck(_) => "handshake_ack",
            Self::Request(_) => "request",
            Self::Response(_) => "response",
            Self::Event(_) => "event",
        }
    }
}

/// Client identification sent when a session opens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Handshake {
    /// Always [`PROTOCOL_NAME`].
    pub protocol: String,
    /// Always [`PROTOCOL_VERSION`].
    pub version: u32,
    /// Free-form client identifier.
    pub client: String,
}

impl Handshake {
    /// Builds a handshake for the current protocol.
    #[must_use]
    pub fn new(client: impl Into<String>) -> Self {
        Self {
            protocol: PROTOCOL_NAME.to_owned(),
            version: PROTOCOL_VERSION,
            client: client.into(),
        }
    }
}

/// Backend acknowledgement of a handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeAck {
    /// Protocol the backend speaks.
    pub protocol: String,
    /// Protocol version the backend speaks.
    pub version: u32,
    /// Free-form server identifier.
    #[serde(default)]
    pub server: String,
}

/// A request addressed to a backend route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Operation route, for example `/v1/query`.
    pub path: String,
    /// Identifier echoed by every reply of this exchange.
    pub correlation_id: String,
    /// Operation payload.
    #[serde(default)]
    pub body: Value,
}

/// A backend reply, terminal or intermediate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    /// HTTP-like status code.
    pub status: u16,
    /// Identifier copied from the request.
    pub correlation_id: String,
    /// Operation payload.
    #[serde(default)]
    pub body: Value,
}

impl Reply {
    /// `true` when the status reports an error.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.status >= STATUS_ERROR_THRESHOLD
    }
}

/// Framing failures, before any session-level interpretation.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The peer closed the stream cleanly before the first byte of a frame.
    #[error("stream closed")]
    Closed,
    /// The stream ended part-way through a frame.
    #[error("stream ended part-way through a frame")]
    UnexpectedEof,
    /// The bytes on the wire do not form a valid frame.
    #[error("{0}")]
    Malformed(String),
    /// The frame could not be serialised.
    #[error("failed to serialise frame: {0}")]
    Encode(#[source] serde_json::Error),
    /// Reading or writing the underlying stream failed.
    #[error(transparent)]
    Io(io::Error),
}

impl CodecError {
    /// Returns the underlying I/O error kind, if any.
    #[must_use]
    pub fn io_kind(&self) -> Option<io::ErrorKind> {
        match self {
            Self::Io(error) => Some(error.kind()),
            _ => None,
        }
    }
}

/// Serialises a frame into its wire representation.
pub fn encode(frame: &Frame) -> Result<Vec<u8>, CodecError> {
    let payload = serde_json::to_vec(frame).map_err(CodecError::Encode)?;
    if payload.len() > MAX_FRAME_SIZE {
        return Err(CodecError::Malformed(format!(
            "frame of {} bytes exceeds the {MAX_FRAME_SIZE} byte limit",
            payload.len()
        )));
    }
    let prefix = format!("{}\n", payload.len());
    let mut bytes = Vec::with_capacity(prefix.len() + payload.len() + 1);
    bytes.extend_from_slice(prefix.as_bytes());
    bytes.extend_from_slice(&payload);
    bytes.push(b'\n');
    Ok(bytes)
}

/// Encodes `frame` and writes it in full, then flushes the writer.
pub fn write_frame<W: Write>(writer: &mut W, frame: &Frame) -> Result<(), CodecError> {
    let bytes = encode(frame)?;
    writer.write_all(&bytes).map_err(CodecError::Io)?;
    writer.flush().map_err(CodecError::Io)
}

/// Reads exactly one frame.
///
/// Returns [`CodecError::Closed`] when the stream ends before the first byte,
/// and [`CodecError::UnexpectedEof`] when it ends inside a frame.
pub fn read_frame<R: BufRead>(reader: &mut R) -> Result<Frame, CodecError> {
    let length = read_length_prefix(reader)?;
    let mut payload = vec![0_u8; length];
    reader.read_exact(&mut payload).map_err(eof_aware)?;

    let mut terminator = [0_u8; 1];
    reader.read_exact(&mut terminator).map_err(eof_aware)?;
    let [terminator_byte] = terminator;
    if terminator_byte != b'\n' {
        return Err(CodecError::Malformed(format!(
            "expected newline after payload, found byte 0x{terminator_byte:02x}"
        )));
    }

    serde_json::from_slice(&payload)
        .map_err(|error| CodecError::Malformed(format!("invalid frame payload: {error}")))
}

fn read_length_prefix<R: BufRead>(reader: &mut R) -> Result<usize, CodecError> {
    let mut line = Vec::with_capacity(MAX_PREFIX_LEN);
    let read = Read::take(reader.by_ref(), MAX_PREFIX_LEN as u64)
        .read_until(b'\n', &mut line)
        .map_err(CodecError::Io)?;
    if read == 0 {
        return Err(CodecError::Closed);
    }
    if line.last() != Some(&b'\n') {
        if read < MAX_PREFIX_LEN {
            return Err(CodecError::UnexpectedEof);
        }
        return Err(CodecError::Malformed(String::from(
            "length prefix is not terminated by a newline",
        )));
    }

    let text = std::str::from_utf8(&line)
        .map_err(|_| CodecError::Malformed(String::from("length prefix is not ASCII")))?
        .trim();
    let length: usize = text
        .parse()
        .map_err(|_| CodecError::Malformed(format!("invalid length prefix {text:?}")))?;
    if length > MAX_FRAME_SIZE {
        return Err(CodecError::Malformed(format!(
            "length prefix {length} exceeds the {MAX_FRAME_SIZE} byte limit"
        )));
    }
    Ok(length)
}

fn eof_aware(error: io::Error) -> CodecError {
    if error.kind() == io::ErrorKind::UnexpectedEof {
        CodecError::UnexpectedEof
    } else {
        CodecError::Io(error)
    }
}
