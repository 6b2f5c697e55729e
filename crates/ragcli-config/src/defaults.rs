use std::env;
use std::time::Duration;

use camino::Utf8PathBuf;

#[cfg(unix)]
use dirs::{data_dir, runtime_dir};

use crate::formats::{LogFormat, OutputFormat};

/// Directory name shared by the socket, audit log, and config files.
pub const APP_DIRECTORY: &str = "ragcli";

/// File name of the backend socket inside [`APP_DIRECTORY`].
pub const SOCKET_FILE_NAME: &str = "backend.sock";

/// File name of the JSON Lines audit log inside [`APP_DIRECTORY`].
pub const AUDIT_LOG_FILE_NAME: &str = "audit.log";

/// Default log filter expression used by the binaries.
///
/// Command output goes to stdout, so diagnostics stay quiet unless asked for.
pub const DEFAULT_LOG_FILTER: &str = "warn";

/// Time allowed for the Unix socket connect.
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(2);

/// Time allowed for the backend to acknowledge the handshake.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(2);

/// End-to-end deadline applied to single-response calls.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum silence tolerated between two frames of a streamed job.
pub const DEFAULT_STREAM_STALL_TIMEOUT: Duration = Duration::from_secs(600);

/// Answers below this confidence are presented as "no answer".
pub const DEFAULT_MIN_CONFIDENCE_PERCENT: u8 = 35;

/// Default log filter expression used by the binaries.
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Default logging format for the binaries.
pub fn default_log_format() -> LogFormat {
    LogFormat::Compact
}

/// Default presentation for command results.
pub fn default_output_format() -> OutputFormat {
    OutputFormat::Table
}

/// Computes the socket path used when neither a flag nor the environment
/// names one: `$XDG_RUNTIME_DIR/ragcli/backend.sock`, falling back to the
/// system temporary directory.
pub fn default_socket_path() -> Utf8PathBuf {
    let base = runtime_base_directory().unwrap_or_else(fallback_base_directory);
    socket_path_under(base)
}

/// Default audit log location, `$XDG_DATA_HOME/ragcli/audit.log`.
///
/// Returns `None` when the platform exposes no user data directory.
pub fn default_audit_log_path() -> Option<Utf8PathBuf> {
    data_base_directory().map(|base| base.join(APP_DIRECTORY).join(AUDIT_LOG_FILE_NAME))
}

pub(crate) fn socket_path_under(base: Utf8PathBuf) -> Utf8PathBuf {
    base.join(APP_DIRECTORY).join(SOCKET_FILE_NAME)
}

#[cfg(unix)]
pub(crate) fn runtime_base_directory() -> Option<Utf8PathBuf> {
    runtime_dir().and_then(|path| Utf8PathBuf::from_path_buf(path).ok())
}

#[cfg(not(unix))]
pub(crate) fn runtime_base_directory() -> Option<Utf8PathBuf> {
    None
}

#[cfg(unix)]
fn data_base_directory() -> Option<Utf8PathBuf> {
    data_dir().and_then(|path| Utf8PathBuf::from_path_buf(path).ok())
}

#[cfg(not(unix))]
fn data_base_directory() -> Option<Utf8PathBuf> {
    None
}

pub(crate) fn fallback_base_directory() -> Utf8PathBuf {
    let candidate = env::temp_dir();
    Utf8PathBuf::from_path_buf(candidate).unwrap_or_else(|_| Utf8PathBuf::from("/tmp"))
}
