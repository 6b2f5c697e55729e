//! Layered configuration shared by the `ragadmin` and `ragman` front ends.
//!
//! Values merge in the order CLI flag, `RAGCLI_*` environment variable,
//! configuration file, then built-in default. Every field is optional in the
//! raw [`Config`] so a missing layer never masks a lower one; the accessor
//! methods apply the built-in defaults.

use std::ffi::OsString;
use std::sync::Arc;
use std::time::Duration;

use camino::Utf8PathBuf;
use ortho_config::{OrthoConfig, OrthoError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod defaults;
mod formats;
mod socket;

pub use defaults::{
    APP_DIRECTORY, AUDIT_LOG_FILE_NAME, DEFAULT_DIAL_TIMEOUT, DEFAULT_HANDSHAKE_TIMEOUT,
    DEFAULT_LOG_FILTER, DEFAULT_MIN_CONFIDENCE_PERCENT, DEFAULT_REQUEST_TIMEOUT,
    DEFAULT_STREAM_STALL_TIMEOUT, SOCKET_FILE_NAME,
    default_audit_log_path, default_log_filter, default_log_format, default_output_format,
    default_socket_path,
};
pub use formats::{FormatParseError, LogFormat, OutputFormat};
pub use socket::{SOCKET_ENV_VAR, SocketSources, resolve_socket_path};

/// Raw configuration as merged by `ortho_config`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "RAGCLI")]
#[serde(default)]
pub struct Config {
    /// Unix socket the backend listens on.
    pub socket: Option<Utf8PathBuf>,
    /// `tracing` filter directive, for example `ragcli_ipc=debug`.
    pub log_filter: Option<String>,
    /// Diagnostic log format written to stderr.
    pub log_format: Option<LogFormat>,
    /// Default presentation for command results.
    pub output: Option<OutputFormat>,
    /// Identifier announced in the handshake.
    pub client_id: Option<String>,
    /// Socket connect timeout in milliseconds.
    pub dial_timeout_ms: Option<u64>,
    /// Handshake acknowledgement timeout in milliseconds.
    pub handshake_timeout_ms: Option<u64>,
    /// End-to-end deadline for single-response calls, in seconds.
    pub request_timeout_secs: Option<u64>,
    /// Maximum silence between streamed frames, in seconds.
    pub stream_stall_secs: Option<u64>,
    /// Location of the JSON Lines audit log.
    pub audit_log: Option<Utf8PathBuf>,
    /// Answers below this confidence, in percent, are shown as "no answer".
    pub min_confidence_percent: Option<u8>,
}

/// Errors raised when a merged configuration is unusable.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A timeout was configured as zero.
    #[error("{field} must be greater than zero")]
    ZeroTimeout {
        /// Name of the offending field.
        field: &'static str,
    },
    /// The client identifier was configured but blank.
    #[error("client_id must not be blank")]
    BlankClientId,
    /// The confidence threshold exceeded 100 percent.
    #[error("min_confidence_percent must be between 0 and 100, got {0}")]
    ConfidenceOutOfRange(u8),
}

impl Config {
    /// Loads configuration from the given arguments, the environment, and
    /// any discovered configuration file.
    ///
    /// The first argument is treated as the program name.
    pub fn load_from_args<I>(args: I) -> Result<Self, Arc<OrthoError>>
    where
        I: IntoIterator<Item = OsString>,
    {
        <Self as OrthoConfig>::load_from_iter(args)
    }

    /// Rejects values that would make the transport unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let timeouts = [
            ("dial_timeout_ms", self.dial_timeout_ms),
            ("handshake_timeout_ms", self.handshake_timeout_ms),
            ("request_timeout_secs", self.request_timeout_secs),
            ("stream_stall_secs", self.stream_stall_secs),
        ];
        if let Some((field, _)) = timeouts.iter().find(|(_, value)| *value == Some(0)) {
            return Err(ConfigError::ZeroTimeout { field: *field });
        }
        if self
            .client_id
            .as_deref()
            .is_some_and(|value| value.trim().is_empty())
        {
            return Err(ConfigError::BlankClientId);
        }
        if let Some(percent) = self.min_confidence_percent.filter(|percent| *percent > 100) {
            return Err(ConfigError::ConfidenceOutOfRange(percent));
        }
        Ok(())
    }

    /// Socket path after applying the resolution rules in [`resolve_socket_path`].
    #[must_use]
    pub fn socket_path(&self) -> Utf8PathBuf {
        resolve_socket_path(self.socket.as_deref())
    }

    /// Log filter directive, defaulting to [`DEFAULT_LOG_FILTER`].
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter
            .as_deref()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or(DEFAULT_LOG_FILTER)
    }

    /// Diagnostic log format.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format.unwrap_or_else(default_log_format)
    }

    /// Result presentation used when the command line does not choose one.
    #[must_use]
    pub fn output(&self) -> OutputFormat {
        self.output.unwrap_or_else(default_output_format)
    }

    /// Configured client identifier, if any.
    #[must_use]
    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref().map(str::trim)
    }

    /// Socket connect timeout.
    #[must_use]
    pub fn dial_timeout(&self) -> Duration {
        self.dial_timeout_ms
            .map_or(DEFAULT_DIAL_TIMEOUT, Duration::from_millis)
    }

    /// Handshake acknowledgement timeout.
    #[must_use]
    pub fn handshake_timeout(&self) -> Duration {
        self.handshake_timeout_ms
            .map_or(DEFAULT_HANDSHAKE_TIMEOUT, Duration::from_millis)
    }

    /// End-to-end deadline for single-response calls.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout_secs
            .map_or(DEFAULT_REQUEST_TIMEOUT, Duration::from_secs)
    }

    /// Maximum silence between frames of a streamed job.
    #[must_use]
    pub fn stream_stall_timeout(&self) -> Duration {
        self.stream_stall_secs
            .map_or(DEFAULT_STREAM_STALL_TIMEOUT, Duration::from_secs)
    }

    /// Minimum answer confidence in whole percent, capped at 100.
    #[must_use]
    pub fn confidence_threshold_percent(&self) -> u8 {
        self.min_confidence_percent
            .unwrap_or(DEFAULT_MIN_CONFIDENCE_PERCENT)
            .min(100)
    }

    /// Audit log location, or `None` when no default location exists.
    #[must_use]
    pub fn audit_log_path(&self) -> Option<Utf8PathBuf> {
        self.audit_log.clone().or_else(default_audit_log_path)
    }
}
