//! Resolution of the backend socket path.
//!
//! The path comes from, in order: an explicit value (CLI flag or config
//! file), the `RAGCLI_SOCKET` environment variable, the user's runtime
//! directory, and finally the system temporary directory. Blank values at any
//! layer are ignored so an empty flag does not mask the environment.

use std::env;

use camino::{Utf8Path, Utf8PathBuf};

use crate::defaults::{fallback_base_directory, runtime_base_directory, socket_path_under};

/// Environment variable naming the backend socket.
pub const SOCKET_ENV_VAR: &str = "RAGCLI_SOCKET";

/// Resolves the backend socket path against the live process environment.
#[must_use]
pub fn resolve_socket_path(explicit: Option<&Utf8Path>) -> Utf8PathBuf {
    let from_env = env::var(SOCKET_ENV_VAR).ok();
    SocketSources {
        explicit,
        environment: from_env.as_deref(),
        runtime_dir: runtime_base_directory(),
        temp_dir: fallback_base_directory(),
    }
    .resolve()
}

/// Inputs consulted when resolving the socket path.
///
/// Kept separate from the process environment so callers and tests can
/// evaluate the precedence rules deterministically.
#[derive(Debug, Clone)]
pub struct SocketSources<'a> {
    /// Value supplied on the command line or in the config file.
    pub explicit: Option<&'a Utf8Path>,
    /// Value of [`SOCKET_ENV_VAR`], if set.
    pub environment: Option<&'a str>,
    /// The user's runtime directory (`$XDG_RUNTIME_DIR`), if known.
    pub runtime_dir: Option<Utf8PathBuf>,
    /// Directory used when no runtime directory exists.
    pub temp_dir: Utf8PathBuf,
}

impl SocketSources<'_> {
    /// Applies the precedence rules and returns the chosen path.
    #[must_use]
    pub fn resolve(self) -> Utf8PathBuf {
        if let Some(path) = self.explicit.filter(|path| !path.as_str().trim().is_empty()) {
            return path.to_path_buf();
        }
        if let Some(value) = self.environment.map(str::trim).filter(|value| !value.is_empty()) {
            return Utf8PathBuf::from(value);
        }
        socket_path_under(self.runtime_dir.unwrap_or(self.temp_dir))
    }
}
