//! Error types for the command-line front ends.

use std::io;
use std::sync::Arc;

use ragcli_config::ConfigError;
use ragcli_ipc::IpcError;
use thiserror::Error;

use crate::telemetry::TelemetryError;

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("failed to load configuration: {0}")]
    LoadConfiguration(Arc<ortho_config::OrthoError>),
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(#[from] ConfigError),
    #[error("{0}")]
    CliUsage(clap::Error),
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    #[error(transparent)]
    Ipc(#[from] IpcError),
    #[error("--plain cannot be combined with --output json")]
    ConflictingPresenters,
    #[error("failed to write output: {0}")]
    WriteOutput(#[source] io::Error),
    #[error("failed to encode output: {0}")]
    EncodeOutput(#[source] serde_json::Error),
}

impl From<io::Error> for AppError {
    fn from(error: io::Error) -> Self {
        Self::WriteOutput(error)
    }
}
