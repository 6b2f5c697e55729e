//! Command execution shared by both front ends.

use std::io::Write;

use camino::Utf8PathBuf;
use clap::Parser;
use ragcli_config::{Config, OutputFormat};
use ragcli_ipc::{CallOptions, Client, SessionSettings};
use tracing::debug;

use crate::AppError;
use crate::audit::AuditLog;
use crate::cli::GlobalArgs;

mod admin;
mod query;
mod sources;

const COMMAND_TARGET: &str = "ragcli::commands";

/// A parsed front end that knows how to run itself.
pub(crate) trait Program: Parser {
    /// Identifier announced in the handshake unless configuration overrides it.
    const CLIENT_ID: &'static str;

    fn global(&self) -> &GlobalArgs;

    fn execute<W: Write>(self, context: &CommandContext<'_>, out: &mut W) -> Result<(), AppError>;
}

/// Everything a command needs besides its own arguments.
pub(crate) struct CommandContext<'a> {
    config: &'a Config,
    output: OutputFormat,
    socket: Utf8PathBuf,
    client_id: &'static str,
    audit: AuditLog,
}

impl<'a> CommandContext<'a> {
    /// Command-line flags win over configured values.
    pub(crate) fn new(config: &'a Config, global: &GlobalArgs, client_id: &'static str) -> Self {
        Self {
            config,
            output: global.output.unwrap_or_else(|| config.output()),
            socket: global
                .socket
                .clone()
                .unwrap_or_else(|| config.socket_path()),
            client_id,
            audit: AuditLog::new(config.audit_log_path()),
        }
    }

    pub(crate) const fn config(&self) -> &Config {
        self.config
    }

    pub(crate) const fn output(&self) -> OutputFormat {
        self.output
    }

    pub(crate) const fn audit(&self) -> &AuditLog {
        &self.audit
    }

    pub(crate) fn settings(&self) -> SessionSettings {
        SessionSettings::new(self.socket.clone())
            .with_client_id(self.config.client_id().unwrap_or(self.client_id))
            .with_dial_timeout(self.config.dial_timeout())
            .with_handshake_timeout(self.config.handshake_timeout())
            .with_stall_timeout(self.config.stream_stall_timeout())
    }

    pub(crate) fn connect(&self) -> Result<Client, AppError> {
        debug!(target: COMMAND_TARGET, socket = %self.socket, "connecting to backend");
        Ok(Client::connect(&self.settings())?)
    }

    /// Options for single-response calls, bounded by the request timeout.
    pub(crate) fn call_options(&self) -> CallOptions {
        CallOptions::new().with_timeout(self.config.request_timeout())
    }
}
