//! Command-line front ends for the local RAG backend.
//!
//! Two binaries share this runtime: `ragadmin`, which checks health,
//! initialises the backend, rebuilds the index, and manages the source
//! catalog; and `ragman`, which asks questions and prints cited answers.
//!
//! Both follow the same sequence: split leading configuration flags from the
//! command, parse the command with `clap`, load and validate the layered
//! configuration, install diagnostics, and then run the command against the
//! backend socket while the offline guard keeps any outbound URL on the
//! loopback interface. Results go to stdout; errors are printed to stderr and
//! turned into a failing exit code.

use std::ffi::OsString;
use std::io::Write;
use std::process::ExitCode;

use ragcli_ipc::OfflineGuard;
use tracing::debug;

mod audit;
mod cli;
mod commands;
mod config;
mod errors;
mod output;
mod telemetry;

use cli::{AdminCli, ManCli};
use commands::{CommandContext, Program};
use config::{ConfigLoader, OrthoConfigLoader, prepare_cli_arguments, split_config_arguments};
pub(crate) use errors::AppError;

const RUNNER_TARGET: &str = "ragcli::runner";

/// CLI flags recognised by the configuration loader.
///
/// MAINTENANCE: This list must be kept in sync with the fields of
/// `ragcli_config::Config`. When adding new configuration options, update
/// this array accordingly.
const CONFIG_CLI_FLAGS: &[&str] = &[
    "--config-path",
    "--socket",
    "--log-filter",
    "--log-format",
    "--output",
    "--client-id",
    "--dial-timeout-ms",
    "--handshake-timeout-ms",
    "--request-timeout-secs",
    "--stream-stall-secs",
    "--audit-log",
    "--min-confidence-percent",
];

/// Bundles the output streams handed to the runtime.
pub(crate) struct IoStreams<'a, W: Write, E: Write> {
    pub(crate) stdout: &'a mut W,
    pub(crate) stderr: &'a mut E,
}

impl<'a, W: Write, E: Write> IoStreams<'a, W, E> {
    pub(crate) const fn new(stdout: &'a mut W, stderr: &'a mut E) -> Self {
        Self { stdout, stderr }
    }
}

struct CliRunner<'a, 'io, W: Write, E: Write, L: ConfigLoader> {
    io: &'a mut IoStreams<'io, W, E>,
    loader: &'a L,
}

impl<'a, 'io, W, E, L> CliRunner<'a, 'io, W, E, L>
where
    W: Write,
    E: Write,
    L: ConfigLoader,
{
    const fn new(io: &'a mut IoStreams<'io, W, E>, loader: &'a L) -> Self {
        Self { io, loader }
    }

    fn run<P, I>(&mut self, args: I) -> ExitCode
    where
        P: Program,
        I: IntoIterator<Item = OsString>,
    {
        match self.try_run::<P, I>(args) {
            Ok(exit_code) => exit_code,
            Err(error) => {
                if let Err(write_error) = writeln!(self.io.stderr, "{error}") {
                    debug!(target: RUNNER_TARGET, error = %write_error, "failed to report error");
                }
                ExitCode::FAILURE
            }
        }
    }

    fn try_run<P, I>(&mut self, args: I) -> Result<ExitCode, AppError>
    where
        P: Program,
        I: IntoIterator<Item = OsString>,
    {
        let arguments: Vec<OsString> = args.into_iter().collect();
        let split = split_config_arguments(&arguments);
        let program = match P::try_parse_from(prepare_cli_arguments(&arguments, &split)) {
            Ok(program) => program,
            Err(error) if !error.use_stderr() => {
                write!(self.io.stdout, "{}", error.render())?;
                return Ok(ExitCode::SUCCESS);
            }
            Err(error) => return Err(AppError::CliUsage(error)),
        };

        let config = self.loader.load(&split.config_arguments)?;
        config.validate()?;
        telemetry::initialise(&config)?;

        let _offline = OfflineGuard::install();
        let context = CommandContext::new(&config, program.global(), P::CLIENT_ID);
        program.execute(&context, &mut *self.io.stdout)?;
        self.io.stdout.flush()?;
        Ok(ExitCode::SUCCESS)
    }
}

/// Runs `ragadmin` with the given arguments and output streams.
#[must_use]
pub fn run_admin<I, W, E>(args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    let mut io = IoStreams::new(stdout, stderr);
    run_with_loader::<AdminCli, _, _, _, _>(args, &mut io, &OrthoConfigLoader)
}

/// Runs `ragman` with the given arguments and output streams.
#[must_use]
pub fn run_man<I, W, E>(args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    let mut io = IoStreams::new(stdout, stderr);
    run_with_loader::<ManCli, _, _, _, _>(args, &mut io, &OrthoConfigLoader)
}

/// Runs program `P` with a custom configuration loader.
pub(crate) fn run_with_loader<P, I, W, E, L>(
    args: I,
    io: &mut IoStreams<'_, W, E>,
    loader: &L,
) -> ExitCode
where
    P: Program,
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
    L: ConfigLoader,
{
    CliRunner::new(io, loader).run::<P, I>(args)
}

#[cfg(test)]
mod tests;
