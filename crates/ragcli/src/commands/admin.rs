//! `ragadmin` commands: health, init, and reindex.

use std::io::Write;
use std::time::Instant;

use ragcli_ipc::{
    CallOptions, HealthRequest, IngestionJob, InitRequest, IpcError, ReindexRequest, new_id,
};
use tracing::{info, warn};

use super::{COMMAND_TARGET, CommandContext, Program, sources};
use crate::AppError;
use crate::audit::AuditEntry;
use crate::cli::{AdminCli, AdminCommand, GlobalArgs, ReindexArgs};
use crate::output::admin::{render_health, render_init};
use crate::output::progress::ReindexProgress;

impl Program for AdminCli {
    const CLIENT_ID: &'static str = "ragadmin-cli";

    fn global(&self) -> &GlobalArgs {
        &self.global
    }

    fn execute<W: Write>(self, context: &CommandContext<'_>, out: &mut W) -> Result<(), AppError> {
        match self.command {
            AdminCommand::Health => health(context, out),
            AdminCommand::Init => init(context, out),
            AdminCommand::Reindex(args) => reindex(context, &args, out),
            AdminCommand::Sources { command } => sources::run(context, command, out),
        }
    }
}

fn health<W: Write>(context: &CommandContext<'_>, out: &mut W) -> Result<(), AppError> {
    let mut client = context.connect()?;
    let summary = client.health_check(HealthRequest::default(), &context.call_options())?;
    client.close();

    render_health(out, context.output(), &summary)?;
    context.audit().record(
        &AuditEntry::new("admin_health", "*", "success")
            .with_trace_id(Some(summary.trace_id.as_str()))
            .with_details(format!(
                "overall={}",
                summary.overall_status.trim().to_lowercase()
            )),
    );
    Ok(())
}

fn init<W: Write>(context: &CommandContext<'_>, out: &mut W) -> Result<(), AppError> {
    let mut client = context.connect()?;
    let response = client.init_system(InitRequest::default(), &context.call_options())?;
    client.close();

    render_init(out, context.output(), &response)?;
    context.audit().record(
        &AuditEntry::new("admin_init", "*", "success")
            .with_trace_id(response.trace_id.as_deref())
            .with_details(format!("catalog_version={}", response.catalog_version)),
    );
    Ok(())
}

fn reindex<W: Write>(
    context: &CommandContext<'_>,
    args: &ReindexArgs,
    out: &mut W,
) -> Result<(), AppError> {
    let request = ReindexRequest {
        trace_id: new_id(),
        force: args.force,
        ..ReindexRequest::with_trigger(&args.trigger)?
    };
    let trace_id = request.trace_id.clone();
    info!(
        target: COMMAND_TARGET,
        trace_id = %trace_id,
        trigger = %request.trigger,
        force = request.force,
        streaming = !args.no_stream,
        "reindex requested"
    );

    let mut client = context.connect()?;
    let started = Instant::now();
    let mut progress = ReindexProgress::new(context.output());
    let outcome = if args.no_stream {
        client.start_reindex(request, &context.call_options())
    } else {
        // Bounded by the per-frame stall limit rather than the request timeout.
        client.start_reindex_stream(request, &CallOptions::new(), |job| {
            progress.handle(&mut *out, job)
        })
    };
    client.close();
    let elapsed = started.elapsed();

    let final_job = match &outcome {
        Ok(job) => Some(job),
        Err(error) => error.failed_job(),
    };
    if let Some(job) = final_job {
        progress.complete(out, job, elapsed)?;
        record_reindex(context, job, job.normalized_status().as_str(), &trace_id);
    } else {
        progress.finish_line(out)?;
        if let Some(job) = progress.last_job() {
            record_reindex(context, job, "error", &trace_id);
        }
    }

    match outcome {
        Ok(_) => Ok(()),
        Err(error) => {
            warn!(target: COMMAND_TARGET, trace_id = %trace_id, error = %error, "reindex failed");
            Err(reindex_error(error))
        }
    }
}

fn record_reindex(context: &CommandContext<'_>, job: &IngestionJob, status: &str, trace_id: &str) {
    context.audit().record(
        &AuditEntry::new("index_reindex", job.target(), status)
            .with_trace_id(Some(trace_id))
            .with_details(format!("stage={}", job.stage.trim())),
    );
}

/// Unwraps a rendering failure reported through the progress callback.
fn reindex_error(error: IpcError) -> AppError {
    match error {
        IpcError::CallbackAborted { source } => match source.downcast::<std::io::Error>() {
            Ok(io_error) => AppError::WriteOutput(*io_error),
            Err(original) => AppError::Ipc(IpcError::CallbackAborted { source: original }),
        },
        other => AppError::Ipc(other),
    }
}
