//! `ragadmin sources` commands.
//!
//! Arguments are validated before the backend is contacted, so a typo in a
//! source kind or status never opens a connection.

use std::io::Write;

use ragcli_ipc::{
    IpcError, OfflineGuard, SourceCreateRequest, SourceKind, SourceListRequest,
    SourceMutationResponse, SourceRemoveRequest, SourceStatus, SourceUpdateRequest, new_id,
};

use super::CommandContext;
use crate::AppError;
use crate::audit::AuditEntry;
use crate::cli::{SourceAddArgs, SourceRemoveArgs, SourceUpdateArgs, SourcesCommand};
use crate::output::sources::{Mutation, render_list, render_mutation};

pub(super) fn run<W: Write>(
    context: &CommandContext<'_>,
    command: SourcesCommand,
    out: &mut W,
) -> Result<(), AppError> {
    match command {
        SourcesCommand::List => list(context, out),
        SourcesCommand::Add(args) => add(context, args, out),
        SourcesCommand::Update(args) => update(context, args, out),
        SourcesCommand::Remove(args) => remove(context, args, out),
    }
}

fn list<W: Write>(context: &CommandContext<'_>, out: &mut W) -> Result<(), AppError> {
    let mut client = context.connect()?;
    let response = client.list_sources(SourceListRequest::default(), &context.call_options())?;
    client.close();
    render_list(out, context.output(), &response)
}

fn add<W: Write>(
    context: &CommandContext<'_>,
    args: SourceAddArgs,
    out: &mut W,
) -> Result<(), AppError> {
    let kind: SourceKind = args.kind.parse()?;
    ensure_local(&args.path)?;
    let request = SourceCreateRequest {
        trace_id: new_id(),
        alias: args.alias,
        language: Some(args.language),
        notes: args.notes,
        checksum: args.checksum,
        ..SourceCreateRequest::new(kind, args.path)
    }
    .normalized()?;
    let trace_id = request.trace_id.clone();

    let mut client = context.connect()?;
    let response = client.create_source(request, &context.call_options())?;
    client.close();

    render_mutation(out, context.output(), Mutation::Added, &response)?;
    record(
        context,
        "source_add",
        &response,
        &trace_id,
        format!("location={}", response.source.location),
    );
    Ok(())
}

fn update<W: Write>(
    context: &CommandContext<'_>,
    args: SourceUpdateArgs,
    out: &mut W,
) -> Result<(), AppError> {
    let status = args
        .status
        .as_deref()
        .map(str::trim)
        .filter(|status| !status.is_empty())
        .map(str::parse::<SourceStatus>)
        .transpose()?;
    if let Some(path) = args.path.as_deref() {
        ensure_local(path)?;
    }
    let request = SourceUpdateRequest {
        trace_id: new_id(),
        location: args.path,
        language: args.language,
        status,
        notes: args.notes,
    }
    .normalized();
    if request.is_empty() {
        return Err(IpcError::InvalidArgument(String::from(
            "at least one of --path, --language, --status, or --notes is required",
        ))
        .into());
    }
    let trace_id = request.trace_id.clone();

    let mut client = context.connect()?;
    let response = client.update_source(&args.alias, request, &context.call_options())?;
    client.close();

    render_mutation(out, context.output(), Mutation::Updated, &response)?;
    record(context, "source_update", &response, &trace_id, "metadata updated");
    Ok(())
}

fn remove<W: Write>(
    context: &CommandContext<'_>,
    args: SourceRemoveArgs,
    out: &mut W,
) -> Result<(), AppError> {
    let request = SourceRemoveRequest {
        trace_id: new_id(),
        ..SourceRemoveRequest::new(args.reason)
    }
    .normalized()?;
    let trace_id = request.trace_id.clone();
    let details = format!("reason={}", request.reason);

    let mut client = context.connect()?;
    let response = client.remove_source(&args.alias, request, &context.call_options())?;
    client.close();

    render_mutation(out, context.output(), Mutation::Removed, &response)?;
    record(context, "source_remove", &response, &trace_id, details);
    Ok(())
}

/// Source locations that look like URLs must stay on this machine.
fn ensure_local(location: &str) -> Result<(), IpcError> {
    if location.contains("://") {
        OfflineGuard::ensure_loopback(location.trim())
    } else {
        Ok(())
    }
}

fn record(
    context: &CommandContext<'_>,
    action: &str,
    response: &SourceMutationResponse,
    trace_id: &str,
    details: impl Into<String>,
) {
    let trace = response.trace_id.as_deref().unwrap_or(trace_id);
    context.audit().record(
        &AuditEntry::new(action, response.source.alias.as_str(), "success")
            .with_trace_id(Some(trace))
            .with_details(details),
    );
}
