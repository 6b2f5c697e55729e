//! `ragman query`.

use std::io::Write;
use std::time::Duration;

use ragcli_ipc::{CallOptions, QueryRequest, new_id};
use tracing::info;

use super::{COMMAND_TARGET, CommandContext, Program};
use crate::AppError;
use crate::cli::{GlobalArgs, ManCli, ManCommand, QueryArgs};
use crate::output::answer::{Presenter, render_answer};

impl Program for ManCli {
    const CLIENT_ID: &'static str = "ragman-cli";

    fn global(&self) -> &GlobalArgs {
        &self.global
    }

    fn execute<W: Write>(self, context: &CommandContext<'_>, out: &mut W) -> Result<(), AppError> {
        match self.command {
            ManCommand::Query(args) => query(context, args, out),
        }
    }
}

fn query<W: Write>(
    context: &CommandContext<'_>,
    args: QueryArgs,
    out: &mut W,
) -> Result<(), AppError> {
    let presenter = Presenter::resolve(args.plain, context.output())?;
    let request = QueryRequest {
        trace_id: new_id(),
        conversation_id: args.conversation,
        max_context_tokens: args.context_tokens.unwrap_or_default(),
        ..QueryRequest::new(args.question.join(" "))
    }
    .normalized()?;
    info!(
        target: COMMAND_TARGET,
        trace_id = %request.trace_id,
        presenter = ?presenter,
        context_tokens = request.max_context_tokens,
        "query started"
    );

    let options = args.timeout.map_or_else(
        || context.call_options(),
        |seconds| CallOptions::new().with_timeout(Duration::from_secs(seconds)),
    );
    let mut client = context.connect()?;
    let response = client.query(request, &options)?;
    client.close();

    info!(
        target: COMMAND_TARGET,
        trace_id = %response.trace_id,
        confidence = response.confidence,
        no_answer = response.no_answer,
        latency_ms = response.latency_ms,
        "query completed"
    );
    render_answer(
        out,
        presenter,
        &response,
        context.config().confidence_threshold_percent(),
    )
}
