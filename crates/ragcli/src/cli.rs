//! Command-line definitions for `ragadmin` and `ragman`.

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use ragcli_config::OutputFormat;

/// Flags accepted by every subcommand of both front ends.
#[derive(Args, Debug, Clone, Default)]
pub(crate) struct GlobalArgs {
    /// Unix socket the backend listens on.
    #[arg(long, global = true, value_name = "PATH")]
    pub(crate) socket: Option<Utf8PathBuf>,
    /// Presentation of command results (`table` or `json`).
    #[arg(long, global = true, value_name = "FORMAT")]
    pub(crate) output: Option<OutputFormat>,
}

/// Administers the local RAG backend.
#[derive(Parser, Debug)]
#[command(name = "ragadmin", version, disable_help_subcommand = true)]
pub(crate) struct AdminCli {
    #[command(flatten)]
    pub(crate) global: GlobalArgs,
    #[command(subcommand)]
    pub(crate) command: AdminCommand,
}

#[derive(Subcommand, Debug)]
pub(crate) enum AdminCommand {
    /// Reports the health of every backend component.
    Health,
    /// Prepares directories, seeds the catalog, and checks dependencies.
    Init,
    /// Rebuilds the index and follows its progress.
    Reindex(ReindexArgs),
    /// Manages the source catalog.
    Sources {
        #[command(subcommand)]
        command: SourcesCommand,
    },
}

#[derive(Args, Debug)]
pub(crate) struct ReindexArgs {
    /// What requested the rebuild: `manual`, `init`, or `scheduled`.
    #[arg(long, default_value = "manual")]
    pub(crate) trigger: String,
    /// Rebuild even when source checksums are unchanged.
    #[arg(long)]
    pub(crate) force: bool,
    /// Return once the job is accepted instead of following it.
    #[arg(long)]
    pub(crate) no_stream: bool,
}

#[derive(Subcommand, Debug)]
pub(crate) enum SourcesCommand {
    /// Lists every catalog entry.
    List,
    /// Registers a new source and queues its ingestion.
    Add(SourceAddArgs),
    /// Changes the metadata of a source.
    Update(SourceUpdateArgs),
    /// Quarantines a source.
    Remove(SourceRemoveArgs),
}

#[derive(Args, Debug)]
pub(crate) struct SourceAddArgs {
    /// Alias for the new source; the backend derives one when omitted.
    #[arg(long)]
    pub(crate) alias: Option<String>,
    /// Source kind: `man`, `kiwix`, or `info`.
    #[arg(long = "type", value_name = "KIND")]
    pub(crate) kind: String,
    /// Filesystem path of the source.
    #[arg(long)]
    pub(crate) path: String,
    /// Content language.
    #[arg(long, default_value = "en")]
    pub(crate) language: String,
    /// Operator notes.
    #[arg(long)]
    pub(crate) notes: Option<String>,
    /// Expected content checksum.
    #[arg(long)]
    pub(crate) checksum: Option<String>,
}

#[derive(Args, Debug)]
pub(crate) struct SourceUpdateArgs {
    /// Alias of the source to change.
    pub(crate) alias: String,
    /// New filesystem path.
    #[arg(long)]
    pub(crate) path: Option<String>,
    /// New content language.
    #[arg(long)]
    pub(crate) language: Option<String>,
    /// New catalog status.
    #[arg(long)]
    pub(crate) status: Option<String>,
    /// New operator notes.
    #[arg(long)]
    pub(crate) notes: Option<String>,
}

#[derive(Args, Debug)]
pub(crate) struct SourceRemoveArgs {
    /// Alias of the source to quarantine.
    pub(crate) alias: String,
    /// Why the source is being removed.
    #[arg(long)]
    pub(crate) reason: String,
}

/// Answers questions from the local knowledge sources.
#[derive(Parser, Debug)]
#[command(name = "ragman", version, disable_help_subcommand = true)]
pub(crate) struct ManCli {
    #[command(flatten)]
    pub(crate) global: GlobalArgs,
    #[command(subcommand)]
    pub(crate) command: ManCommand,
}

#[derive(Subcommand, Debug)]
pub(crate) enum ManCommand {
    /// Asks the backend a question and prints the cited answer.
    Query(QueryArgs),
}

#[derive(Args, Debug)]
pub(crate) struct QueryArgs {
    /// The question; several words are joined with spaces.
    #[arg(required = true, num_args = 1.., value_name = "QUESTION")]
    pub(crate) question: Vec<String>,
    /// Conversation identifier to keep context between questions.
    #[arg(long)]
    pub(crate) conversation: Option<String>,
    /// Upper bound on retrieved context tokens.
    #[arg(long, value_name = "TOKENS")]
    pub(crate) context_tokens: Option<u32>,
    /// Overrides the request timeout, in seconds.
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    pub(crate) timeout: Option<u64>,
    /// Plain labels instead of underlined headings.
    #[arg(long)]
    pub(crate) plain: bool,
}
