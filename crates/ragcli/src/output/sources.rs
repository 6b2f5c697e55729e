//! Source catalog listings and mutation acknowledgements.

use std::io::Write;

use ragcli_config::OutputFormat;
use ragcli_ipc::{SourceListResponse, SourceMutationResponse};

use super::{Table, format_bytes, write_pretty_json};
use crate::AppError;

pub(crate) fn render_list<W: Write>(
    out: &mut W,
    format: OutputFormat,
    response: &SourceListResponse,
) -> Result<(), AppError> {
    if format.is_json() {
        return write_pretty_json(out, response);
    }

    let mut table = Table::new(["ALIAS", "TYPE", "STATUS", "LANGUAGE", "SIZE", "LOCATION"]);
    for source in &response.sources {
        table.push([
            source.alias.clone(),
            source.source_type.to_lowercase(),
            source.status.to_lowercase(),
            source.language.clone(),
            format_bytes(source.size_bytes),
            source.location.clone(),
        ]);
    }
    write!(out, "{}", table.render())?;
    if !response.updated_at.trim().is_empty() {
        writeln!(out, "\nCatalog updated: {}", response.updated_at)?;
    }
    Ok(())
}

/// Which mutation produced a [`SourceMutationResponse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mutation {
    Added,
    Updated,
    Removed,
}

pub(crate) fn render_mutation<W: Write>(
    out: &mut W,
    format: OutputFormat,
    mutation: Mutation,
    response: &SourceMutationResponse,
) -> Result<(), AppError> {
    if format.is_json() {
        return write_pretty_json(out, response);
    }

    let source = &response.source;
    match mutation {
        Mutation::Added => {
            writeln!(
                out,
                "Source {} queued for ingestion (status {})",
                source.alias, source.status
            )?;
            if let Some(job) = &response.ingestion_job {
                writeln!(
                    out,
                    "Ingestion job {} ({}) requested at {}",
                    job.job_id,
                    job.normalized_status(),
                    job.requested_at
                )?;
            }
        }
        Mutation::Updated => {
            writeln!(
                out,
                "metadata updated for {} (status {})",
                source.alias, source.status
            )?;
        }
        Mutation::Removed => {
            writeln!(
                out,
                "Source {} quarantined (status {})",
                source.alias, source.status
            )?;
            if let Some(reason) = response
                .quarantine
                .as_ref()
                .map(|quarantine| quarantine.reason.trim())
                .filter(|reason| !reason.is_empty())
            {
                writeln!(out, "Reason: {reason}")?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use ragcli_ipc::SourceRecord;
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    fn record(alias: &str, status: &str) -> SourceRecord {
        serde_json::from_value(json!({
            "alias": alias,
            "type": "MAN",
            "location": "/usr/share/man",
            "language": "en",
            "size_bytes": 2048,
            "last_updated": "2026-10-01T00:00:00Z",
            "status": status,
        }))
        .expect("source record")
    }

    fn mutation(value: serde_json::Value) -> SourceMutationResponse {
        serde_json::from_value(value).expect("mutation response")
    }

    #[test]
    fn list_renders_a_table_and_catalog_timestamp() {
        let response = SourceListResponse {
            sources: vec![record("man-pages", "ACTIVE")],
            updated_at: String::from("2026-10-18T12:00:00Z"),
            trace_id: None,
        };
        let mut out = Vec::new();
        render_list(&mut out, OutputFormat::Table, &response).expect("render list");

        assert_eq!(
            String::from_utf8(out).expect("utf-8"),
            "ALIAS      TYPE  STATUS  LANGUAGE  SIZE    LOCATION\n\
             man-pages  man   active  en        2.0KiB  /usr/share/man\n\
             \n\
             Catalog updated: 2026-10-18T12:00:00Z\n"
        );
    }

    #[rstest]
    #[case(
        Mutation::Updated,
        json!({"source": {"alias": "man-pages", "status": "active"}}),
        "metadata updated for man-pages (status active)\n"
    )]
    #[case(
        Mutation::Removed,
        json!({
            "source": {"alias": "wiki", "status": "quarantined"},
            "quarantine": {"reason": "corrupt archive", "requested": "2026-10-18T12:00:00Z"}
        }),
        "Source wiki quarantined (status quarantined)\nReason: corrupt archive\n"
    )]
    #[case(
        Mutation::Added,
        json!({
            "source": {"alias": "docs", "status": "pending_validation"},
            "ingestion_job": {"job_id": "job-9", "status": "queued", "requested_at": "2026-10-18T12:00:00Z"}
        }),
        "Source docs queued for ingestion (status pending_validation)\n\
         Ingestion job job-9 (queued) requested at 2026-10-18T12:00:00Z\n"
    )]
    fn mutations_render_a_summary(
        #[case] kind: Mutation,
        #[case] value: serde_json::Value,
        #[case] expected: &str,
    ) {
        let mut out = Vec::new();
        render_mutation(&mut out, OutputFormat::Table, kind, &mutation(value))
            .expect("render mutation");
        assert_eq!(String::from_utf8(out).expect("utf-8"), expected);
    }
}
