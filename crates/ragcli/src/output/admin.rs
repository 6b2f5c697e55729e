//! Health and initialisation summaries.

use std::io::Write;

use ragcli_config::OutputFormat;
use ragcli_ipc::{HealthSummary, InitResponse};
use serde::Serialize;

use super::{Table, component_label, write_pretty_json};
use crate::AppError;

pub(crate) fn render_health<W: Write>(
    out: &mut W,
    format: OutputFormat,
    summary: &HealthSummary,
) -> Result<(), AppError> {
    if format.is_json() {
        return write_pretty_json(out, summary);
    }

    writeln!(
        out,
        "Overall Status: {}",
        summary.overall_status.trim().to_uppercase()
    )?;
    if !summary.trace_id.trim().is_empty() {
        writeln!(out, "Trace ID: {}", summary.trace_id)?;
    }
    if summary.results.is_empty() {
        writeln!(out, "No component checks reported.")?;
        return Ok(());
    }

    let mut table = Table::new(["COMPONENT", "STATUS", "DETAILS"]);
    for result in &summary.results {
        let status = match result.status.trim() {
            "" => String::from("UNKNOWN"),
            status => status.to_uppercase(),
        };
        table.push([component_label(&result.component), status, result.message.clone()]);
        if let Some(remediation) = non_blank(result.remediation.as_deref()) {
            table.push(["  Remediation", "", remediation]);
        }
    }
    write!(out, "{}", table.render())?;
    Ok(())
}

#[derive(Serialize)]
struct InitDocument<'a> {
    init: &'a InitResponse,
    seeded_count: usize,
}

pub(crate) fn render_init<W: Write>(
    out: &mut W,
    format: OutputFormat,
    response: &InitResponse,
) -> Result<(), AppError> {
    if format.is_json() {
        return write_pretty_json(
            out,
            &InitDocument {
                init: response,
                seeded_count: response.seeded_sources.len(),
            },
        );
    }

    writeln!(out, "Catalog Version: {}", response.catalog_version)?;
    if !response.created_directories.is_empty() {
        writeln!(out, "Created:")?;
        for directory in &response.created_directories {
            writeln!(out, "  - {directory}")?;
        }
    }

    writeln!(out, "Seeded Sources:")?;
    if response.seeded_sources.is_empty() {
        writeln!(out, "  (no new sources)")?;
    } else {
        let mut table = Table::new(["ALIAS", "TYPE", "STATUS", "LOCATION"]);
        for source in &response.seeded_sources {
            table.push([
                source.alias.clone(),
                source.source_type.to_uppercase(),
                source.status.to_uppercase(),
                source.location.clone(),
            ]);
        }
        write!(out, "{}", table.render())?;
    }

    if !response.dependency_checks.is_empty() {
        writeln!(out, "Dependencies:")?;
        for check in &response.dependency_checks {
            writeln!(
                out,
                "  - {}: {} ({})",
                component_label(&check.name),
                check.status.to_uppercase(),
                check.message
            )?;
            if let Some(remediation) = non_blank(check.remediation.as_deref()) {
                writeln!(out, "      Remediation: {remediation}")?;
            }
        }
    }
    Ok(())
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|text| !text.is_empty())
}
