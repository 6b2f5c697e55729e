//! Presenters for `ragman` answers.
//!
//! Answers whose confidence is below the configured threshold, or that the
//! backend flagged as unanswerable, are shown as a "no answer" notice rather
//! than as a summary with steps.

use std::collections::BTreeMap;
use std::io::Write;

use ragcli_config::OutputFormat;
use ragcli_ipc::QueryResponse;
use ragcli_ipc::messages::QueryReference;
use serde::Serialize;

use super::write_pretty_json;
use crate::AppError;

const DEFAULT_FALLBACK: &str = "Answer is below the confidence threshold. Please rephrase your query or refresh sources via ragadmin.";

/// How an answer is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Presenter {
    /// Underlined headings.
    Markdown,
    /// Upper-case labels without decoration, for scripts and screen readers.
    Plain,
    /// The response as a JSON document.
    Json,
}

impl Presenter {
    /// Picks the presenter from `--plain` and the effective output format.
    pub(crate) const fn resolve(plain: bool, format: OutputFormat) -> Result<Self, AppError> {
        match (plain, format) {
            (true, OutputFormat::Json) => Err(AppError::ConflictingPresenters),
            (true, OutputFormat::Table) => Ok(Self::Plain),
            (false, OutputFormat::Json) => Ok(Self::Json),
            (false, OutputFormat::Table) => Ok(Self::Markdown),
        }
    }
}

#[derive(Serialize)]
struct AnswerDocument<'a> {
    #[serde(flatten)]
    response: &'a QueryResponse,
    confidence_threshold: f64,
}

pub(crate) fn render_answer<W: Write>(
    out: &mut W,
    presenter: Presenter,
    response: &QueryResponse,
    threshold_percent: u8,
) -> Result<(), AppError> {
    let labels = match presenter {
        Presenter::Json => {
            return write_pretty_json(
                out,
                &AnswerDocument {
                    response,
                    confidence_threshold: fraction(threshold_percent),
                },
            );
        }
        Presenter::Markdown => &MARKDOWN,
        Presenter::Plain => &PLAIN,
    };

    let mut sections = vec![format!(
        "Confidence {}% (threshold {threshold_percent}%)",
        confidence_percent(response.confidence)
    )];
    if is_fallback(response, threshold_percent) {
        sections.push(format!("No answer found\n---------------\n{}", fallback_body(response)));
    } else {
        sections.extend(answer_sections(response, labels));
    }
    let trace_id = response.trace_id.trim();
    if !trace_id.is_empty() {
        sections.push(format!("{}: {trace_id}", labels.trace));
    }

    writeln!(out, "{}", sections.join("\n\n"))?;
    Ok(())
}

struct Labels {
    summary: &'static str,
    steps: &'static str,
    references: &'static str,
    step_suffix: char,
    citation_separator: &'static str,
    link: &'static str,
    notes: &'static str,
    trace: &'static str,
}

const MARKDOWN: Labels = Labels {
    summary: "Summary\n-------",
    steps: "Steps\n-----",
    references: "References\n----------",
    step_suffix: '.',
    citation_separator: " - ",
    link: "Link",
    notes: "Notes",
    trace: "Trace ID",
};

const PLAIN: Labels = Labels {
    summary: "SUMMARY:",
    steps: "STEPS:",
    references: "REFERENCES:",
    step_suffix: ')',
    citation_separator: " :: ",
    link: "LINK",
    notes: "NOTES",
    trace: "TRACE ID",
};

fn answer_sections(response: &QueryResponse, labels: &Labels) -> Vec<String> {
    let mut sections = vec![format!("{}\n{}", labels.summary, response.summary.trim())];

    let steps: Vec<String> = response
        .steps
        .iter()
        .map(|step| step.as_str().trim())
        .filter(|step| !step.is_empty())
        .zip(1_usize..)
        .map(|(step, number)| format!("{number}{} {step}", labels.step_suffix))
        .collect();
    if !steps.is_empty() {
        sections.push(format!("{}\n{}", labels.steps, steps.join("\n")));
    }

    let references = citation_entries(response, labels);
    if !references.is_empty() {
        sections.push(format!("{}\n{}", labels.references, references.join("\n\n")));
    }
    sections
}

/// Citations deduplicated by alias and document, sorted, and numbered.
fn citation_entries(response: &QueryResponse, labels: &Labels) -> Vec<String> {
    let mut unique: BTreeMap<(&str, &str), &str> = BTreeMap::new();
    for citation in &response.citations {
        let alias = citation.alias.trim();
        let document = citation.document_ref.trim();
        if alias.is_empty() || document.is_empty() {
            continue;
        }
        unique
            .entry((alias, document))
            .or_insert_with(|| citation.excerpt.as_deref().map_or("", str::trim));
    }

    unique
        .into_iter()
        .zip(1_usize..)
        .map(|(((alias, document), excerpt), index)| {
            let mut lines = vec![format!(
                "[{index}] {alias}{}{document}",
                labels.citation_separator
            )];
            if !excerpt.is_empty() {
                lines.push(format!("    {excerpt}"));
            }
            if let Some(reference) = find_reference(&response.references, document) {
                if let Some(url) = non_blank(reference.url.as_deref()) {
                    lines.push(format!("    {}: {url}", labels.link));
                }
                if let Some(notes) = non_blank(reference.notes.as_deref()) {
                    lines.push(format!("    {}: {notes}", labels.notes));
                }
            }
            lines.join("\n")
        })
        .collect()
}

fn find_reference<'a>(references: &'a [QueryReference], document: &str) -> Option<&'a QueryReference> {
    references
        .iter()
        .find(|reference| reference.label.trim().eq_ignore_ascii_case(document))
}

fn fallback_body(response: &QueryResponse) -> String {
    let summary = response.summary.trim();
    if summary.is_empty() {
        String::from(DEFAULT_FALLBACK)
    } else if summary.to_lowercase().contains("rephrase your query") {
        summary.to_owned()
    } else {
        format!("{summary}\n\n{DEFAULT_FALLBACK}")
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|text| !text.is_empty())
}

#[expect(
    clippy::float_arithmetic,
    reason = "confidence is compared in percent, exactly as it is displayed"
)]
fn is_fallback(response: &QueryResponse, threshold_percent: u8) -> bool {
    response.no_answer || response.confidence * 100.0 < f64::from(threshold_percent)
}

#[expect(
    clippy::float_arithmetic,
    reason = "display-only conversion of a confidence fraction"
)]
fn confidence_percent(confidence: f64) -> String {
    format!("{:.0}", confidence * 100.0)
}

#[expect(
    clippy::float_arithmetic,
    reason = "the threshold is reported as a fraction alongside the confidence"
)]
fn fraction(percent: u8) -> f64 {
    f64::from(percent) / 100.0
}
