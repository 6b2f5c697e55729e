//! Live rendering of reindex job snapshots.
//!
//! In table mode each snapshot overwrites the previous one on a single
//! terminal line; the final summary follows on fresh lines. In JSON mode
//! every snapshot becomes one compact `{"event": "progress", ...}` line and
//! the summary a closing `{"event": "summary", ...}` line.

use std::io::{self, Write};
use std::time::Duration;

use ragcli_config::OutputFormat;
use ragcli_ipc::IngestionJob;
use serde::Serialize;
use unicode_width::UnicodeWidthStr;

use crate::AppError;

#[derive(Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum ProgressEvent<'a> {
    Progress {
        job: &'a IngestionJob,
    },
    Summary {
        job: &'a IngestionJob,
        duration_ms: u128,
    },
}

/// Tracks what has been drawn so far for one reindex.
#[derive(Debug)]
pub(crate) struct ReindexProgress {
    format: OutputFormat,
    line_width: usize,
    wrote_progress: bool,
    last_job: Option<IngestionJob>,
}

impl ReindexProgress {
    pub(crate) const fn new(format: OutputFormat) -> Self {
        Self {
            format,
            line_width: 0,
            wrote_progress: false,
            last_job: None,
        }
    }

    /// Most recent snapshot seen by [`ReindexProgress::handle`].
    pub(crate) const fn last_job(&self) -> Option<&IngestionJob> {
        self.last_job.as_ref()
    }

    /// Draws one snapshot.
    pub(crate) fn handle<W: Write>(&mut self, out: &mut W, job: &IngestionJob) -> io::Result<()> {
        self.last_job = Some(job.clone());
        if self.format.is_json() {
            return write_event(out, &ProgressEvent::Progress { job });
        }

        let line = progress_line(job);
        let width = line.width();
        let padding = self.line_width.saturating_sub(width);
        self.line_width = width;
        self.wrote_progress = true;
        write!(out, "\r{line}{}", " ".repeat(padding))?;
        out.flush()
    }

    /// Ends the in-place progress line, if one was drawn.
    pub(crate) fn finish_line<W: Write>(&mut self, out: &mut W) -> io::Result<()> {
        if std::mem::take(&mut self.wrote_progress) {
            writeln!(out)?;
        }
        Ok(())
    }

    /// Writes the final summary for `job`.
    pub(crate) fn complete<W: Write>(
        &mut self,
        out: &mut W,
        job: &IngestionJob,
        elapsed: Duration,
    ) -> Result<(), AppError> {
        if self.format.is_json() {
            write_event(
                out,
                &ProgressEvent::Summary {
                    job,
                    duration_ms: elapsed.as_millis(),
                },
            )?;
            return Ok(());
        }

        self.finish_line(out)?;
        let status = job.normalized_status();
        writeln!(out, "Reindex {status} (job {})", job.job_id)?;
        writeln!(out, "Stage: {}", stage_label(job))?;
        if let Some(error) = job.error() {
            writeln!(out, "Error: {error}")?;
        }
        writeln!(out, "Duration: {}", format_duration(elapsed))?;
        Ok(())
    }
}

fn write_event<W: Write>(out: &mut W, event: &ProgressEvent<'_>) -> io::Result<()> {
    serde_json::to_writer(&mut *out, event)?;
    writeln!(out)?;
    out.flush()
}

fn progress_line(job: &IngestionJob) -> String {
    let mut line = format!(
        "Reindex {} - Stage: {}",
        job.normalized_status(),
        stage_label(job)
    );
    if job.documents_processed > 0 {
        line.push_str(&format!(" docs={}", job.documents_processed));
    }
    line
}

/// Stage name, falling back to the status, with the percentage when known.
fn stage_label(job: &IngestionJob) -> String {
    let stage = match job.stage.trim() {
        "" => job.normalized_status().to_string(),
        stage => stage.to_owned(),
    };
    job.percent()
        .map_or_else(|| stage.clone(), |percent| format!("{stage} ({percent}%)"))
}

fn format_duration(elapsed: Duration) -> String {
    if elapsed < Duration::from_secs(1) {
        format!("{}ms", elapsed.as_millis())
    } else {
        format!("{:.2}s", elapsed.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use ragcli_ipc::JobStatus;
    use rstest::rstest;
    use serde_json::Value;

    use super::*;

    fn job(status: JobStatus, stage: &str, percent: Option<f64>, docs: u64) -> IngestionJob {
        IngestionJob {
            job_id: String::from("job-1"),
            source_alias: None,
            status,
            stage: String::from(stage),
            percent_complete: percent,
            documents_processed: docs,
            requested_at: String::from("2026-10-18T12:00:00Z"),
            started_at: None,
            completed_at: None,
            error_message: None,
            trigger: Some(String::from("manual")),
        }
    }

    #[test]
    fn snapshots_overwrite_the_same_line() {
        let mut progress = ReindexProgress::new(OutputFormat::Table);
        let mut out = Vec::new();
        progress
            .handle(&mut out, &job(JobStatus::Running, "embedding", Some(40.4), 12))
            .expect("first snapshot");
        progress
            .handle(&mut out, &job(JobStatus::Running, "", None, 0))
            .expect("second snapshot");

        let first = "Reindex running - Stage: embedding (40%) docs=12";
        let second = "Reindex running - Stage: running";
        let padding = " ".repeat(first.len() - second.len());
        assert_eq!(
            String::from_utf8(out).expect("utf-8"),
            format!("\r{first}\r{second}{padding}")
        );
        assert_eq!(progress.last_job().map(|job| job.stage.as_str()), Some(""));
    }

    #[test]
    fn completion_starts_a_fresh_line_after_progress() {
        let mut progress = ReindexProgress::new(OutputFormat::Table);
        let mut out = Vec::new();
        progress
            .handle(&mut out, &job(JobStatus::Running, "chunking", Some(10.0), 0))
            .expect("snapshot");
        let mut done = job(JobStatus::Succeeded, "completed", Some(100.0), 42);
        done.error_message = Some(String::from("2 documents skipped"));
        progress
            .complete(&mut out, &done, Duration::from_millis(1_530))
            .expect("complete");

        let text = String::from_utf8(out).expect("utf-8");
        assert!(
            text.ends_with(
                "\nReindex failed (job job-1)\n\
                 Stage: completed (100%)\n\
                 Error: 2 documents skipped\n\
                 Duration: 1.53s\n"
            ),
            "{text:?}"
        );
    }

    #[test]
    fn completion_without_progress_has_no_leading_newline() {
        let mut progress = ReindexProgress::new(OutputFormat::Table);
        let mut out = Vec::new();
        progress
            .complete(
                &mut out,
                &job(JobStatus::Queued, "", None, 0),
                Duration::from_millis(250),
            )
            .expect("complete");

        assert_eq!(
            String::from_utf8(out).expect("utf-8"),
            "Reindex queued (job job-1)\nStage: queued\nDuration: 250ms\n"
        );
    }

    #[test]
    fn json_mode_emits_one_event_per_line() {
        let mut progress = ReindexProgress::new(OutputFormat::Json);
        let mut out = Vec::new();
        progress
            .handle(&mut out, &job(JobStatus::Running, "embedding", Some(50.0), 3))
            .expect("snapshot");
        progress
            .complete(
                &mut out,
                &job(JobStatus::Succeeded, "completed", Some(100.0), 6),
                Duration::from_millis(75),
            )
            .expect("complete");

        let text = String::from_utf8(out).expect("utf-8");
        let events: Vec<Value> = text
            .lines()
            .map(|line| serde_json::from_str(line).expect("json line"))
            .collect();
        assert_eq!(events.len(), 2);
        let progress_event = events.first().expect("progress event");
        assert_eq!(progress_event["event"], "progress");
        assert_eq!(progress_event["job"]["stage"], "embedding");
        let summary = events.get(1).expect("summary event");
        assert_eq!(summary["event"], "summary");
        assert_eq!(summary["job"]["status"], "succeeded");
        assert_eq!(summary["duration_ms"], 75);
    }

    #[rstest]
    #[case(Duration::from_millis(0), "0ms")]
    #[case(Duration::from_millis(999), "999ms")]
    #[case(Duration::from_millis(1_000), "1.00s")]
    #[case(Duration::from_secs(75), "75.00s")]
    fn durations(#[case] elapsed: Duration, #[case] expected: &str) {
        assert_eq!(format_duration(elapsed), expected);
    }
}
