//! Test support for front-end behavioural coverage.
//!
//! Supplies a fake backend, a fixed configuration loader, and a world that
//! runs either binary in-process while capturing its output and the audit
//! log it writes.

mod fake_backend;

use std::cell::RefCell;
use std::ffi::OsString;
use std::fs;
use std::process::ExitCode;

use anyhow::{Context, Result, anyhow, ensure};
use camino::Utf8PathBuf;
use ragcli_config::Config;
use ragcli_ipc::codec::Request;
use rstest::fixture;
use serde_json::{Value, json};
use tempfile::TempDir;

use crate::cli::{AdminCli, ManCli};
use crate::config::ConfigLoader;
use crate::{AppError, IoStreams, run_with_loader};

pub(super) use fake_backend::{FakeBackend, Step};

/// A config loader that returns a fixed configuration.
pub(super) struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    pub(super) const fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self, _args: &[OsString]) -> Result<Config, AppError> {
        Ok(self.config.clone())
    }
}

/// Which binary a scenario drives.
#[derive(Debug, Clone, Copy)]
pub(super) enum Binary {
    Admin,
    Man,
}

/// CLI state, backend, and captured output for one scenario.
pub(super) struct TestWorld {
    pub config: Config,
    pub backend: Option<FakeBackend>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_code: Option<ExitCode>,
    pub requests: Vec<Request>,
    workspace: TempDir,
}

impl TestWorld {
    pub fn new() -> Result<Self> {
        let workspace = tempfile::tempdir().context("create scenario directory")?;
        let root = Utf8PathBuf::from_path_buf(workspace.path().to_path_buf())
            .map_err(|path| anyhow!("scenario path is not UTF-8: {}", path.display()))?;
        let config = Config {
            socket: Some(root.join("missing.sock")),
            audit_log: Some(root.join("audit").join("audit.log")),
            request_timeout_secs: Some(5),
            stream_stall_secs: Some(5),
            ..Config::default()
        };
        Ok(Self {
            config,
            backend: None,
            stdout: Vec::new(),
            stderr: Vec::new(),
            exit_code: None,
            requests: Vec::new(),
            workspace,
        })
    }

    /// Starts a backend playing `scripts` and points the config at it.
    pub fn start_backend(&mut self, scripts: Vec<Vec<Step>>) -> Result<()> {
        let backend = FakeBackend::start(scripts)?;
        self.config.socket = Some(backend.socket_path().clone());
        self.backend = Some(backend);
        Ok(())
    }

    pub fn run(&mut self, binary: Binary, command: &str) -> Result<()> {
        self.stdout.clear();
        self.stderr.clear();
        self.requests.clear();
        let loader = StaticConfigLoader::new(self.config.clone());
        let mut io = IoStreams::new(&mut self.stdout, &mut self.stderr);
        let exit = match binary {
            Binary::Admin => {
                run_with_loader::<AdminCli, _, _, _, _>(build_args("ragadmin", command), &mut io, &loader)
            }
            Binary::Man => {
                run_with_loader::<ManCli, _, _, _, _>(build_args("ragman", command), &mut io, &loader)
            }
        };
        self.exit_code = Some(exit);
        if let Some(mut backend) = self.backend.take() {
            self.requests = backend.take_requests()?;
        }
        Ok(())
    }

    pub fn stdout_text(&self) -> Result<String> {
        String::from_utf8(self.stdout.clone()).context("stdout is not UTF-8")
    }

    pub fn stderr_text(&self) -> Result<String> {
        String::from_utf8(self.stderr.clone()).context("stderr is not UTF-8")
    }

    pub fn assert_success(&self) -> Result<()> {
        let exit = self.exit_code.context("exit code recorded")?;
        ensure!(
            exit == ExitCode::SUCCESS,
            "expected success, got {exit:?}; stderr: {}",
            self.stderr_text()?
        );
        Ok(())
    }

    pub fn assert_failure(&self) -> Result<()> {
        let exit = self.exit_code.context("exit code recorded")?;
        ensure!(exit == ExitCode::FAILURE, "expected failure, got {exit:?}");
        Ok(())
    }

    /// The only request the backend received.
    pub fn single_request(&self) -> Result<&Request> {
        ensure!(
            self.requests.len() == 1,
            "expected a single request but found {}",
            self.requests.len()
        );
        self.requests.first().context("request recorded")
    }

    /// Parsed audit log lines, empty when nothing was written.
    pub fn audit_entries(&self) -> Result<Vec<Value>> {
        let path = self.workspace.path().join("audit").join("audit.log");
        if !path.exists() {
            return Ok(Vec::new());
        }
        fs::read_to_string(&path)
            .context("read audit log")?
            .lines()
            .map(|line| serde_json::from_str(line).context("parse audit line"))
            .collect()
    }
}

fn build_args(program: &str, command: &str) -> Vec<OsString> {
    let mut args = vec![OsString::from(program)];
    args.extend(
        command
            .split_whitespace()
            .map(|token| OsString::from(token.trim_matches('"'))),
    );
    args
}

#[fixture]
pub(super) fn world() -> RefCell<TestWorld> {
    RefCell::new(TestWorld::new().expect("create test world"))
}

/// A `{"job": {...}}` body for job `job-42`.
pub(super) fn job_body(status: &str, stage: &str, percent: f64, documents: u64) -> Value {
    json!({"job": {
        "job_id": "job-42",
        "source_alias": null,
        "status": status,
        "stage": stage,
        "percent_complete": percent,
        "documents_processed": documents,
        "requested_at": "2026-10-18T09:00:00Z",
        "trigger": "manual",
    }})
}

/// Accepted, running, and final snapshots ending in `final_status`.
pub(super) fn reindex_script(final_status: &str) -> Vec<Step> {
    let mut last = job_body(final_status, "completed", 100.0, 30);
    if final_status == "failed"
        && let Some(job) = last.get_mut("job").and_then(Value::as_object_mut)
    {
        job.insert(
            String::from("error_message"),
            json!("embedding service unavailable"),
        );
    }
    vec![
        Step::Reply(202, job_body("queued", "queued", 0.0, 0)),
        Step::Event(202, job_body("running", "embedding", 45.0, 12)),
        Step::Event(200, last),
    ]
}

pub(super) fn health_body() -> Value {
    json!({
        "overall_status": "warn",
        "trace_id": "trace-health",
        "results": [
            {"component": "disk_capacity", "status": "warn", "message": "82% used",
             "remediation": "Free space under /var/lib/ragcli"},
            {"component": "index_freshness", "status": "pass", "message": "ok"},
        ],
    })
}

pub(super) fn source_body(alias: &str, status: &str) -> Value {
    json!({
        "alias": alias,
        "type": "kiwix",
        "location": "/srv/kiwix/wikipedia_en.zim",
        "language": "en",
        "size_bytes": 1_048_576,
        "last_updated": "2026-10-18T09:00:00Z",
        "status": status,
    })
}

pub(super) fn mutation_body(alias: &str, status: &str) -> Value {
    json!({
        "source": source_body(alias, status),
        "ingestion_job": job_body("queued", "queued", 0.0, 0)["job"],
        "trace_id": "trace-mutation",
    })
}

pub(super) fn answer_body(confidence: f64) -> Value {
    json!({
        "summary": "Use passwd to change the password.",
        "steps": ["Open a terminal", "Run passwd"],
        "references": [{"label": "passwd(1)", "url": "https://manpages.ubuntu.com/passwd.1"}],
        "citations": [{"alias": "man-pages", "document_ref": "passwd(1)", "excerpt": "passwd changes passwords"}],
        "confidence": confidence,
        "trace_id": "trace-query",
        "latency_ms": 840,
        "no_answer": false,
    })
}
