//! Result types returned by compile, merge and site-build operations.
//!
//! All of them serialise to JSON so the CLI can print them with `--json`.

use crate::cache::{CacheDecision, RecordOutcome};
use crate::config::OutputFormat;
use crate::error::JobError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Outcome of compiling one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileOutput {
    /// Source document.
    pub input: PathBuf,
    /// Document written (or left in place when skipped).
    pub output: PathBuf,
    pub format: OutputFormat,
    /// Template handed to the converter, if any.
    pub template: Option<PathBuf>,
    /// Cache answer before converting. `None` when the cache was not consulted.
    pub decision: Option<CacheDecision>,
    /// What the cache did after a successful conversion.
    pub record: Option<RecordOutcome>,
    /// True when the converter did not run because the output was up to date.
    pub skipped: bool,
    pub duration_ms: u64,
}

/// Outcome of merging PDFs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeStats {
    pub output: PathBuf,
    pub files: usize,
    pub pages: usize,
}

/// What a successful site-build job produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum JobOutcome {
    Compiled(CompileOutput),
    Merged(MergeStats),
    Copied { to: PathBuf },
    Written { path: PathBuf },
}

impl JobOutcome {
    pub fn skipped(&self) -> bool {
        matches!(self, JobOutcome::Compiled(out) if out.skipped)
    }
}

/// One job's entry in a [`BuildReport`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResult {
    /// 1-indexed position in the manifest.
    pub index: usize,
    pub label: String,
    pub outcome: Option<JobOutcome>,
    pub error: Option<JobError>,
}

/// Summary of a site build.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildReport {
    pub jobs: Vec<JobResult>,
    /// Jobs that did work (conversions run, files copied, PDFs merged).
    pub completed: usize,
    /// Compile jobs the cache skipped.
    pub skipped: usize,
    pub failed: usize,
    pub duration_ms: u64,
}

impl BuildReport {
    /// Errors of every failed job, in manifest order.
    pub fn errors(&self) -> impl Iterator<Item = &JobError> {
        self.jobs.iter().filter_map(|j| j.error.as_ref())
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}
