use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One (method, query file, target file) triple to be mapped. Created by the
/// controller before submission; consumed once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingTask {
    pub method: String,
    pub query_file: PathBuf,
    pub target_file: PathBuf,
}

impl MappingTask {
    pub fn new(
        method: impl Into<String>,
        query_file: impl Into<PathBuf>,
        target_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            method: method.into(),
            query_file: query_file.into(),
            target_file: target_file.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Submitted,
    Running,
    Successful,
    Failed,
}

impl JobStatus {
    /// Text form stored in the `job.status` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Submitted => "SUBMITTED",
            JobStatus::Running => "RUNNING",
            JobStatus::Successful => "SUCCESSFUL",
            JobStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "SUBMITTED" => Some(JobStatus::Submitted),
            "RUNNING" => Some(JobStatus::Running),
            "SUCCESSFUL" => Some(JobStatus::Successful),
            "FAILED" => Some(JobStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One submitted farm job (one array element). Primary key is
/// (job_id, array_index).
///
/// Invariant: `range_start` and `range_end` are either both null or both
/// set. A row with exactly one of them set partially recorded its output
/// range and is left for operator attention, never repaired automatically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: String,
    pub array_index: i64,
    pub method: String,
    /// Command line as submitted, with the farm array-index placeholder
    /// still unsubstituted for array jobs.
    pub command_line: String,
    pub status: JobStatus,
    pub map_file: PathBuf,
    pub out_file: PathBuf,
    pub err_file: PathBuf,
    pub root_dir: PathBuf,
    pub range_start: Option<i64>,
    pub range_end: Option<i64>,
}

impl JobRecord {
    /// True when the row violates the both-or-neither range invariant.
    pub fn has_one_sided_range(&self) -> bool {
        self.range_start.is_some() != self.range_end.is_some()
    }
}

/// Append-only pipeline milestone ("sequences dumped", "mapping finished").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessEvent {
    pub status_tag: String,
    pub recorded_at: DateTime<Utc>,
}
