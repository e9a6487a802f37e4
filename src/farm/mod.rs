//! Abstraction over the compute farm.
//!
//! The orchestrator core only depends on [`FarmClient`]; the concrete
//! clients shell out (`bsub` for LSF) or run commands in-process for
//! farm-less mode. Tests substitute an in-memory fake.

pub mod local;
pub mod lsf;

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::Result;

pub use local::LocalFarm;
pub use lsf::LsfFarm;

/// Token strategies embed in array-job command lines; the farm expands it to
/// the element's index at run time, and resubmission substitutes a concrete
/// index before resubmitting a single element.
pub const ARRAY_INDEX_PLACEHOLDER: &str = "$LSB_JOBINDEX";

/// Farm-assigned identifier for one submitted job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub command: String,
    /// Name the job is submitted under; dependency expressions refer to it.
    pub job_name: String,
    /// Inclusive array bounds for an array job, `None` for a single job.
    pub array: Option<(u32, u32)>,
    pub queue: String,
    pub out_file: PathBuf,
    pub err_file: PathBuf,
    /// Conjoined `ended(...)` expression gating this submission.
    pub dependency: Option<String>,
    /// Blocking submission: the call returns only once the farm reports the
    /// job ended.
    pub interactive: bool,
}

impl SubmitRequest {
    pub fn new(command: impl Into<String>, job_name: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            job_name: job_name.into(),
            array: None,
            queue: "long".to_string(),
            out_file: PathBuf::from("/dev/null"),
            err_file: PathBuf::from("/dev/null"),
            dependency: None,
            interactive: false,
        }
    }
}

#[async_trait]
pub trait FarmClient: Send + Sync {
    /// Submit one job (or array of jobs) and return the farm's identifier
    /// for it. Interactive requests do not return until the job has ended.
    async fn submit(&self, req: SubmitRequest) -> Result<JobId>;
}

/// Build the dependency predicate "every named job has ended": one
/// `ended(name)` clause per distinct name, conjoined, order-preserving.
pub fn ended_expression<'a, I>(names: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut distinct: Vec<&str> = Vec::new();
    for name in names {
        if !distinct.contains(&name) {
            distinct.push(name);
        }
    }
    distinct
        .iter()
        .map(|name| format!("ended({name})"))
        .collect::<Vec<_>>()
        .join(" && ")
}

/// Substitute a concrete array index into a command line or file-name
/// pattern. Handles both the shell placeholder and the `%I` form LSF uses
/// in output paths.
pub fn substitute_array_index(text: &str, index: i64) -> String {
    text.replace(ARRAY_INDEX_PLACEHOLDER, &index.to_string())
        .replace("%I", &index.to_string())
}
