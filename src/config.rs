use std::path::PathBuf;
use std::time::Duration;

/// How submitted commands reach compute capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FarmMode {
    /// Submit through `bsub` to an LSF-style farm.
    Lsf,
    /// Farm-less mode: commands run in-process, barriers are no-ops.
    Local,
}

/// A downstream result table whose rows are keyed by an id that falls inside
/// some job's affected-record range. Recovery deletes from these tables
/// before resubmitting a failed job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependentTable {
    pub table: String,
    pub key_column: String,
}

impl DependentTable {
    pub fn new(table: impl Into<String>, key_column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            key_column: key_column.into(),
        }
    }
}

/// Configuration for one orchestrator run.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Working directory holding input sequence files and job output files.
    pub root_dir: PathBuf,
    /// Farm queue submitted jobs are routed to.
    pub queue: String,
    pub farm_mode: FarmMode,
    /// Pause between consecutive submissions, so farm-assigned names derived
    /// from the submission timestamp stay distinguishable.
    pub submit_interval: Duration,
    /// Tables recovery clears by affected-record range before resubmitting.
    pub dependent_tables: Vec<DependentTable>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("."),
            queue: "long".to_string(),
            farm_mode: FarmMode::Lsf,
            submit_interval: Duration::from_secs(1),
            dependent_tables: Vec::new(),
        }
    }
}

impl OrchestratorConfig {
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            ..Self::default()
        }
    }

    pub fn with_dependent_table(mut self, table: DependentTable) -> Self {
        self.dependent_tables.push(table);
        self
    }
}
