//! Batch submission: resolve each task's method, submit its jobs, then
//! block on the dependency barrier.

use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

use crate::error::{MapfarmError, Result};
use crate::methods::MappingMethod;
use crate::orchestrator::{barrier, Orchestrator};
use crate::store::MappingTask;

/// Output files a previous run may have left behind. Stale results must
/// never be conflated with the new batch's.
const STALE_EXTENSIONS: &[&str] = &["map", "out", "err", "txt", "sql"];

impl Orchestrator {
    /// Submit one mapping batch and wait for it to end. Returns the total
    /// number of farm jobs (array elements) submitted.
    ///
    /// An unknown method name or a rejected submission skips that task with
    /// a warning; the rest of the batch proceeds. Missing or empty input
    /// files and working-directory I/O failures abort the operation.
    pub async fn run_mapping(&mut self, tasks: &[MappingTask]) -> Result<usize> {
        sweep_stale_outputs(&self.config.root_dir)?;
        for task in tasks {
            check_sequence_file(&task.query_file)?;
            check_sequence_file(&task.target_file)?;
        }

        let mut job_names: Vec<String> = Vec::new();
        let mut tracked: Vec<Arc<dyn MappingMethod>> = Vec::new();
        let mut total = 0;

        for task in tasks {
            let Some(method) = self.registry.resolve(&task.method) else {
                tracing::warn!(method = %task.method, "Unknown mapping method, skipping task");
                continue;
            };

            match method
                .submit(task, self.farm.as_ref(), &self.store, &self.config)
                .await
            {
                Ok(outcome) => {
                    total += outcome.job_count;
                    job_names.extend(outcome.job_names);
                    if !tracked.iter().any(|m| m.name() == method.name()) {
                        tracked.push(method);
                    }
                }
                Err(MapfarmError::Submission(msg)) => {
                    tracing::warn!(
                        method = %task.method,
                        error = %msg,
                        "Submission rejected, continuing without this task"
                    );
                }
                Err(e) => return Err(e),
            }

            // Farm job names can be derived from the submission timestamp;
            // spacing submissions keeps them distinguishable.
            tokio::time::sleep(self.config.submit_interval).await;
        }

        self.store.record_event("mapping submitted").await?;
        tracing::info!(jobs = total, "Mapping batch submitted");

        self.submit_dependency_jobs(&tracked, &mut job_names).await?;

        let farm = self.farm.clone();
        barrier::wait_for(farm.as_ref(), &mut self.store, &self.config, &job_names).await?;

        Ok(total)
    }

    /// Fire each tracked strategy's optional post-processing hook; hook jobs
    /// join the barrier set.
    pub(crate) async fn submit_dependency_jobs(
        &self,
        tracked: &[Arc<dyn MappingMethod>],
        job_names: &mut Vec<String>,
    ) -> Result<()> {
        for method in tracked {
            let Some(hook) = method.dependency_hook() else {
                continue;
            };
            match hook
                .submit_dependency_job(
                    job_names.as_slice(),
                    self.farm.as_ref(),
                    &self.store,
                    &self.config,
                )
                .await
            {
                Ok(Some(name)) => job_names.push(name),
                Ok(None) => {}
                Err(MapfarmError::Submission(msg)) => {
                    tracing::warn!(
                        method = method.name(),
                        error = %msg,
                        "Dependency job submission rejected"
                    );
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

/// Delete output files left over from a previous batch.
fn sweep_stale_outputs(root_dir: &Path) -> Result<()> {
    for entry in fs::read_dir(root_dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let stale = path
            .extension()
            .map(|ext| STALE_EXTENSIONS.iter().any(|s| ext == *s))
            .unwrap_or(false);
        if stale {
            fs::remove_file(&path)?;
            tracing::debug!(file = %path.display(), "Removed stale output file");
        }
    }
    Ok(())
}

/// SequenceSource contract: inputs must exist and be non-empty before any
/// submission happens.
fn check_sequence_file(path: &Path) -> Result<()> {
    let metadata = fs::metadata(path).map_err(|e| {
        io::Error::new(
            e.kind(),
            format!("sequence file {} unavailable: {e}", path.display()),
        )
    })?;
    if metadata.len() == 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("sequence file {} is empty", path.display()),
        )
        .into());
    }
    Ok(())
}
