//! Failure recovery: scan the store for FAILED jobs, clear the derived
//! rows they may have partially written, delete their output files, and
//! resubmit each one individually.

use std::fs;
use std::io;
use std::sync::Arc;

use crate::error::{MapfarmError, Result};
use crate::methods::MappingMethod;
use crate::orchestrator::{barrier, Orchestrator};
use crate::store::JobRecord;

impl Orchestrator {
    /// One recovery pass. Returns the number of jobs resubmitted.
    ///
    /// Idempotent: with no FAILED rows in the store this does nothing.
    /// A job whose affected-record range is one-sided is a data-integrity
    /// anomaly; it is reported and left exactly as found.
    pub async fn fix_failed_jobs(&mut self) -> Result<usize> {
        let failed = self.store.failed_jobs().await?;
        if failed.is_empty() {
            tracing::info!("No failed jobs to recover");
            return Ok(0);
        }
        tracing::info!(failed = failed.len(), "Starting recovery pass");

        let mut job_names: Vec<String> = Vec::new();
        let mut tracked: Vec<Arc<dyn MappingMethod>> = Vec::new();
        let mut resubmitted = 0;

        for job in failed {
            match (job.range_start, job.range_end) {
                (None, None) => {
                    // Nothing was written downstream; straight to cleanup.
                }
                (Some(start), Some(end)) => {
                    let deleted = self.store.delete_derived_range(start, end).await?;
                    self.store
                        .clear_affected_range(&job.job_id, job.array_index)
                        .await?;
                    tracing::info!(
                        job_id = %job.job_id,
                        array_index = job.array_index,
                        start,
                        end,
                        deleted,
                        "Cleared partially written derived records"
                    );
                }
                (start, end) => {
                    tracing::error!(
                        job_id = %job.job_id,
                        array_index = job.array_index,
                        range_start = ?start,
                        range_end = ?end,
                        "One-sided affected-record range; leaving job for manual inspection"
                    );
                    continue;
                }
            }

            remove_job_files(&job);

            let Some(method) = self.registry.resolve(&job.method) else {
                tracing::warn!(
                    job_id = %job.job_id,
                    method = %job.method,
                    "Unknown method for failed job, skipping resubmission"
                );
                continue;
            };

            let new_name = match method
                .resubmit(&job, self.farm.as_ref(), &self.config)
                .await
            {
                Ok(name) => name,
                Err(MapfarmError::Submission(msg)) => {
                    tracing::warn!(
                        job_id = %job.job_id,
                        error = %msg,
                        "Resubmission rejected, job stays failed"
                    );
                    continue;
                }
                Err(e) => return Err(e),
            };

            self.store
                .reassign_job(&job.job_id, job.array_index, &new_name)
                .await?;
            job_names.push(new_name);
            resubmitted += 1;

            if !tracked.iter().any(|m| m.name() == method.name()) {
                tracked.push(method);
            }

            tokio::time::sleep(self.config.submit_interval).await;
        }

        self.store.record_event("failed jobs resubmitted").await?;
        tracing::info!(resubmitted, "Recovery resubmissions complete");

        self.submit_dependency_jobs(&tracked, &mut job_names).await?;

        let farm = self.farm.clone();
        barrier::wait_for(farm.as_ref(), &mut self.store, &self.config, &job_names).await?;

        Ok(resubmitted)
    }
}

/// Best-effort removal of a job's map/out/err files; absence is expected
/// for jobs that died before producing output.
fn remove_job_files(job: &JobRecord) {
    for path in [&job.map_file, &job.out_file, &job.err_file] {
        match fs::remove_file(path) {
            Ok(()) => tracing::debug!(file = %path.display(), "Removed failed job output"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                file = %path.display(),
                error = %e,
                "Could not remove failed job output"
            ),
        }
    }
}
