//! The dependency barrier: one interactive farm job gated on every named
//! job having ended. Submitting it blocks the controller until the farm
//! reports completion; in farm-less mode the submission returns
//! immediately, making the barrier a no-op that still records the
//! milestone.

use std::fs;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::config::OrchestratorConfig;
use crate::error::Result;
use crate::farm::{ended_expression, FarmClient, SubmitRequest};
use crate::store::StatusStore;

/// Block until every job in `job_names` has ended, then record the
/// "mapping finished" milestone and sweep `*.err` files for leftover
/// diagnostics.
///
/// Database connections are released for the duration of the wait; a farm
/// wait can span hours and idle connections must not be held across it.
/// Barrier-submission failure is a warning, not fatal: job status can
/// still be inspected through the store afterwards.
pub async fn wait_for(
    farm: &dyn FarmClient,
    store: &mut StatusStore,
    config: &OrchestratorConfig,
    job_names: &[String],
) -> Result<()> {
    if job_names.is_empty() {
        tracing::info!("No jobs to wait for");
    } else {
        let expression = ended_expression(job_names.iter().map(String::as_str));
        let job_name = format!("mapfarm_wait_{}", Uuid::new_v4().simple());

        let mut req = SubmitRequest::new("sleep 1", job_name.clone());
        req.queue = config.queue.clone();
        req.out_file = config.root_dir.join(format!("{job_name}.out"));
        req.err_file = config.root_dir.join(format!("{job_name}.err"));
        req.dependency = Some(expression);
        req.interactive = true;

        tracing::info!(jobs = job_names.len(), "Waiting for farm jobs to end");
        let outcome = store.suspended(farm.submit(req)).await?;
        match outcome {
            Ok(id) => tracing::info!(barrier_job = %id, "All farm jobs ended"),
            Err(e) => tracing::warn!(
                error = %e,
                "Barrier submission failed; job status remains inspectable in the store"
            ),
        }
    }

    store.record_event("mapping finished").await?;

    for file in scan_error_files(&config.root_dir)? {
        tracing::warn!(file = %file.display(), "Non-empty error file after mapping");
    }
    Ok(())
}

/// Every non-empty `*.err` file in `root_dir`, sorted. Emitted as warnings
/// regardless of recorded job status; recovery is driven only by the
/// store's FAILED rows.
pub fn scan_error_files(root_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut non_empty = Vec::new();
    for entry in fs::read_dir(root_dir)? {
        let path = entry?.path();
        if path.extension().map(|e| e == "err").unwrap_or(false)
            && path.is_file()
            && fs::metadata(&path)?.len() > 0
        {
            non_empty.push(path);
        }
    }
    non_empty.sort();
    Ok(non_empty)
}
