use async_trait::async_trait;
use uuid::Uuid;

use crate::config::OrchestratorConfig;
use crate::error::Result;
use crate::farm::{substitute_array_index, FarmClient, SubmitRequest};
use crate::methods::{file_stem, MappingMethod, SubmitOutcome};
use crate::store::{JobRecord, JobStatus, MappingTask, StatusStore};

/// BLAT alignment: one farm job per query/target pair, no array split and
/// no post-processing hook.
pub struct BlatMethod {
    executable: String,
}

impl BlatMethod {
    pub fn new(executable: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
        }
    }
}

impl Default for BlatMethod {
    fn default() -> Self {
        Self::new("blat")
    }
}

#[async_trait]
impl MappingMethod for BlatMethod {
    fn name(&self) -> &str {
        "blat"
    }

    async fn submit(
        &self,
        task: &MappingTask,
        farm: &dyn FarmClient,
        store: &StatusStore,
        config: &OrchestratorConfig,
    ) -> Result<SubmitOutcome> {
        let job_name = format!(
            "blat_{}_{}",
            file_stem(&task.query_file),
            Uuid::new_v4().simple()
        );
        let map_file = config.root_dir.join(format!("{job_name}.map"));

        let command = format!(
            "{exe} {target} {query} {map} -out=psl",
            exe = self.executable,
            target = task.target_file.display(),
            query = task.query_file.display(),
            map = map_file.display(),
        );

        let mut req = SubmitRequest::new(command.clone(), job_name.clone());
        req.queue = config.queue.clone();
        req.out_file = config.root_dir.join(format!("{job_name}.out"));
        req.err_file = config.root_dir.join(format!("{job_name}.err"));

        let farm_id = farm.submit(req).await?;
        tracing::info!(
            method = self.name(),
            job_name = %job_name,
            farm_id = %farm_id,
            "Submitted blat job"
        );

        store
            .insert_job(&JobRecord {
                job_id: job_name.clone(),
                array_index: 0,
                method: self.name().to_string(),
                command_line: command,
                status: JobStatus::Submitted,
                map_file,
                out_file: config.root_dir.join(format!("{job_name}.out")),
                err_file: config.root_dir.join(format!("{job_name}.err")),
                root_dir: config.root_dir.clone(),
                range_start: None,
                range_end: None,
            })
            .await?;

        Ok(SubmitOutcome {
            job_names: vec![job_name],
            job_count: 1,
        })
    }

    async fn resubmit(
        &self,
        job: &JobRecord,
        farm: &dyn FarmClient,
        config: &OrchestratorConfig,
    ) -> Result<String> {
        // Single jobs carry no placeholder; substitution is a no-op kept for
        // uniformity with array methods.
        let command = substitute_array_index(&job.command_line, job.array_index);
        let new_name = format!("blat_r_{}", Uuid::new_v4().simple());

        let mut req = SubmitRequest::new(command, new_name.clone());
        req.queue = config.queue.clone();
        req.out_file = job.out_file.clone();
        req.err_file = job.err_file.clone();

        let farm_id = farm.submit(req).await?;
        tracing::info!(
            method = self.name(),
            job_name = %new_name,
            farm_id = %farm_id,
            "Resubmitted blat job"
        );
        Ok(new_name)
    }
}
