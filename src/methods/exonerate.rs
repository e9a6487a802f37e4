use async_trait::async_trait;
use uuid::Uuid;

use crate::config::OrchestratorConfig;
use crate::error::Result;
use crate::farm::{
    ended_expression, substitute_array_index, FarmClient, SubmitRequest, ARRAY_INDEX_PLACEHOLDER,
};
use crate::methods::{file_stem, DependencyHook, MappingMethod, SubmitOutcome};
use crate::store::{JobRecord, JobStatus, MappingTask, StatusStore};

/// Exonerate alignment, split into an array job of query chunks. The chunk
/// id is left as the farm's index placeholder in the command line, so a
/// failed element can be rebuilt and resubmitted on its own.
pub struct ExonerateMethod {
    executable: String,
    query_chunks: u32,
    merge_hook: MergeMapsHook,
}

impl ExonerateMethod {
    pub fn new(executable: impl Into<String>, query_chunks: u32) -> Self {
        Self {
            executable: executable.into(),
            query_chunks,
            merge_hook: MergeMapsHook,
        }
    }
}

impl Default for ExonerateMethod {
    fn default() -> Self {
        Self::new("exonerate", 20)
    }
}

#[async_trait]
impl MappingMethod for ExonerateMethod {
    fn name(&self) -> &str {
        "exonerate"
    }

    async fn submit(
        &self,
        task: &MappingTask,
        farm: &dyn FarmClient,
        store: &StatusStore,
        config: &OrchestratorConfig,
    ) -> Result<SubmitOutcome> {
        let job_name = format!(
            "exonerate_{}_{}",
            file_stem(&task.query_file),
            Uuid::new_v4().simple()
        );
        let map_pattern = config.root_dir.join(format!("{job_name}.%I.map"));

        let command = format!(
            "{exe} --model affine:local --showvulgar yes \
             --query {query} --target {target} \
             --querychunkid {idx} --querychunktotal {total} > {map}",
            exe = self.executable,
            query = task.query_file.display(),
            target = task.target_file.display(),
            idx = ARRAY_INDEX_PLACEHOLDER,
            total = self.query_chunks,
            map = map_pattern.display(),
        );

        let mut req = SubmitRequest::new(command.clone(), job_name.clone());
        req.array = Some((1, self.query_chunks));
        req.queue = config.queue.clone();
        req.out_file = config.root_dir.join(format!("{job_name}.%I.out"));
        req.err_file = config.root_dir.join(format!("{job_name}.%I.err"));

        let farm_id = farm.submit(req).await?;
        tracing::info!(
            method = self.name(),
            job_name = %job_name,
            farm_id = %farm_id,
            chunks = self.query_chunks,
            "Submitted exonerate array job"
        );

        for index in 1..=self.query_chunks as i64 {
            store
                .insert_job(&JobRecord {
                    job_id: job_name.clone(),
                    array_index: index,
                    method: self.name().to_string(),
                    command_line: command.clone(),
                    status: JobStatus::Submitted,
                    map_file: config
                        .root_dir
                        .join(format!("{job_name}.{index}.map")),
                    out_file: config
                        .root_dir
                        .join(format!("{job_name}.{index}.out")),
                    err_file: config
                        .root_dir
                        .join(format!("{job_name}.{index}.err")),
                    root_dir: config.root_dir.clone(),
                    range_start: None,
                    range_end: None,
                })
                .await?;
        }

        Ok(SubmitOutcome {
            job_names: vec![job_name],
            job_count: self.query_chunks as usize,
        })
    }

    async fn resubmit(
        &self,
        job: &JobRecord,
        farm: &dyn FarmClient,
        config: &OrchestratorConfig,
    ) -> Result<String> {
        let command = substitute_array_index(&job.command_line, job.array_index);
        let new_name = format!("exonerate_r_{}", Uuid::new_v4().simple());

        let mut req = SubmitRequest::new(command, new_name.clone());
        req.queue = config.queue.clone();
        req.out_file = job.out_file.clone();
        req.err_file = job.err_file.clone();

        let farm_id = farm.submit(req).await?;
        tracing::info!(
            method = self.name(),
            job_name = %new_name,
            farm_id = %farm_id,
            array_index = job.array_index,
            "Resubmitted exonerate array element"
        );
        Ok(new_name)
    }

    fn dependency_hook(&self) -> Option<&dyn DependencyHook> {
        Some(&self.merge_hook)
    }
}

/// Concatenates the per-chunk map files into one load-ready file once every
/// mapping job of the batch has ended.
struct MergeMapsHook;

#[async_trait]
impl DependencyHook for MergeMapsHook {
    async fn submit_dependency_job(
        &self,
        batch_job_names: &[String],
        farm: &dyn FarmClient,
        store: &StatusStore,
        config: &OrchestratorConfig,
    ) -> Result<Option<String>> {
        let job_name = format!("exonerate_merge_{}", Uuid::new_v4().simple());
        let merged = config.root_dir.join("exonerate_merged.txt");
        let command = format!(
            "cat {}/exonerate_*.map > {}",
            config.root_dir.display(),
            merged.display()
        );

        let mut req = SubmitRequest::new(command, job_name.clone());
        req.queue = config.queue.clone();
        req.out_file = config.root_dir.join(format!("{job_name}.out"));
        req.err_file = config.root_dir.join(format!("{job_name}.err"));
        if !batch_job_names.is_empty() {
            req.dependency = Some(ended_expression(
                batch_job_names.iter().map(String::as_str),
            ));
        }

        let farm_id = farm.submit(req).await?;
        store.record_event("exonerate merge submitted").await?;
        tracing::info!(job_name = %job_name, farm_id = %farm_id, "Submitted map-merge job");
        Ok(Some(job_name))
    }
}
