use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use uuid::Uuid;

use crate::error::Result;
use crate::farm::{substitute_array_index, FarmClient, JobId, SubmitRequest};

/// Farm-less execution: commands run in-process through `sh -c`, one array
/// element at a time, with stdout/stderr redirected to the request's files.
///
/// Because every job has already finished by the time `submit` returns,
/// interactive (barrier) submissions return immediately without running
/// anything, which makes the dependency barrier a natural no-op in this
/// mode.
#[derive(Debug, Clone, Default)]
pub struct LocalFarm;

impl LocalFarm {
    pub fn new() -> Self {
        Self
    }

    async fn run_element(&self, req: &SubmitRequest, index: Option<i64>) -> Result<()> {
        let (command, out_path, err_path) = match index {
            Some(i) => (
                substitute_array_index(&req.command, i),
                substitute_array_index(&req.out_file.to_string_lossy(), i),
                substitute_array_index(&req.err_file.to_string_lossy(), i),
            ),
            None => (
                req.command.clone(),
                req.out_file.to_string_lossy().into_owned(),
                req.err_file.to_string_lossy().into_owned(),
            ),
        };

        let out = std::fs::File::create(&out_path)?;
        let err = std::fs::File::create(&err_path)?;

        let status = Command::new("sh")
            .arg("-c")
            .arg(&command)
            .stdin(Stdio::null())
            .stdout(Stdio::from(out))
            .stderr(Stdio::from(err))
            .status()
            .await?;

        if !status.success() {
            // Submission succeeded; the failure belongs to farm accounting,
            // which marks the job FAILED for the recovery pass.
            tracing::warn!(
                job_name = %req.job_name,
                index = ?index,
                exit = ?status.code(),
                "Local job exited non-zero"
            );
        }
        Ok(())
    }
}

#[async_trait]
impl FarmClient for LocalFarm {
    async fn submit(&self, req: SubmitRequest) -> Result<JobId> {
        let id = JobId::new(format!("local-{}", Uuid::new_v4().simple()));

        if req.interactive {
            tracing::debug!(job_name = %req.job_name, "Farm-less mode, barrier returns immediately");
            return Ok(id);
        }

        match req.array {
            Some((lo, hi)) => {
                for i in lo..=hi {
                    self.run_element(&req, Some(i as i64)).await?;
                }
            }
            None => self.run_element(&req, None).await?,
        }

        tracing::info!(job_name = %req.job_name, job_id = %id, "Local job set finished");
        Ok(id)
    }
}
