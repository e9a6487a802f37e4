use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::{MapfarmError, Result};
use crate::farm::{FarmClient, JobId, SubmitRequest};

/// Submits jobs to an LSF farm by shelling out to `bsub` and parsing the
/// `Job <12345>` token from its output.
#[derive(Debug, Clone)]
pub struct LsfFarm {
    bsub: String,
}

impl LsfFarm {
    pub fn new() -> Self {
        Self {
            bsub: "bsub".to_string(),
        }
    }

    /// Override the submission binary (used against wrapper scripts).
    pub fn with_bsub(bsub: impl Into<String>) -> Self {
        Self { bsub: bsub.into() }
    }

    fn build_args(req: &SubmitRequest) -> Vec<String> {
        let mut args = vec!["-q".to_string(), req.queue.clone()];

        let job_name = match req.array {
            Some((lo, hi)) => format!("{}[{}-{}]", req.job_name, lo, hi),
            None => req.job_name.clone(),
        };
        args.push("-J".to_string());
        args.push(job_name);

        args.push("-o".to_string());
        args.push(req.out_file.to_string_lossy().into_owned());
        args.push("-e".to_string());
        args.push(req.err_file.to_string_lossy().into_owned());

        if let Some(ref expr) = req.dependency {
            args.push("-w".to_string());
            args.push(expr.clone());
        }
        if req.interactive {
            args.push("-I".to_string());
        }

        args.push(req.command.clone());
        args
    }

    /// Pull the job identifier out of bsub's "Job <12345> is submitted to
    /// queue <long>." banner.
    fn parse_job_id(output: &str) -> Option<String> {
        let start = output.find("Job <")? + "Job <".len();
        let rest = &output[start..];
        let end = rest.find('>')?;
        let id = &rest[..end];
        if id.is_empty() {
            None
        } else {
            Some(id.to_string())
        }
    }
}

impl Default for LsfFarm {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FarmClient for LsfFarm {
    async fn submit(&self, req: SubmitRequest) -> Result<JobId> {
        let args = Self::build_args(&req);
        tracing::debug!(job_name = %req.job_name, interactive = req.interactive, "Submitting to LSF");

        let output = Command::new(&self.bsub)
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() {
            return Err(MapfarmError::Submission(format!(
                "bsub exited with {:?} for {}: {}",
                output.status.code(),
                req.job_name,
                stderr.trim()
            )));
        }

        // Interactive runs print the banner before the job's own output,
        // so the token search works for both modes.
        match Self::parse_job_id(&stdout).or_else(|| Self::parse_job_id(&stderr)) {
            Some(id) => {
                tracing::info!(job_name = %req.job_name, job_id = %id, "Farm accepted job");
                Ok(JobId::new(id))
            }
            None => Err(MapfarmError::Submission(format!(
                "no job identifier in bsub output for {}: {}",
                req.job_name,
                stdout.trim()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn parses_job_id_from_banner() {
        let out = "Job <442917> is submitted to queue <long>.\n";
        assert_eq!(LsfFarm::parse_job_id(out), Some("442917".to_string()));
    }

    #[test]
    fn rejects_banner_without_id() {
        assert_eq!(LsfFarm::parse_job_id("Request aborted by esub."), None);
        assert_eq!(LsfFarm::parse_job_id("Job <> is submitted"), None);
    }

    #[test]
    fn array_and_dependency_args() {
        let mut req = SubmitRequest::new("exonerate ...", "exo_chr1");
        req.array = Some((1, 20));
        req.queue = "normal".to_string();
        req.out_file = PathBuf::from("/work/exo_chr1.%I.out");
        req.err_file = PathBuf::from("/work/exo_chr1.%I.err");
        req.dependency = Some("ended(prep_chr1)".to_string());

        let args = LsfFarm::build_args(&req);
        assert_eq!(
            args,
            vec![
                "-q",
                "normal",
                "-J",
                "exo_chr1[1-20]",
                "-o",
                "/work/exo_chr1.%I.out",
                "-e",
                "/work/exo_chr1.%I.err",
                "-w",
                "ended(prep_chr1)",
                "exonerate ...",
            ]
        );
    }

    #[test]
    fn interactive_flag_is_passed() {
        let mut req = SubmitRequest::new("sleep 1", "wait_all");
        req.interactive = true;
        let args = LsfFarm::build_args(&req);
        assert!(args.contains(&"-I".to_string()));
        assert!(!args.contains(&"-w".to_string()));
    }
}
