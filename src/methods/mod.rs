//! Mapping methods: named strategies that turn a query/target file pair
//! into farm submissions.
//!
//! The registry is populated at process start; resolving an unknown name
//! yields `None`, which callers treat as a warning for that task rather
//! than a batch failure.

pub mod blat;
pub mod exonerate;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::OrchestratorConfig;
use crate::error::Result;
use crate::farm::FarmClient;
use crate::store::{JobRecord, MappingTask, StatusStore};

pub use blat::BlatMethod;
pub use exonerate::ExonerateMethod;

/// What one `submit` call produced: the names the barrier must wait on and
/// the number of individual jobs (array elements) behind them.
#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub job_names: Vec<String>,
    pub job_count: usize,
}

#[async_trait]
pub trait MappingMethod: Send + Sync {
    fn name(&self) -> &str;

    /// Build the farm command line(s) for one query/target pair and submit
    /// them, as an array job when beneficial. Inserts one SUBMITTED job row
    /// per array element.
    async fn submit(
        &self,
        task: &MappingTask,
        farm: &dyn FarmClient,
        store: &StatusStore,
        config: &OrchestratorConfig,
    ) -> Result<SubmitOutcome>;

    /// Rebuild a single array element's command, substituting its concrete
    /// index into the farm placeholder, and resubmit only that element.
    /// Returns the new job name.
    async fn resubmit(
        &self,
        job: &JobRecord,
        farm: &dyn FarmClient,
        config: &OrchestratorConfig,
    ) -> Result<String>;

    /// Optional capability: a method-specific post-processing job submitted
    /// after all mapping jobs of a batch.
    fn dependency_hook(&self) -> Option<&dyn DependencyHook> {
        None
    }
}

#[async_trait]
pub trait DependencyHook: Send + Sync {
    /// Submit the post-hoc job, gated on the batch's mapping jobs having
    /// ended; returns its name if one was submitted.
    async fn submit_dependency_job(
        &self,
        batch_job_names: &[String],
        farm: &dyn FarmClient,
        store: &StatusStore,
        config: &OrchestratorConfig,
    ) -> Result<Option<String>>;
}

#[derive(Default)]
pub struct MethodRegistry {
    methods: HashMap<String, Arc<dyn MappingMethod>>,
}

impl MethodRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in methods.
    pub fn with_default_methods() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(ExonerateMethod::default()));
        registry.register(Arc::new(BlatMethod::default()));
        registry
    }

    pub fn register(&mut self, method: Arc<dyn MappingMethod>) {
        self.methods.insert(method.name().to_string(), method);
    }

    pub fn resolve(&self, name: &str) -> Option<Arc<dyn MappingMethod>> {
        self.methods.get(name).cloned()
    }
}

/// Stem of an input file, for embedding in job names ("chr1" from
/// "/data/chr1.fa").
pub(crate) fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "input".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_resolves_registered_methods() {
        let registry = MethodRegistry::with_default_methods();
        assert!(registry.resolve("exonerate").is_some());
        assert!(registry.resolve("blat").is_some());
        assert!(registry.resolve("crossmatch").is_none());
    }

    #[test]
    fn exonerate_exposes_dependency_hook_blat_does_not() {
        let registry = MethodRegistry::with_default_methods();
        let exonerate = registry.resolve("exonerate").unwrap();
        let blat = registry.resolve("blat").unwrap();
        assert!(exonerate.dependency_hook().is_some());
        assert!(blat.dependency_hook().is_none());
    }

    #[test]
    fn file_stem_strips_directory_and_extension() {
        assert_eq!(file_stem(Path::new("/data/seq/chr1.fa")), "chr1");
        assert_eq!(file_stem(Path::new("queries.fasta")), "queries");
    }
}
