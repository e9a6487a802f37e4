//! The single-threaded control process: submission, the dependency
//! barrier, and failure recovery. True parallelism happens on the farm;
//! the blocking barrier submission is the orchestrator's only suspension
//! point.

pub mod barrier;
pub mod recovery;
pub mod submitter;

use std::sync::Arc;

use crate::config::OrchestratorConfig;
use crate::farm::FarmClient;
use crate::methods::MethodRegistry;
use crate::store::StatusStore;

pub struct Orchestrator {
    config: OrchestratorConfig,
    registry: MethodRegistry,
    farm: Arc<dyn FarmClient>,
    store: StatusStore,
}

impl Orchestrator {
    pub fn new(
        config: OrchestratorConfig,
        registry: MethodRegistry,
        farm: Arc<dyn FarmClient>,
        store: StatusStore,
    ) -> Self {
        Self {
            config,
            registry,
            farm,
            store,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn store(&self) -> &StatusStore {
        &self.store
    }
}
