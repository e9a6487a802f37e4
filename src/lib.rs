pub mod config;
pub mod error;
pub mod farm;
pub mod methods;
pub mod orchestrator;
pub mod store;
