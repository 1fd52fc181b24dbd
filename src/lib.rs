//! buildmaster - declarative CI/CD registration planning
//!
//! Loads per-project YAML configuration and composes the registration
//! plan an external build orchestrator is configured from: change
//! sources, per-branch pipelines, builders, trigger rules and worker
//! locks.

pub mod cli;
pub mod core;
pub mod registry;

// Re-export commonly used types
pub use crate::core::config::{ConfigError, ConfigStore, MasterConfig, ProjectConfig};
pub use crate::core::{
    BuildProperties, BuildStatus, BuildStep, HaltPolicy, Pipeline, PipelineFactory, RunCondition,
    StepResult,
};
pub use crate::registry::{Registry, RegistryError, WorkerLock};
