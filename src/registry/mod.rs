//! The registration plan assembled at orchestrator startup
//!
//! Everything here is built once, synchronously, from loaded
//! configuration: change sources, builders, triggers, and the worker
//! locks they share. The external orchestrator consumes the plan;
//! nothing in this module runs builds.

pub mod builders;
pub mod changes;
pub mod locks;
pub mod triggers;

pub use builders::*;
pub use changes::*;
pub use locks::*;
pub use triggers::*;

use crate::core::{
    config::{ConfigError, ConfigStore, MasterConfig, ProjectConfig},
    factory::PipelineFactory,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Registration-layer errors
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("duplicate builder name '{0}'")]
    DuplicateBuilder(String),

    #[error("duplicate trigger name '{0}'")]
    DuplicateTrigger(String),

    #[error("trigger '{trigger}' references unknown builder '{builder}'")]
    UnknownBuilder { trigger: String, builder: String },

    #[error("'{owner}' references undefined lock '{lock}'")]
    UndefinedLock { owner: String, lock: String },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// The aggregate registration plan
#[derive(Debug, Default)]
pub struct Registry {
    change_sources: Vec<GitPollerConfig>,
    builders: Vec<BuilderConfig>,
    triggers: Vec<Trigger>,
    locks: BTreeMap<String, Arc<WorkerLock>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compose the full plan: define the master's locks, then run
    /// loader -> factory -> registrars once per project, in master file
    /// order.
    ///
    /// A project whose configuration never loaded (lenient store) fails
    /// here with [`ConfigError::MissingProject`] rather than silently
    /// contributing zero builders.
    pub fn plan(master: &MasterConfig, store: &ConfigStore) -> Result<Self, RegistryError> {
        let mut registry = Self::new();

        for lock in &master.locks {
            registry.define_lock(&lock.name, lock.max_count);
        }

        for entry in &master.projects {
            let project = store.project(&entry.name)?;
            registry.register_project(master, project)?;
        }

        registry.validate()?;
        Ok(registry)
    }

    /// Define a named worker lock and return the shared handle.
    pub fn define_lock(&mut self, name: &str, max_count: usize) -> Arc<WorkerLock> {
        let lock = WorkerLock::new(name, max_count);
        self.locks.insert(name.to_string(), Arc::clone(&lock));
        lock
    }

    /// Shared handle to a defined lock.
    pub fn lock(&self, name: &str) -> Option<&Arc<WorkerLock>> {
        self.locks.get(name)
    }

    /// Register one project: its change source, then one builder and one
    /// force/commit trigger pair per deploy branch, in sorted branch
    /// order.
    pub fn register_project(
        &mut self,
        master: &MasterConfig,
        project: &ProjectConfig,
    ) -> Result<(), RegistryError> {
        self.add_change_source(GitPollerConfig::for_project(master, project));

        let lock_access = match &project.lock {
            Some(name) => Some(
                self.locks
                    .get(name)
                    .ok_or_else(|| RegistryError::UndefinedLock {
                        owner: project.name.clone(),
                        lock: name.clone(),
                    })?
                    .access(),
            ),
            None => None,
        };

        let factory = PipelineFactory::new(master, project);
        let deployments = project.deployments();

        for (branch, deployment) in &deployments {
            let pipeline = factory.pipeline_for(branch)?;
            let name = pipeline.name.clone();

            self.add_builder(BuilderConfig {
                name,
                workers: project.workers.clone(),
                pipeline,
                tags: builder_tags(project, deployment),
                lock: lock_access.clone(),
            })?;

            self.add_trigger(Trigger::Force(ForceTrigger::for_branch(
                project,
                branch,
                &deployment.namespace,
            )))?;
            self.add_trigger(Trigger::Commit(CommitTrigger::for_branch(
                project,
                branch,
                &deployment.namespace,
            )))?;
        }

        info!(
            project = %project.name,
            builders = deployments.len(),
            "registered project"
        );
        Ok(())
    }

    pub fn add_change_source(&mut self, poller: GitPollerConfig) {
        self.change_sources.push(poller);
    }

    /// Register a builder; names must be unique registry-wide.
    pub fn add_builder(&mut self, builder: BuilderConfig) -> Result<(), RegistryError> {
        if self.builder(&builder.name).is_some() {
            return Err(RegistryError::DuplicateBuilder(builder.name));
        }
        self.builders.push(builder);
        Ok(())
    }

    /// Register a trigger; names must be unique and the referenced
    /// builder must already exist.
    pub fn add_trigger(&mut self, trigger: Trigger) -> Result<(), RegistryError> {
        if self.triggers.iter().any(|t| t.name() == trigger.name()) {
            return Err(RegistryError::DuplicateTrigger(trigger.name().to_string()));
        }
        if self.builder(trigger.builder()).is_none() {
            return Err(RegistryError::UnknownBuilder {
                trigger: trigger.name().to_string(),
                builder: trigger.builder().to_string(),
            });
        }
        self.triggers.push(trigger);
        Ok(())
    }

    pub fn builder(&self, name: &str) -> Option<&BuilderConfig> {
        self.builders.iter().find(|builder| builder.name == name)
    }

    pub fn builders(&self) -> &[BuilderConfig] {
        &self.builders
    }

    pub fn triggers(&self) -> &[Trigger] {
        &self.triggers
    }

    pub fn change_sources(&self) -> &[GitPollerConfig] {
        &self.change_sources
    }

    pub fn locks(&self) -> impl Iterator<Item = &Arc<WorkerLock>> {
        self.locks.values()
    }

    /// Re-check the cross-references of an assembled plan.
    pub fn validate(&self) -> Result<(), RegistryError> {
        for trigger in &self.triggers {
            if self.builder(trigger.builder()).is_none() {
                return Err(RegistryError::UnknownBuilder {
                    trigger: trigger.name().to_string(),
                    builder: trigger.builder().to_string(),
                });
            }
        }
        for builder in &self.builders {
            if let Some(access) = &builder.lock {
                if !self.locks.contains_key(access.lock_name()) {
                    return Err(RegistryError::UndefinedLock {
                        owner: builder.name.clone(),
                        lock: access.lock_name().to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}
