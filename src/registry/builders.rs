//! Builder registration - named pipeline instances bound to worker pools

use crate::core::{
    config::{BranchDeployment, ProjectConfig},
    pipeline::Pipeline,
};
use crate::registry::locks::LockAccess;

/// A registered pipeline instance.
///
/// Owns its pipeline exclusively; two builders never share one even when
/// their step lists would come out identical.
#[derive(Debug)]
pub struct BuilderConfig {
    /// Builder name: `<project>-<realm>`
    pub name: String,

    /// Workers allowed to run this builder's builds
    pub workers: Vec<String>,

    /// The generated pipeline
    pub pipeline: Pipeline,

    /// Tags shown by the orchestrator UI
    pub tags: Vec<String>,

    /// Worker lock attached in exclusive mode, if the project opted in
    pub lock: Option<LockAccess>,
}

/// Tags for one (project, deployment) pair: project name, namespace,
/// `home` when the target uses the project's home kubeconfig, then any
/// configured extras.
pub fn builder_tags(project: &ProjectConfig, deployment: &BranchDeployment) -> Vec<String> {
    let mut tags = vec![project.name.clone(), deployment.namespace.clone()];
    if deployment.kubeconfig.is_some() && deployment.kubeconfig == project.home_kubeconfig {
        tags.push("home".to_string());
    }
    tags.extend(project.tags.iter().cloned());
    tags
}
