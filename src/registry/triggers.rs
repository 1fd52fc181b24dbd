//! Trigger rules - manual force triggers and automatic on-commit triggers

use crate::core::{
    config::ProjectConfig,
    factory::instance_name,
    step::BranchFilter,
};
use std::time::Duration;

/// Name of the manual trigger for one (project, realm) pair.
pub fn force_trigger_name(project: &str, realm: &str) -> String {
    format!("force-{project}-{realm}")
}

/// Name of the on-commit trigger for one (project, realm) pair.
pub fn commit_trigger_name(project: &str, realm: &str) -> String {
    format!("commit-{project}-{realm}")
}

/// Manually invoked activation of one builder with fixed parameters.
#[derive(Debug, Clone)]
pub struct ForceTrigger {
    /// Trigger name, unique within the registry
    pub name: String,

    /// The one builder this trigger activates
    pub builder: String,

    /// Branch the forced build checks out
    pub branch: String,

    /// Repository parameter, fixed to the project's repo
    pub repository: String,

    /// Project label
    pub project: String,
}

impl ForceTrigger {
    pub fn for_branch(project: &ProjectConfig, branch: &str, realm: &str) -> Self {
        Self {
            name: force_trigger_name(&project.name, realm),
            builder: instance_name(&project.name, realm),
            branch: branch.to_string(),
            repository: project.repo_url.clone(),
            project: project.name.clone(),
        }
    }
}

/// Automatic activation on a detected commit matching a branch filter.
///
/// The stabilization timer is zero: the trigger fires on the first
/// detected change with no debounce window.
#[derive(Debug, Clone)]
pub struct CommitTrigger {
    /// Trigger name, unique within the registry
    pub name: String,

    /// The one builder this trigger activates
    pub builder: String,

    /// Branch filter a detected change must match
    pub branch_filter: BranchFilter,

    /// Project label a detected change must carry
    pub project: String,

    /// Quiet period before firing; always zero here
    pub tree_stable_timer: Duration,
}

impl CommitTrigger {
    pub fn for_branch(project: &ProjectConfig, branch: &str, realm: &str) -> Self {
        Self {
            name: commit_trigger_name(&project.name, realm),
            builder: instance_name(&project.name, realm),
            branch_filter: BranchFilter::Exact(branch.to_string()),
            project: project.name.clone(),
            tree_stable_timer: Duration::ZERO,
        }
    }

    /// Whether a detected change activates this trigger.
    pub fn matches(&self, branch: &str, project: &str) -> bool {
        self.project == project && self.branch_filter.matches(branch)
    }
}

/// A registered trigger rule
#[derive(Debug, Clone)]
pub enum Trigger {
    Force(ForceTrigger),
    Commit(CommitTrigger),
}

impl Trigger {
    pub fn name(&self) -> &str {
        match self {
            Trigger::Force(trigger) => &trigger.name,
            Trigger::Commit(trigger) => &trigger.name,
        }
    }

    /// Name of the one builder the trigger activates.
    pub fn builder(&self) -> &str {
        match self {
            Trigger::Force(trigger) => &trigger.builder,
            Trigger::Commit(trigger) => &trigger.builder,
        }
    }
}
