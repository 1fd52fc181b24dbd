//! Step domain model

use crate::core::properties::{BuildProperties, FORCE_BRANCH};
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};

/// What a step failure does to the rest of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltPolicy {
    /// Failure aborts the remaining steps and fails the build
    HaltOnFailure,
    /// Failure is recorded, the build continues in a degraded state
    WarnOnFailure,
}

/// Branch filter for commit triggers (not serializable due to Regex)
#[derive(Debug, Clone)]
pub enum BranchFilter {
    /// Exact branch name match
    Exact(String),
    /// Regular expression match
    Pattern(Regex),
}

impl BranchFilter {
    /// Check if the filter matches the given branch name
    pub fn matches(&self, branch: &str) -> bool {
        match self {
            BranchFilter::Exact(name) => branch == name,
            BranchFilter::Pattern(regex) => regex.is_match(branch),
        }
    }

    pub fn display(&self) -> String {
        match self {
            BranchFilter::Exact(name) => name.clone(),
            BranchFilter::Pattern(regex) => format!("[pattern: {}]", regex.as_str()),
        }
    }
}

/// Run condition attached to a step, evaluated against the build snapshot.
///
/// Conditions own the configuration data they need; they never reach back
/// into a live config value. A step whose condition evaluates false is
/// skipped, not failed.
#[derive(Debug, Clone)]
pub enum RunCondition {
    /// Unconditional
    Always,
    /// Disabled by configuration
    Never,
    /// Branch has a deployment target, or the build was manually forced
    DeployBranch { branches: BTreeSet<String> },
    /// Branch deploys to a Kubernetes target
    KubernetesTarget { branches: BTreeSet<String> },
    /// Branch deploys over a remote shell
    RemoteShellTarget { branches: BTreeSet<String> },
    /// Branch name matches a filter
    BranchMatches(BranchFilter),
}

impl RunCondition {
    /// Evaluate the condition against a build snapshot.
    pub fn evaluate(&self, props: &BuildProperties) -> bool {
        match self {
            RunCondition::Always => true,
            RunCondition::Never => false,
            RunCondition::DeployBranch { branches } => {
                branches.contains(&props.branch) || props.branch == FORCE_BRANCH
            }
            RunCondition::KubernetesTarget { branches } => branches.contains(&props.branch),
            RunCondition::RemoteShellTarget { branches } => branches.contains(&props.branch),
            RunCondition::BranchMatches(filter) => filter.matches(&props.branch),
        }
    }

    /// Human-readable description, used as the skip reason in plans.
    pub fn describe(&self) -> String {
        match self {
            RunCondition::Always => "always".to_string(),
            RunCondition::Never => "disabled by configuration".to_string(),
            RunCondition::DeployBranch { .. } => "branch has a deployment target".to_string(),
            RunCondition::KubernetesTarget { .. } => "branch deploys to kubernetes".to_string(),
            RunCondition::RemoteShellTarget { .. } => "branch deploys over ssh".to_string(),
            RunCondition::BranchMatches(filter) => format!("branch matches {}", filter.display()),
        }
    }
}

/// A single step in a pipeline
#[derive(Debug, Clone)]
pub struct BuildStep {
    /// Step name, unique within its pipeline
    pub name: String,

    /// External command as an argument vector; arguments may carry
    /// `{placeholder}` markers rendered against the build snapshot
    pub command: Vec<String>,

    /// Environment overrides for the command
    pub env: BTreeMap<String, String>,

    /// Failure policy
    pub halt_policy: HaltPolicy,

    /// Optional run condition; absent means the step always runs
    pub condition: Option<RunCondition>,

    /// Capture the command's output into a named build property
    pub sets_property: Option<String>,
}

impl BuildStep {
    /// Create a halt-on-failure step with no condition.
    pub fn new(name: impl Into<String>, command: Vec<String>) -> Self {
        Self {
            name: name.into(),
            command,
            env: BTreeMap::new(),
            halt_policy: HaltPolicy::HaltOnFailure,
            condition: None,
            sets_property: None,
        }
    }

    /// Downgrade failures of this step to warnings.
    pub fn warn_only(mut self) -> Self {
        self.halt_policy = HaltPolicy::WarnOnFailure;
        self
    }

    /// Attach a run condition.
    pub fn when(mut self, condition: RunCondition) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Add environment overrides.
    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = env;
        self
    }

    /// Capture the step's output into the named build property.
    pub fn capturing(mut self, property: impl Into<String>) -> Self {
        self.sets_property = Some(property.into());
        self
    }

    /// Whether the step would run for the given build snapshot.
    pub fn should_run(&self, props: &BuildProperties) -> bool {
        self.condition
            .as_ref()
            .map(|condition| condition.evaluate(props))
            .unwrap_or(true)
    }

    /// Command with all placeholders rendered for the given snapshot.
    pub fn rendered_command(&self, props: &BuildProperties) -> Vec<String> {
        props.render_command(&self.command)
    }
}
