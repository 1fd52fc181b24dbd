//! Change sources - per-project git poller registrations

use crate::core::config::{MasterConfig, ProjectConfig};
use std::path::PathBuf;
use std::time::Duration;

/// Registration record for one project's repository poller.
///
/// The polling itself happens in the external orchestrator; this layer
/// only declares what to poll and how often.
#[derive(Debug, Clone)]
pub struct GitPollerConfig {
    /// Repository to poll
    pub repo_url: String,

    /// Project label attached to detected changes
    pub project: String,

    /// Fixed poll interval
    pub poll_interval: Duration,

    /// Also poll immediately at orchestrator startup
    pub poll_at_launch: bool,

    /// Watch every branch, not just the deploy branches
    pub poll_all_branches: bool,

    /// Report force-pushes that introduce no new commits
    pub build_pushes_with_no_commits: bool,

    /// Scratch checkout the poller works in
    pub workdir: PathBuf,
}

impl GitPollerConfig {
    /// Derive the poller registration for one project.
    pub fn for_project(master: &MasterConfig, project: &ProjectConfig) -> Self {
        Self {
            repo_url: project.repo_url.clone(),
            project: project.name.clone(),
            poll_interval: Duration::from_secs(project.poll_interval_secs),
            poll_at_launch: true,
            poll_all_branches: true,
            build_pushes_with_no_commits: true,
            workdir: master.poll_workdir.join(format!("gitpoller-{}", project.name)),
        }
    }
}
