//! Master and per-project configuration from YAML

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::error;

/// Configuration layer errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid configuration: {0}")]
    InvalidYaml(#[from] serde_yaml::Error),

    /// Lookup of a project whose configuration never loaded. This is the
    /// failure surface for lenient loading: the loader returned no data,
    /// and the first registrar that needs it lands here.
    #[error("no configuration loaded for project '{0}'")]
    MissingProject(String),

    #[error("branch '{branch}' has no deployment target in project '{project}'")]
    UnknownBranch { project: String, branch: String },

    #[error("project '{project}': {message}")]
    Invalid { project: String, message: String },
}

fn default_poll_interval() -> u64 {
    600
}

fn default_true() -> bool {
    true
}

fn default_schema_version() -> u32 {
    1
}

fn default_lock_max_count() -> usize {
    1
}

fn default_poll_workdir() -> PathBuf {
    PathBuf::from("/tmp")
}

/// Command definition - a bare argument vector or one with env overrides
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandDef {
    /// Bare argument vector
    Args(Vec<String>),
    /// Argument vector with environment overrides
    Full {
        command: Vec<String>,
        #[serde(default)]
        env: BTreeMap<String, String>,
    },
}

impl CommandDef {
    pub fn command(&self) -> &[String] {
        match self {
            CommandDef::Args(command) => command,
            CommandDef::Full { command, .. } => command,
        }
    }

    /// Split into owned (command, env) parts for step construction.
    pub fn parts(&self) -> (Vec<String>, BTreeMap<String, String>) {
        match self {
            CommandDef::Args(command) => (command.clone(), BTreeMap::new()),
            CommandDef::Full { command, env } => (command.clone(), env.clone()),
        }
    }
}

/// Remote-shell deployment parameters for one branch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshTarget {
    /// Host to deploy to
    pub host: String,

    /// Login user
    pub user: String,

    /// Identity file passed to ssh -i
    pub key: PathBuf,

    /// Checkout directory on the remote host
    pub remote_path: PathBuf,

    /// Command that restarts the service after the code pull
    pub restart: String,
}

impl SshTarget {
    /// `user@host` destination argument
    pub fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }
}

/// Deployment parameters for one branch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchDeployment {
    /// Destination namespace (realm); also names the builder
    pub namespace: String,

    /// Kubeconfig used to apply the manifest, when deploying to Kubernetes
    #[serde(default)]
    pub kubeconfig: Option<PathBuf>,

    /// Kubernetes manifest path within the checkout
    #[serde(default)]
    pub manifest: Option<PathBuf>,

    /// Remote-shell deployment target, when deploying over ssh
    #[serde(default)]
    pub ssh: Option<SshTarget>,
}

impl BranchDeployment {
    /// Namespace-only target (publish, no deploy step)
    pub fn namespace_only(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            kubeconfig: None,
            manifest: None,
            ssh: None,
        }
    }

    pub fn deploys_to_kubernetes(&self) -> bool {
        self.kubeconfig.is_some() && self.manifest.is_some()
    }

    pub fn deploys_over_ssh(&self) -> bool {
        self.ssh.is_some()
    }
}

/// Per-project configuration loaded from one YAML file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project name; also the change-source project label
    pub name: String,

    /// Source repository URL
    pub repo_url: String,

    /// Poll interval for the project's change source
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Use a shallow clone for source sync
    #[serde(default = "default_true")]
    pub shallow_clone: bool,

    /// Workers that may run this project's builds
    #[serde(default)]
    pub workers: Vec<String>,

    /// Named worker lock the builders attach in exclusive mode
    #[serde(default)]
    pub lock: Option<String>,

    /// Extra builder tags
    #[serde(default)]
    pub tags: Vec<String>,

    /// Command whose output becomes the project_version property
    #[serde(default)]
    pub version_command: Option<CommandDef>,

    /// Dependency install command, when the project needs one
    #[serde(default)]
    pub install_command: Option<CommandDef>,

    /// Schema migration command, when the project needs one
    #[serde(default)]
    pub migrate_command: Option<CommandDef>,

    /// Compile command
    pub build_command: CommandDef,

    /// Test command; omitting it omits the test step
    #[serde(default)]
    pub test_command: Option<CommandDef>,

    /// Containerize/publish command, gated on deploy branches
    #[serde(default)]
    pub push_command: Option<CommandDef>,

    /// Disable to register the test step as configuration-disabled
    #[serde(default = "default_true")]
    pub run_tests: bool,

    /// When false, test failures warn instead of halting
    #[serde(default = "default_true")]
    pub fail_on_tests: bool,

    /// Builders deploying with this kubeconfig get a `home` tag
    #[serde(default)]
    pub home_kubeconfig: Option<PathBuf>,

    /// Rich branch mapping: branch -> deployment parameters
    #[serde(default)]
    branch_deployment_configs: BTreeMap<String, BranchDeployment>,

    /// Shorthand branch mapping: branch -> namespace
    #[serde(default)]
    branch_to_namespace_mapping: BTreeMap<String, String>,
}

impl ProjectConfig {
    /// Load and validate a project configuration; parse errors propagate.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: ProjectConfig =
            serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a project configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: ProjectConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a project configuration, logging failures instead of
    /// propagating them.
    ///
    /// Callers get `None` and must cope with the project being absent;
    /// the next lookup through [`ConfigStore::project`] surfaces
    /// [`ConfigError::MissingProject`]. Prefer [`ProjectConfig::from_file`]
    /// unless startup must survive a broken file.
    pub fn load_lenient<P: AsRef<Path>>(path: P) -> Option<Self> {
        match Self::from_file(path.as_ref()) {
            Ok(config) => Some(config),
            Err(err) => {
                error!(path = %path.as_ref().display(), "skipping project config: {err}");
                None
            }
        }
    }

    /// Validate the project configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::Invalid {
            project: self.name.clone(),
            message,
        };

        if self.name.is_empty() {
            return Err(ConfigError::Invalid {
                project: "<unnamed>".to_string(),
                message: "project name must not be empty".to_string(),
            });
        }
        if self.repo_url.is_empty() {
            return Err(invalid("repo_url must not be empty".to_string()));
        }
        if self.build_command.command().is_empty() {
            return Err(invalid("build_command must not be empty".to_string()));
        }

        for branch in self.branch_deployment_configs.keys() {
            if self.branch_to_namespace_mapping.contains_key(branch) {
                return Err(invalid(format!(
                    "branch '{branch}' appears in both branch_deployment_configs and branch_to_namespace_mapping"
                )));
            }
        }

        let deployments = self.deployments();
        if deployments.is_empty() {
            return Err(invalid("no branch has a deployment target".to_string()));
        }
        for (branch, deployment) in &deployments {
            if deployment.namespace.is_empty() {
                return Err(invalid(format!("branch '{branch}' maps to an empty namespace")));
            }
        }

        Ok(())
    }

    /// Branch -> deployment mapping with the namespace shorthand expanded.
    ///
    /// Keys iterate in sorted order, which is what makes registration
    /// reproducible across restarts.
    pub fn deployments(&self) -> BTreeMap<String, BranchDeployment> {
        let mut merged = self.branch_deployment_configs.clone();
        for (branch, namespace) in &self.branch_to_namespace_mapping {
            merged
                .entry(branch.clone())
                .or_insert_with(|| BranchDeployment::namespace_only(namespace.clone()));
        }
        merged
    }

    /// Deployment parameters for one branch.
    pub fn deployment(&self, branch: &str) -> Result<BranchDeployment, ConfigError> {
        self.deployments()
            .remove(branch)
            .ok_or_else(|| ConfigError::UnknownBranch {
                project: self.name.clone(),
                branch: branch.to_string(),
            })
    }

    /// Sorted, deduplicated deploy branch names.
    pub fn deploy_branches(&self) -> Vec<String> {
        self.deployments().into_keys().collect()
    }
}

/// Worker lock definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockConfig {
    /// Lock name, unique within the master
    pub name: String,

    /// Maximum concurrent holders
    #[serde(default = "default_lock_max_count")]
    pub max_count: usize,
}

/// One managed project: a name and the path of its configuration file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectEntry {
    pub name: String,
    pub config: PathBuf,
}

/// Orchestrator-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasterConfig {
    /// Tag epoch appended to every version tag; increment after wiping
    /// the orchestrator's build-number bookkeeping
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    /// Container registry prefix for {registry}/{image} interpolation
    #[serde(default)]
    pub registry: Option<String>,

    /// Base directory for git poller workdirs
    #[serde(default = "default_poll_workdir")]
    pub poll_workdir: PathBuf,

    /// Worker lock definitions
    #[serde(default)]
    pub locks: Vec<LockConfig>,

    /// Managed projects, in registration order
    pub projects: Vec<ProjectEntry>,
}

impl MasterConfig {
    /// Load and validate the master configuration; always strict.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: MasterConfig =
            serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Parse the master configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: MasterConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the master configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::Invalid {
            project: "<master>".to_string(),
            message,
        };

        let mut lock_names = std::collections::HashSet::new();
        for lock in &self.locks {
            if lock.max_count == 0 {
                return Err(invalid(format!("lock '{}' has max_count 0", lock.name)));
            }
            if !lock_names.insert(&lock.name) {
                return Err(invalid(format!("duplicate lock name '{}'", lock.name)));
            }
        }

        let mut project_names = std::collections::HashSet::new();
        for project in &self.projects {
            if !project_names.insert(&project.name) {
                return Err(invalid(format!("duplicate project name '{}'", project.name)));
            }
        }

        Ok(())
    }

    /// Lock definition by name.
    pub fn lock(&self, name: &str) -> Option<&LockConfig> {
        self.locks.iter().find(|lock| lock.name == name)
    }
}

/// Loaded project configurations, keyed by project name.
///
/// With lenient loading a broken file leaves a hole behind its name; the
/// hole is only discovered when a registrar asks for the project.
#[derive(Debug, Default)]
pub struct ConfigStore {
    projects: BTreeMap<String, Option<ProjectConfig>>,
}

impl ConfigStore {
    /// Load every project config strictly; the first failure propagates.
    pub fn load(master: &MasterConfig, base_dir: &Path) -> Result<Self, ConfigError> {
        let mut projects = BTreeMap::new();
        for entry in &master.projects {
            let config = ProjectConfig::from_file(resolve(base_dir, &entry.config))?;
            Self::check_name(entry, &config)?;
            projects.insert(entry.name.clone(), Some(config));
        }
        Ok(Self { projects })
    }

    /// Load every project config leniently: failures are logged and the
    /// project is recorded with no data.
    pub fn load_lenient(master: &MasterConfig, base_dir: &Path) -> Self {
        let mut projects = BTreeMap::new();
        for entry in &master.projects {
            let config = ProjectConfig::load_lenient(resolve(base_dir, &entry.config))
                .filter(|config| match Self::check_name(entry, config) {
                    Ok(()) => true,
                    Err(err) => {
                        error!("skipping project config: {err}");
                        false
                    }
                });
            projects.insert(entry.name.clone(), config);
        }
        Self { projects }
    }

    fn check_name(entry: &ProjectEntry, config: &ProjectConfig) -> Result<(), ConfigError> {
        if entry.name != config.name {
            return Err(ConfigError::Invalid {
                project: entry.name.clone(),
                message: format!("config file declares project name '{}'", config.name),
            });
        }
        Ok(())
    }

    /// Insert an already-built configuration (tests, embedding).
    pub fn insert(&mut self, config: ProjectConfig) {
        self.projects.insert(config.name.clone(), Some(config));
    }

    /// Names of projects whose configuration failed to load.
    pub fn missing(&self) -> impl Iterator<Item = &str> {
        self.projects
            .iter()
            .filter(|(_, config)| config.is_none())
            .map(|(name, _)| name.as_str())
    }

    /// Look up a project's configuration.
    pub fn project(&self, name: &str) -> Result<&ProjectConfig, ConfigError> {
        self.projects
            .get(name)
            .and_then(|config| config.as_ref())
            .ok_or_else(|| ConfigError::MissingProject(name.to_string()))
    }
}

fn resolve(base_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}
