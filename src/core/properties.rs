//! Build properties - the immutable per-build snapshot

use serde::Serialize;

/// Branch value bound to manually forced builds.
///
/// A force trigger fires with explicit parameters instead of a detected
/// commit; the orchestrator reports its branch as the empty string.
pub const FORCE_BRANCH: &str = "";

/// Properties bound to a single (prospective) build.
///
/// Run conditions and command interpolation read this snapshot and nothing
/// else; registration-time configuration is copied in, never referenced.
#[derive(Debug, Clone, Serialize)]
pub struct BuildProperties {
    /// Project the build belongs to
    pub project: String,

    /// Branch being built (empty for forced builds)
    pub branch: String,

    /// Orchestrator-assigned build number
    pub build_number: u64,

    /// Resolved commit hash
    pub revision: String,

    /// Upstream version reported by the project's version command
    pub project_version: String,

    /// Deployment namespace resolved for this branch, if any
    pub namespace: Option<String>,

    /// Container registry prefix, if any
    pub registry: Option<String>,

    /// Tag epoch; bumped whenever build-number bookkeeping is reset
    pub schema_version: u32,
}

impl BuildProperties {
    pub fn new(project: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            branch: branch.into(),
            build_number: 0,
            revision: String::new(),
            project_version: "0.0.0".to_string(),
            namespace: None,
            registry: None,
            schema_version: 1,
        }
    }

    /// Whether this snapshot describes a manually forced build.
    pub fn is_force(&self) -> bool {
        self.branch == FORCE_BRANCH
    }

    /// Compose the artifact/container tag:
    /// `<project_version>-<branch>-<build_number>-<schema_version>`.
    pub fn version_tag(&self) -> String {
        format!(
            "{}-{}-{}-{}",
            self.project_version, self.branch, self.build_number, self.schema_version
        )
    }

    /// Fully qualified container image name (`<registry>/<project>`).
    pub fn image(&self) -> Option<String> {
        self.registry
            .as_ref()
            .map(|registry| format!("{}/{}", registry, self.project))
    }

    /// Interpolate `{placeholder}` markers in a command argument.
    ///
    /// Unknown placeholders are left verbatim so opaque external commands
    /// that happen to contain braces pass through untouched.
    pub fn render(&self, template: &str) -> String {
        let mut rendered = template.to_string();

        let substitutions = [
            ("{project}", self.project.clone()),
            ("{branch}", self.branch.clone()),
            ("{build_number}", self.build_number.to_string()),
            ("{revision}", self.revision.clone()),
            ("{version}", self.project_version.clone()),
            ("{tag}", self.version_tag()),
            ("{namespace}", self.namespace.clone().unwrap_or_default()),
            ("{registry}", self.registry.clone().unwrap_or_default()),
            ("{image}", self.image().unwrap_or_default()),
        ];

        for (placeholder, value) in substitutions {
            rendered = rendered.replace(placeholder, &value);
        }

        rendered
    }

    /// Render every argument of a command vector.
    pub fn render_command(&self, command: &[String]) -> Vec<String> {
        command.iter().map(|arg| self.render(arg)).collect()
    }
}
