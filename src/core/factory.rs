//! Pipeline factory - turns one (project, branch) pair into a step list

use crate::core::{
    config::{ConfigError, MasterConfig, ProjectConfig},
    pipeline::Pipeline,
    step::{BuildStep, RunCondition},
};
use std::collections::BTreeSet;

/// Name of a registered pipeline instance: `<project>-<realm>`.
///
/// Builders and triggers derive their names from this, which is what keeps
/// them collision-free across projects.
pub fn instance_name(project: &str, realm: &str) -> String {
    format!("{project}-{realm}")
}

/// Builds pipelines for one project.
///
/// The step skeleton is fixed: source sync, optional version resolution,
/// optional dependency install, optional schema migration, compile, test,
/// publish, then the deployment steps the branch's target calls for. A
/// fresh pipeline is produced for every branch; instances are never shared.
pub struct PipelineFactory<'a> {
    master: &'a MasterConfig,
    project: &'a ProjectConfig,
    deploy_branches: BTreeSet<String>,
    kubernetes_branches: BTreeSet<String>,
    ssh_branches: BTreeSet<String>,
}

impl<'a> PipelineFactory<'a> {
    pub fn new(master: &'a MasterConfig, project: &'a ProjectConfig) -> Self {
        let deployments = project.deployments();
        let deploy_branches = deployments.keys().cloned().collect();
        let kubernetes_branches = deployments
            .iter()
            .filter(|(_, deployment)| deployment.deploys_to_kubernetes())
            .map(|(branch, _)| branch.clone())
            .collect();
        let ssh_branches = deployments
            .iter()
            .filter(|(_, deployment)| deployment.deploys_over_ssh())
            .map(|(branch, _)| branch.clone())
            .collect();

        Self {
            master,
            project,
            deploy_branches,
            kubernetes_branches,
            ssh_branches,
        }
    }

    /// Build the pipeline for one deploy branch.
    pub fn pipeline_for(&self, branch: &str) -> Result<Pipeline, ConfigError> {
        let deployment = self.project.deployment(branch)?;
        let mut steps = Vec::new();

        steps.push(BuildStep::new("source sync", self.clone_command()));

        if let Some(version) = &self.project.version_command {
            let (command, env) = version.parts();
            steps.push(
                BuildStep::new("resolve version", command)
                    .with_env(env)
                    .capturing("project_version"),
            );
        }

        if let Some(install) = &self.project.install_command {
            let (command, env) = install.parts();
            steps.push(BuildStep::new("install dependencies", command).with_env(env));
        }

        if let Some(migrate) = &self.project.migrate_command {
            let (command, env) = migrate.parts();
            steps.push(BuildStep::new("migrate schema", command).with_env(env));
        }

        let (command, env) = self.project.build_command.parts();
        steps.push(BuildStep::new("compile", command).with_env(env));

        if let Some(test) = &self.project.test_command {
            let (command, env) = test.parts();
            let mut step = BuildStep::new("run tests", command).with_env(env);
            if !self.project.fail_on_tests {
                step = step.warn_only();
            }
            if !self.project.run_tests {
                step = step.when(RunCondition::Never);
            }
            steps.push(step);
        }

        if let Some(push) = &self.project.push_command {
            let (command, env) = push.parts();
            steps.push(
                BuildStep::new("push container image", command)
                    .with_env(env)
                    .when(RunCondition::DeployBranch {
                        branches: self.deploy_branches.clone(),
                    }),
            );
        }

        if deployment.deploys_to_kubernetes() {
            // deploys_to_kubernetes() checked both fields
            if let (Some(kubeconfig), Some(manifest)) = (&deployment.kubeconfig, &deployment.manifest) {
                let command = vec![
                    "kubectl".to_string(),
                    "--kubeconfig".to_string(),
                    kubeconfig.display().to_string(),
                    "apply".to_string(),
                    "-f".to_string(),
                    manifest.display().to_string(),
                ];
                steps.push(BuildStep::new("apply kubernetes manifest", command).when(
                    RunCondition::KubernetesTarget {
                        branches: self.kubernetes_branches.clone(),
                    },
                ));
            }
        }

        if let Some(ssh) = &deployment.ssh {
            let condition = RunCondition::RemoteShellTarget {
                branches: self.ssh_branches.clone(),
            };
            steps.push(
                BuildStep::new(
                    "update code on remote host",
                    vec![
                        "ssh".to_string(),
                        "-i".to_string(),
                        ssh.key.display().to_string(),
                        ssh.destination(),
                        format!("cd {} && git pull", ssh.remote_path.display()),
                    ],
                )
                .when(condition.clone()),
            );
            steps.push(
                BuildStep::new(
                    "restart service on remote host",
                    vec![
                        "ssh".to_string(),
                        "-i".to_string(),
                        ssh.key.display().to_string(),
                        ssh.destination(),
                        ssh.restart.clone(),
                    ],
                )
                .when(condition),
            );
        }

        Ok(Pipeline::new(
            instance_name(&self.project.name, &deployment.namespace),
            steps,
        ))
    }

    /// Registry prefix the master configures, for property snapshots.
    pub fn registry(&self) -> Option<&str> {
        self.master.registry.as_deref()
    }

    fn clone_command(&self) -> Vec<String> {
        let mut command = vec!["git".to_string(), "clone".to_string()];
        if self.project.shallow_clone {
            command.push("--depth".to_string());
            command.push("1".to_string());
        }
        command.push("--branch".to_string());
        command.push("{branch}".to_string());
        command.push(self.project.repo_url.clone());
        command.push(".".to_string());
        command
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        properties::BuildProperties,
        step::HaltPolicy,
    };

    fn master() -> MasterConfig {
        MasterConfig::from_yaml(
            r#"
registry: registryhub/acme
projects: []
"#,
        )
        .unwrap()
    }

    fn project() -> ProjectConfig {
        ProjectConfig::from_yaml(
            r#"
name: storefront
repo_url: https://github.com/acme/storefront
version_command: ["make", "version", "--always-make"]
build_command: ["make", "build", "VERSION={tag}", "COMMIT_HASH={revision}"]
test_command: ["make", "test"]
push_command: ["make", "push", "VERSION={tag}"]
branch_deployment_configs:
  deploy-prod:
    namespace: prod
    kubeconfig: /etc/kube/prod.yaml
    manifest: deploy/k8s.yaml
  deploy-staging:
    namespace: staging
    ssh:
      host: staging.acme.internal
      user: deploy
      key: /home/ci/.ssh/id_deploy
      remote_path: /var/www/storefront
      restart: systemctl restart storefront
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_skeleton_order_for_kubernetes_branch() {
        let master = master();
        let project = project();
        let factory = PipelineFactory::new(&master, &project);
        let pipeline = factory.pipeline_for("deploy-prod").unwrap();

        let names: Vec<&str> = pipeline.steps.iter().map(|step| step.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "source sync",
                "resolve version",
                "compile",
                "run tests",
                "push container image",
                "apply kubernetes manifest",
            ]
        );
        assert_eq!(pipeline.name, "storefront-prod");
    }

    #[test]
    fn test_ssh_branch_gets_remote_shell_steps() {
        let master = master();
        let project = project();
        let factory = PipelineFactory::new(&master, &project);
        let pipeline = factory.pipeline_for("deploy-staging").unwrap();

        assert!(pipeline.step("update code on remote host").is_some());
        assert!(pipeline.step("restart service on remote host").is_some());
        assert!(pipeline.step("apply kubernetes manifest").is_none());

        let restart = pipeline.step("restart service on remote host").unwrap();
        assert_eq!(restart.command[3], "deploy@staging.acme.internal");
    }

    #[test]
    fn test_fresh_pipeline_per_branch() {
        let master = master();
        let project = project();
        let factory = PipelineFactory::new(&master, &project);

        let prod = factory.pipeline_for("deploy-prod").unwrap();
        let staging = factory.pipeline_for("deploy-staging").unwrap();
        assert_ne!(prod.name, staging.name);
    }

    #[test]
    fn test_version_step_sets_property() {
        let master = master();
        let project = project();
        let factory = PipelineFactory::new(&master, &project);
        let pipeline = factory.pipeline_for("deploy-prod").unwrap();

        let step = pipeline.step("resolve version").unwrap();
        assert_eq!(step.sets_property.as_deref(), Some("project_version"));
    }

    #[test]
    fn test_soft_test_policy() {
        let master = master();
        let project = ProjectConfig::from_yaml(
            r#"
name: storefront
repo_url: https://github.com/acme/storefront
build_command: ["make", "build"]
test_command: ["make", "test"]
fail_on_tests: false
branch_to_namespace_mapping:
  deploy-prod: prod
"#,
        )
        .unwrap();
        let factory = PipelineFactory::new(&master, &project);
        let pipeline = factory.pipeline_for("deploy-prod").unwrap();

        let step = pipeline.step("run tests").unwrap();
        assert_eq!(step.halt_policy, HaltPolicy::WarnOnFailure);
    }

    #[test]
    fn test_disabled_tests_never_run() {
        let master = master();
        let project = ProjectConfig::from_yaml(
            r#"
name: storefront
repo_url: https://github.com/acme/storefront
build_command: ["make", "build"]
test_command: ["make", "test"]
run_tests: false
branch_to_namespace_mapping:
  deploy-prod: prod
"#,
        )
        .unwrap();
        let factory = PipelineFactory::new(&master, &project);
        let pipeline = factory.pipeline_for("deploy-prod").unwrap();

        let step = pipeline.step("run tests").unwrap();
        assert!(!step.should_run(&BuildProperties::new("storefront", "deploy-prod")));
    }

    #[test]
    fn test_deploy_steps_gated_on_deploy_branch() {
        let master = master();
        let project = project();
        let factory = PipelineFactory::new(&master, &project);
        let pipeline = factory.pipeline_for("deploy-prod").unwrap();

        let push = pipeline.step("push container image").unwrap();
        assert!(push.should_run(&BuildProperties::new("storefront", "deploy-prod")));
        assert!(!push.should_run(&BuildProperties::new("storefront", "feature/x")));

        let apply = pipeline.step("apply kubernetes manifest").unwrap();
        assert!(apply.should_run(&BuildProperties::new("storefront", "deploy-prod")));
        assert!(!apply.should_run(&BuildProperties::new("storefront", "deploy-staging")));
    }

    #[test]
    fn test_unknown_branch_is_an_error() {
        let master = master();
        let project = project();
        let factory = PipelineFactory::new(&master, &project);
        assert!(factory.pipeline_for("feature/x").is_err());
    }
}
