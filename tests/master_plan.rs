//! End-to-end registration plan tests over on-disk config fixtures

use buildmaster::core::properties::{BuildProperties, FORCE_BRANCH};
use buildmaster::{ConfigError, ConfigStore, MasterConfig, Registry, RegistryError};
use std::fs;
use std::path::Path;

const MASTER_YAML: &str = r#"
schema_version: 2
registry: registryhub/acme
locks:
  - name: acme-worker-lock
    max_count: 1
projects:
  - name: storefront
    config: storefront.yaml
  - name: inventory
    config: inventory.yaml
"#;

const STOREFRONT_YAML: &str = r#"
name: storefront
repo_url: https://github.com/acme/storefront
workers: ["acme-worker"]
lock: acme-worker-lock
version_command: ["make", "version", "--always-make"]
build_command: ["make", "build", "VERSION={tag}", "COMMIT_HASH={revision}"]
test_command: ["make", "test"]
push_command: ["make", "push", "VERSION={tag}"]
branch_deployment_configs:
  deploy-b:
    namespace: b
    kubeconfig: /etc/kube/b.yaml
    manifest: deploy/k8s.yaml
  deploy-a:
    namespace: a
    ssh:
      host: a.acme.internal
      user: deploy
      key: /home/ci/.ssh/id_deploy
      remote_path: /var/www/storefront
      restart: systemctl restart storefront
"#;

const INVENTORY_YAML: &str = r#"
name: inventory
repo_url: https://github.com/acme/inventory
workers: ["acme-worker"]
lock: acme-worker-lock
build_command: ["make", "build"]
test_command: ["make", "test"]
fail_on_tests: false
branch_to_namespace_mapping:
  deploy-b: b
  deploy-a: a
"#;

fn write_fixtures(dir: &Path) {
    fs::write(dir.join("master.yaml"), MASTER_YAML).unwrap();
    fs::write(dir.join("storefront.yaml"), STOREFRONT_YAML).unwrap();
    fs::write(dir.join("inventory.yaml"), INVENTORY_YAML).unwrap();
}

fn plan_from(dir: &Path) -> Registry {
    let master = MasterConfig::from_file(dir.join("master.yaml")).unwrap();
    let store = ConfigStore::load(&master, dir).unwrap();
    Registry::plan(&master, &store).unwrap()
}

#[test]
fn one_builder_per_project_and_deploy_branch() {
    let dir = tempfile::tempdir().unwrap();
    write_fixtures(dir.path());
    let registry = plan_from(dir.path());

    let names: Vec<&str> = registry
        .builders()
        .iter()
        .map(|builder| builder.name.as_str())
        .collect();

    // Project order from the master file, branches sorted within each
    assert_eq!(
        names,
        vec!["storefront-a", "storefront-b", "inventory-a", "inventory-b"]
    );
}

#[test]
fn registration_order_is_reproducible() {
    let dir = tempfile::tempdir().unwrap();
    write_fixtures(dir.path());

    let first: Vec<String> = plan_from(dir.path())
        .builders()
        .iter()
        .map(|builder| builder.name.clone())
        .collect();
    let second: Vec<String> = plan_from(dir.path())
        .builders()
        .iter()
        .map(|builder| builder.name.clone())
        .collect();

    assert_eq!(first, second);
}

#[test]
fn every_builder_gets_a_force_and_a_commit_trigger() {
    let dir = tempfile::tempdir().unwrap();
    write_fixtures(dir.path());
    let registry = plan_from(dir.path());

    assert_eq!(registry.triggers().len(), 8);

    for builder in registry.builders() {
        let bound: Vec<&str> = registry
            .triggers()
            .iter()
            .filter(|trigger| trigger.builder() == builder.name)
            .map(|trigger| trigger.name())
            .collect();
        assert_eq!(bound.len(), 2, "builder {} should have two triggers", builder.name);
    }

    let mut names: Vec<&str> = registry.triggers().iter().map(|t| t.name()).collect();
    let total = names.len();
    names.sort();
    names.dedup();
    assert_eq!(names.len(), total, "trigger names must be unique");
}

#[test]
fn force_trigger_fixes_branch_and_repository() {
    let dir = tempfile::tempdir().unwrap();
    write_fixtures(dir.path());
    let registry = plan_from(dir.path());

    let force = registry
        .triggers()
        .iter()
        .find_map(|trigger| match trigger {
            buildmaster::registry::Trigger::Force(force) if force.name == "force-storefront-a" => {
                Some(force)
            }
            _ => None,
        })
        .unwrap();

    assert_eq!(force.builder, "storefront-a");
    assert_eq!(force.branch, "deploy-a");
    assert_eq!(force.repository, "https://github.com/acme/storefront");
}

#[test]
fn commit_trigger_fires_only_for_its_branch_and_project() {
    let dir = tempfile::tempdir().unwrap();
    write_fixtures(dir.path());
    let registry = plan_from(dir.path());

    let commit = registry
        .triggers()
        .iter()
        .find_map(|trigger| match trigger {
            buildmaster::registry::Trigger::Commit(commit)
                if commit.name == "commit-inventory-b" =>
            {
                Some(commit)
            }
            _ => None,
        })
        .unwrap();

    assert!(commit.matches("deploy-b", "inventory"));
    assert!(!commit.matches("deploy-b", "storefront"));
    assert!(!commit.matches("deploy-a", "inventory"));
    assert_eq!(commit.tree_stable_timer.as_secs(), 0);
}

#[test]
fn deploy_steps_run_only_for_their_branch() {
    let dir = tempfile::tempdir().unwrap();
    write_fixtures(dir.path());
    let registry = plan_from(dir.path());

    let builder = registry.builder("storefront-b").unwrap();
    let apply = builder.pipeline.step("apply kubernetes manifest").unwrap();

    assert!(apply.should_run(&BuildProperties::new("storefront", "deploy-b")));
    assert!(!apply.should_run(&BuildProperties::new("storefront", "deploy-a")));
    assert!(!apply.should_run(&BuildProperties::new("storefront", "feature/x")));

    // The ssh branch got remote-shell steps instead
    let builder = registry.builder("storefront-a").unwrap();
    assert!(builder.pipeline.step("apply kubernetes manifest").is_none());
    assert!(builder.pipeline.step("update code on remote host").is_some());
}

#[test]
fn forced_builds_pass_the_publish_gate() {
    let dir = tempfile::tempdir().unwrap();
    write_fixtures(dir.path());
    let registry = plan_from(dir.path());

    let builder = registry.builder("storefront-b").unwrap();
    let push = builder.pipeline.step("push container image").unwrap();

    assert!(push.should_run(&BuildProperties::new("storefront", FORCE_BRANCH)));
    assert!(!push.should_run(&BuildProperties::new("storefront", "feature/x")));
}

#[test]
fn version_tag_renders_into_build_commands() {
    let dir = tempfile::tempdir().unwrap();
    write_fixtures(dir.path());
    let registry = plan_from(dir.path());

    let builder = registry.builder("storefront-a").unwrap();
    let compile = builder.pipeline.step("compile").unwrap();

    let mut props = BuildProperties::new("storefront", "deploy-a");
    props.project_version = "1.4.0".to_string();
    props.build_number = 42;
    props.schema_version = 2;
    props.revision = "abc123".to_string();

    assert_eq!(
        compile.rendered_command(&props),
        vec!["make", "build", "VERSION=1.4.0-deploy-a-42-2", "COMMIT_HASH=abc123"]
    );
}

#[test]
fn all_builders_share_the_named_worker_lock() {
    let dir = tempfile::tempdir().unwrap();
    write_fixtures(dir.path());
    let registry = plan_from(dir.path());

    let lock = registry.lock("acme-worker-lock").unwrap();
    assert_eq!(lock.max_count(), 1);

    let storefront = registry.builder("storefront-a").unwrap().lock.as_ref().unwrap();
    let inventory = registry.builder("inventory-b").unwrap().lock.as_ref().unwrap();

    let held = storefront.try_acquire().unwrap();
    assert!(inventory.try_acquire().is_none());
    drop(held);
    assert!(inventory.try_acquire().is_some());
}

#[test]
fn soft_test_policy_survives_registration() {
    let dir = tempfile::tempdir().unwrap();
    write_fixtures(dir.path());
    let registry = plan_from(dir.path());

    let builder = registry.builder("inventory-a").unwrap();
    let tests = builder.pipeline.step("run tests").unwrap();
    assert_eq!(tests.halt_policy, buildmaster::HaltPolicy::WarnOnFailure);

    let builder = registry.builder("storefront-a").unwrap();
    let tests = builder.pipeline.step("run tests").unwrap();
    assert_eq!(tests.halt_policy, buildmaster::HaltPolicy::HaltOnFailure);
}

#[test]
fn lenient_load_defers_the_failure_to_registration() {
    let dir = tempfile::tempdir().unwrap();
    write_fixtures(dir.path());
    // Break one project file after the master references it
    fs::write(dir.path().join("inventory.yaml"), "name: [unclosed").unwrap();

    let master = MasterConfig::from_file(dir.path().join("master.yaml")).unwrap();
    let store = ConfigStore::load_lenient(&master, dir.path());

    // The loader returned no data without raising...
    assert_eq!(store.missing().collect::<Vec<_>>(), vec!["inventory"]);

    // ...and the registrar that needs it surfaces a key-lookup failure
    // instead of silently registering zero inventory builders.
    let result = Registry::plan(&master, &store);
    assert!(matches!(
        result,
        Err(RegistryError::Config(ConfigError::MissingProject(name))) if name == "inventory"
    ));
}

#[test]
fn strict_load_fails_at_startup() {
    let dir = tempfile::tempdir().unwrap();
    write_fixtures(dir.path());
    fs::write(dir.path().join("inventory.yaml"), "name: [unclosed").unwrap();

    let master = MasterConfig::from_file(dir.path().join("master.yaml")).unwrap();
    assert!(ConfigStore::load(&master, dir.path()).is_err());
}
