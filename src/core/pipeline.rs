//! Pipeline domain model

use crate::core::{
    properties::BuildProperties,
    state::{BuildStatus, StepDisposition, StepResult, StepStatus},
    step::{BuildStep, HaltPolicy},
};

/// An ordered sequence of build steps for one (project, branch) pair.
///
/// Pipelines are built once at registration time and owned exclusively by
/// the builder that carries them; they are never mutated afterwards and
/// never shared across builders.
#[derive(Debug, Clone)]
pub struct Pipeline {
    /// Pipeline name (matches the owning builder)
    pub name: String,

    /// Steps in execution order
    pub steps: Vec<BuildStep>,
}

/// Classified outcome of a build, derived from per-step results
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub pipeline: String,
    pub status: BuildStatus,
    pub steps: Vec<(String, StepStatus)>,
}

impl Pipeline {
    pub fn new(name: impl Into<String>, steps: Vec<BuildStep>) -> Self {
        Self { name: name.into(), steps }
    }

    /// Get a step by name
    pub fn step(&self, name: &str) -> Option<&BuildStep> {
        self.steps.iter().find(|step| step.name == name)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Classify every step as would-run or would-skip for a build snapshot.
    ///
    /// This is a pure dry run; nothing is executed.
    pub fn plan(&self, props: &BuildProperties) -> Vec<StepDisposition> {
        self.steps
            .iter()
            .map(|step| {
                let would_run = step.should_run(props);
                StepDisposition {
                    step: step.name.clone(),
                    would_run,
                    reason: if would_run {
                        None
                    } else {
                        step.condition.as_ref().map(|condition| condition.describe())
                    },
                }
            })
            .collect()
    }

    /// Fold per-step results into a build outcome.
    ///
    /// Steps whose condition evaluates false are skipped and consume no
    /// result. A halt-on-failure failure marks the remaining steps as not
    /// reached; a warn-only failure degrades the build without stopping it.
    /// Results exhausted early leave the remaining steps not reached.
    pub fn fold_outcome(&self, props: &BuildProperties, results: &[StepResult]) -> BuildOutcome {
        let mut statuses = Vec::with_capacity(self.steps.len());
        let mut status = BuildStatus::Success;
        let mut results = results.iter();
        let mut halted = false;

        for step in &self.steps {
            if halted {
                statuses.push((step.name.clone(), StepStatus::NotReached));
                continue;
            }

            if !step.should_run(props) {
                let reason = step
                    .condition
                    .as_ref()
                    .map(|condition| condition.describe())
                    .unwrap_or_default();
                statuses.push((step.name.clone(), StepStatus::Skipped { reason }));
                continue;
            }

            match results.next() {
                Some(StepResult::Success) => {
                    statuses.push((step.name.clone(), StepStatus::Succeeded));
                }
                Some(StepResult::Failure) => match step.halt_policy {
                    HaltPolicy::HaltOnFailure => {
                        statuses.push((step.name.clone(), StepStatus::Failed));
                        status = BuildStatus::Failed;
                        halted = true;
                    }
                    HaltPolicy::WarnOnFailure => {
                        statuses.push((step.name.clone(), StepStatus::Warned));
                        if status == BuildStatus::Success {
                            status = BuildStatus::Warnings;
                        }
                    }
                },
                None => {
                    statuses.push((step.name.clone(), StepStatus::NotReached));
                    halted = true;
                }
            }
        }

        BuildOutcome {
            pipeline: self.name.clone(),
            status,
            steps: statuses,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::step::RunCondition;
    use std::collections::BTreeSet;

    fn pipeline() -> Pipeline {
        let deploy: BTreeSet<String> = ["deploy-prod".to_string()].into_iter().collect();
        Pipeline::new(
            "svc-prod",
            vec![
                BuildStep::new("source sync", vec!["git".to_string(), "clone".to_string()]),
                BuildStep::new("compile", vec!["make".to_string(), "build".to_string()]),
                BuildStep::new("run tests", vec!["make".to_string(), "test".to_string()])
                    .warn_only(),
                BuildStep::new("publish", vec!["make".to_string(), "push".to_string()])
                    .when(RunCondition::DeployBranch { branches: deploy }),
            ],
        )
    }

    #[test]
    fn test_plan_marks_deploy_steps_for_other_branches() {
        let plan = pipeline().plan(&BuildProperties::new("svc", "feature/x"));

        assert!(plan[0].would_run);
        assert!(plan[1].would_run);
        assert!(plan[2].would_run);
        assert!(!plan[3].would_run);
        assert!(plan[3].reason.as_deref().unwrap().contains("deployment target"));
    }

    #[test]
    fn test_halt_on_failure_aborts_remaining_steps() {
        let props = BuildProperties::new("svc", "deploy-prod");
        let outcome = pipeline().fold_outcome(
            &props,
            &[StepResult::Success, StepResult::Failure],
        );

        assert_eq!(outcome.status, BuildStatus::Failed);
        assert_eq!(outcome.steps[1].1, StepStatus::Failed);
        assert_eq!(outcome.steps[2].1, StepStatus::NotReached);
        assert_eq!(outcome.steps[3].1, StepStatus::NotReached);
    }

    #[test]
    fn test_warn_only_failure_degrades_without_halting() {
        let props = BuildProperties::new("svc", "deploy-prod");
        let outcome = pipeline().fold_outcome(
            &props,
            &[
                StepResult::Success,
                StepResult::Success,
                StepResult::Failure,
                StepResult::Success,
            ],
        );

        assert_eq!(outcome.status, BuildStatus::Warnings);
        assert_eq!(outcome.steps[2].1, StepStatus::Warned);
        assert_eq!(outcome.steps[3].1, StepStatus::Succeeded);
    }

    #[test]
    fn test_skipped_steps_consume_no_result() {
        let props = BuildProperties::new("svc", "feature/x");
        let outcome = pipeline().fold_outcome(
            &props,
            &[StepResult::Success, StepResult::Success, StepResult::Success],
        );

        assert_eq!(outcome.status, BuildStatus::Success);
        assert!(matches!(outcome.steps[3].1, StepStatus::Skipped { .. }));
    }
}
