//! Step and build status models

use serde::Serialize;

/// Result of one executed step, as reported by the external orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    Success,
    Failure,
}

/// Classified status of a step within a finished (or aborted) build
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum StepStatus {
    /// Step ran and succeeded
    Succeeded,
    /// Step failed but was warn-only; the build continued
    Warned,
    /// Step failed and halted the build
    Failed,
    /// Run condition evaluated false; not an error
    Skipped { reason: String },
    /// A prior halt-on-failure step aborted the build before this step
    NotReached,
}

impl StepStatus {
    /// Whether this status counts against the build.
    pub fn is_failure(&self) -> bool {
        matches!(self, StepStatus::Failed)
    }
}

/// Overall status of a build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    /// Every non-skipped step succeeded
    Success,
    /// At least one warn-only step failed; nothing halted
    Warnings,
    /// A halt-on-failure step failed
    Failed,
}

/// Dry-run classification of one step for a given build snapshot
#[derive(Debug, Clone, Serialize)]
pub struct StepDisposition {
    /// Step name
    pub step: String,

    /// Whether the step would run
    pub would_run: bool,

    /// Condition description when the step would be skipped
    pub reason: Option<String>,
}
