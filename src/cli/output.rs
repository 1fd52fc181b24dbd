//! CLI output formatting

use crate::{
    core::{
        pipeline::Pipeline,
        properties::BuildProperties,
        state::StepDisposition,
        step::{BuildStep, HaltPolicy},
    },
    registry::{Registry, Trigger},
};
use console::Emoji;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "! ");
pub static SKIP: Emoji<'_, '_> = Emoji("⏭️  ", "- ");

/// Format the full registration plan for the console.
pub fn format_plan(registry: &Registry) -> String {
    let mut out = String::new();

    out.push_str(&format!("{} Change sources:\n", INFO));
    for poller in registry.change_sources() {
        out.push_str(&format!(
            "  {} - {} every {}s{}\n",
            style(&poller.project).bold(),
            poller.repo_url,
            poller.poll_interval.as_secs(),
            if poller.poll_at_launch { " (poll at launch)" } else { "" },
        ));
    }

    out.push_str(&format!("\n{} Builders:\n", INFO));
    for builder in registry.builders() {
        let lock = builder
            .lock
            .as_ref()
            .map(|access| format!(" [lock: {}]", access.lock_name()))
            .unwrap_or_default();
        out.push_str(&format!(
            "  {} ({} steps) workers: {}{} tags: {}\n",
            style(&builder.name).bold(),
            builder.pipeline.len(),
            builder.workers.join(", "),
            lock,
            style(builder.tags.join(", ")).dim(),
        ));
    }

    out.push_str(&format!("\n{} Triggers:\n", INFO));
    for trigger in registry.triggers() {
        match trigger {
            Trigger::Force(force) => out.push_str(&format!(
                "  {} -> {} (manual, branch {})\n",
                style(&force.name).cyan(),
                force.builder,
                force.branch,
            )),
            Trigger::Commit(commit) => out.push_str(&format!(
                "  {} -> {} (on commit to {}, fires immediately)\n",
                style(&commit.name).cyan(),
                commit.builder,
                commit.branch_filter.display(),
            )),
        }
    }

    let locks: Vec<_> = registry.locks().collect();
    if !locks.is_empty() {
        out.push_str(&format!("\n{} Worker locks:\n", INFO));
        for lock in locks {
            out.push_str(&format!(
                "  {} (max {} concurrent)\n",
                style(lock.name()).bold(),
                lock.max_count(),
            ));
        }
    }

    out
}

/// Registration plan as JSON.
pub fn plan_json(registry: &Registry) -> serde_json::Value {
    let change_sources: Vec<_> = registry
        .change_sources()
        .iter()
        .map(|poller| {
            serde_json::json!({
                "project": poller.project,
                "repo_url": poller.repo_url,
                "poll_interval_secs": poller.poll_interval.as_secs(),
                "poll_at_launch": poller.poll_at_launch,
                "workdir": poller.workdir,
            })
        })
        .collect();

    let builders: Vec<_> = registry
        .builders()
        .iter()
        .map(|builder| {
            serde_json::json!({
                "name": builder.name,
                "workers": builder.workers,
                "tags": builder.tags,
                "lock": builder.lock.as_ref().map(|access| access.lock_name()),
                "steps": builder
                    .pipeline
                    .steps
                    .iter()
                    .map(|step| step.name.clone())
                    .collect::<Vec<_>>(),
            })
        })
        .collect();

    let triggers: Vec<_> = registry
        .triggers()
        .iter()
        .map(|trigger| match trigger {
            Trigger::Force(force) => serde_json::json!({
                "kind": "force",
                "name": force.name,
                "builder": force.builder,
                "branch": force.branch,
                "repository": force.repository,
                "project": force.project,
            }),
            Trigger::Commit(commit) => serde_json::json!({
                "kind": "commit",
                "name": commit.name,
                "builder": commit.builder,
                "branch": commit.branch_filter.display(),
                "project": commit.project,
                "tree_stable_timer_secs": commit.tree_stable_timer.as_secs(),
            }),
        })
        .collect();

    let locks: Vec<_> = registry
        .locks()
        .map(|lock| {
            serde_json::json!({
                "name": lock.name(),
                "max_count": lock.max_count(),
            })
        })
        .collect();

    serde_json::json!({
        "change_sources": change_sources,
        "builders": builders,
        "triggers": triggers,
        "locks": locks,
    })
}

/// Format one pipeline's dry run for the console.
pub fn format_pipeline(
    pipeline: &Pipeline,
    dispositions: &[StepDisposition],
    props: &BuildProperties,
) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{} {} (branch {:?}, build {})\n",
        INFO,
        style(&pipeline.name).bold(),
        props.branch,
        props.build_number,
    ));

    for (step, disposition) in pipeline.steps.iter().zip(dispositions) {
        if disposition.would_run {
            out.push_str(&format!(
                "  {} {} {}{}\n",
                CHECK,
                style(&step.name).bold(),
                style(step.rendered_command(props).join(" ")).dim(),
                format_policy(step),
            ));
        } else {
            out.push_str(&format!(
                "  {} {} {}\n",
                SKIP,
                style(&step.name).dim(),
                style(format!(
                    "skipped: {}",
                    disposition.reason.as_deref().unwrap_or("condition false")
                ))
                .dim(),
            ));
        }
    }

    out
}

/// One pipeline's dry run as JSON.
pub fn pipeline_json(
    pipeline: &Pipeline,
    dispositions: &[StepDisposition],
    props: &BuildProperties,
) -> serde_json::Value {
    let steps: Vec<_> = pipeline
        .steps
        .iter()
        .zip(dispositions)
        .map(|(step, disposition)| {
            serde_json::json!({
                "name": step.name,
                "command": step.rendered_command(props),
                "env": step.env,
                "halt_on_failure": step.halt_policy == HaltPolicy::HaltOnFailure,
                "sets_property": step.sets_property,
                "would_run": disposition.would_run,
                "skip_reason": disposition.reason,
            })
        })
        .collect();

    serde_json::json!({
        "pipeline": pipeline.name,
        "properties": props,
        "steps": steps,
    })
}

fn format_policy(step: &BuildStep) -> String {
    match step.halt_policy {
        HaltPolicy::HaltOnFailure => String::new(),
        HaltPolicy::WarnOnFailure => format!(" {}", style("[warn-only]").yellow()),
    }
}
