//! `plansmith status` and `plansmith complete`: read and update task completion.

use std::io::Write;

use anyhow::{Context, Result, bail};

use plansmith_core::completion::CompletionAggregator;
use plansmith_core::gateway::Gateway;
use plansmith_core::model::RemoteTask;

fn status_icon(task: &RemoteTask) -> &'static str {
    match task.percent() {
        100 => "+",
        0 => ".",
        _ => "*",
    }
}

/// Show completion progress for a bucket.
pub async fn run_status(
    gateway: &dyn Gateway,
    bucket_id: &str,
    out: &mut dyn Write,
) -> Result<()> {
    let progress = CompletionAggregator::new(gateway)
        .progress(bucket_id)
        .await
        .with_context(|| format!("failed to list tasks of bucket {bucket_id}"))?;
    let summary = &progress.summary;

    writeln!(out, "Bucket: {bucket_id}")?;
    writeln!(out, "Progress: {}/{} complete", summary.completed, summary.total)?;
    writeln!(
        out,
        "  not_started={} in_progress={} completed={}",
        summary.not_started, summary.in_progress, summary.completed
    )?;
    writeln!(out)?;

    if !progress.tasks.is_empty() {
        writeln!(out, "Tasks:")?;
        for task in &progress.tasks {
            writeln!(
                out,
                "  [{}] {} ({}%, {})",
                status_icon(task),
                task.title,
                task.percent(),
                task.id
            )?;
        }
        writeln!(out)?;
    }

    writeln!(out, "{}", verdict(progress.all_complete()))?;
    Ok(())
}

fn verdict(all_complete: bool) -> &'static str {
    if all_complete {
        "All tasks complete."
    } else {
        "Not all tasks are complete."
    }
}

/// Print only the verdict. Returns whether every task is complete.
pub async fn run_check(
    gateway: &dyn Gateway,
    bucket_id: &str,
    out: &mut dyn Write,
) -> Result<bool> {
    let done = CompletionAggregator::new(gateway)
        .all_complete(bucket_id)
        .await
        .with_context(|| format!("failed to list tasks of bucket {bucket_id}"))?;
    writeln!(out, "{}", verdict(done))?;
    Ok(done)
}

/// Set a task's completion, or mark it done when `percent` is `None`.
pub async fn run_complete(
    gateway: &dyn Gateway,
    task_id: &str,
    percent: Option<u8>,
    out: &mut dyn Write,
) -> Result<()> {
    let aggregator = CompletionAggregator::new(gateway);
    match percent {
        None | Some(100) => {
            aggregator
                .mark_complete(task_id)
                .await
                .with_context(|| format!("failed to complete task {task_id}"))?;
            writeln!(out, "Task {task_id} marked complete.")?;
        }
        Some(p) if p > 100 => bail!("percent must be between 0 and 100, got {p}"),
        Some(p) => {
            aggregator
                .set_completion(task_id, p)
                .await
                .with_context(|| format!("failed to update task {task_id}"))?;
            writeln!(out, "Task {task_id} set to {p}%.")?;
        }
    }
    Ok(())
}
