//! `plansmith materialize` command: create a bucket of tasks from a plan.

use std::io::Write;

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use plansmith_core::gateway::Gateway;
use plansmith_core::materialize::{MaterializationResult, MaterializeOptions, Materializer, Outcome};
use plansmith_core::plan::EventPlan;

use crate::signal::EXIT_INTERRUPTED;

pub const EXIT_FAILED: i32 = 1;
pub const EXIT_PARTIAL: i32 = 2;

/// Exit status for a finished run.
pub fn exit_code(result: &MaterializationResult) -> i32 {
    if result.cancelled {
        return EXIT_INTERRUPTED;
    }
    match result.outcome() {
        Outcome::Complete => 0,
        Outcome::Failed => EXIT_FAILED,
        Outcome::Partial => EXIT_PARTIAL,
    }
}

/// Print a per-task report.
pub fn write_report(out: &mut dyn Write, result: &MaterializationResult) -> Result<()> {
    match (&result.bucket, &result.bucket_error) {
        (Some(bucket), _) => {
            let verb = if result.bucket_reused { "Reused" } else { "Created" };
            writeln!(out, "{verb} bucket: {} ({})", bucket.name, bucket.id)?;
        }
        (None, Some(err)) => writeln!(out, "Bucket not created: {err}")?,
        (None, None) => writeln!(out, "Bucket not created.")?,
    }

    for task in &result.created_tasks {
        writeln!(out, "  [+] {} ({})", task.title, task.id)?;
    }
    for failed in &result.failed_tasks {
        writeln!(
            out,
            "  [!] {} -- {} after {} attempt(s): {}",
            failed.task.title, failed.kind, failed.attempts, failed.message
        )?;
    }
    for skipped in &result.skipped_tasks {
        writeln!(out, "  [ ] {} (not attempted)", skipped.title)?;
    }

    writeln!(out)?;
    let summary = format!(
        "{} created, {} failed, {} not attempted",
        result.created_tasks.len(),
        result.failed_tasks.len(),
        result.skipped_tasks.len()
    );
    if result.cancelled {
        writeln!(out, "Interrupted: {summary}.")?;
        writeln!(out, "Tasks created before the interrupt remain in the plan.")?;
    } else {
        match result.outcome() {
            Outcome::Complete => writeln!(out, "Plan materialized: {summary}.")?,
            Outcome::Partial => writeln!(out, "Plan partially materialized: {summary}.")?,
            Outcome::Failed => writeln!(out, "Materialization failed: {summary}.")?,
        }
    }
    Ok(())
}

/// Run the materialize command. Returns the process exit status.
pub async fn run_materialize(
    gateway: &dyn Gateway,
    plan_id: &str,
    plan: &EventPlan,
    options: MaterializeOptions,
    cancel: &CancellationToken,
    out: &mut dyn Write,
) -> Result<i32> {
    writeln!(
        out,
        "Materializing \"{}\" ({} tasks) into plan {plan_id}",
        plan.bucket_name,
        plan.task_list.len()
    )?;

    let result = Materializer::with_options(gateway, options)
        .materialize(plan_id, plan, cancel)
        .await;

    write_report(out, &result)?;
    Ok(exit_code(&result))
}
