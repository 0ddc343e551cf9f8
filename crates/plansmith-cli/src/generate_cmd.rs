//! `plansmith generate`, and plan loading shared with `materialize`.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use plansmith_core::generate::{
    ChatCompletionsGenerator, DEFAULT_GOAL, TextGenerator, generate_event_plan,
};
use plansmith_core::plan::{EventPlan, parse_event_plan};

use crate::config::PlansmithConfig;

/// Read a plan from a JSON file.
pub fn read_plan_file(path: &Path) -> Result<EventPlan> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read plan file {}", path.display()))?;
    parse_event_plan(&raw).with_context(|| format!("invalid plan in {}", path.display()))
}

/// Generate a plan for `goal` (or the default goal) with `generator`.
pub async fn generate_plan(
    generator: &dyn TextGenerator,
    goal: Option<&str>,
    attempts: u32,
) -> Result<EventPlan> {
    let goal = goal.unwrap_or(DEFAULT_GOAL);
    let plan = generate_event_plan(generator, goal, attempts)
        .await
        .context("plan generation failed")?;
    info!(
        bucket = %plan.bucket_name,
        tasks = plan.task_list.len(),
        "plan generated"
    );
    Ok(plan)
}

/// Build the configured chat-completions generator.
pub fn chat_generator(config: &PlansmithConfig) -> Result<ChatCompletionsGenerator> {
    let chat = config.chat()?;
    ChatCompletionsGenerator::new(chat).context("failed to build chat client")
}

/// Print `plan` as pretty JSON in the same shape the parser accepts.
pub fn write_plan(out: &mut dyn Write, plan: &EventPlan) -> Result<()> {
    let json = serde_json::to_string_pretty(plan).context("failed to serialize plan")?;
    writeln!(out, "{json}")?;
    Ok(())
}

/// Run the generate command.
pub async fn run_generate(
    config: &PlansmithConfig,
    goal: Option<&str>,
    attempts: u32,
    out: &mut dyn Write,
) -> Result<()> {
    let generator = chat_generator(config)?;
    let plan = generate_plan(&generator, goal, attempts).await?;
    write_plan(out, &plan)
}
