//! Plan generation: the text-generation seam, its chat-completions adapter,
//! and the generate-then-parse loop.
//!
//! Generator output is untrusted. [`generate_event_plan`] runs it through
//! the parser and regenerates on malformed output, up to a fixed number of
//! attempts.

pub mod chat;
pub mod prompt;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use crate::plan::{EventPlan, MalformedPlanError, parse_event_plan};

pub use chat::{ChatCompletionsGenerator, ChatConfig};
pub use prompt::{DEFAULT_GOAL, build_plan_prompt};

/// Errors from producing a plan with a text generator.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("text generation request failed: {0}")]
    Transport(String),

    #[error("text generation returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("text generation returned no content")]
    EmptyResponse,

    #[error("generated plan is malformed: {0}")]
    Malformed(#[from] MalformedPlanError),
}

/// Opaque text-generation service.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GenerateError>;
}

/// Generate a plan for `goal` and parse it.
///
/// Malformed output is regenerated up to `attempts` times in total; the last
/// parse error is returned when every attempt fails. Generator failures are
/// returned immediately.
pub async fn generate_event_plan(
    generator: &dyn TextGenerator,
    goal: &str,
    attempts: u32,
) -> Result<EventPlan, GenerateError> {
    let prompt = build_plan_prompt(goal);
    let attempts = attempts.max(1);
    let mut attempt = 1;

    loop {
        let raw = generator.generate(&prompt).await?;
        match parse_event_plan(&raw) {
            Ok(plan) => {
                info!(
                    bucket = %plan.bucket_name,
                    tasks = plan.task_list.len(),
                    attempt,
                    "generated plan"
                );
                return Ok(plan);
            }
            Err(e) if attempt < attempts => {
                warn!(attempt, error = %e, "generated plan is malformed, regenerating");
                attempt += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }
}
