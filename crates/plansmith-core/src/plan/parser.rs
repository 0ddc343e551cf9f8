//! Plan description parser.
//!
//! Turns raw generator output into a validated [`EventPlan`]:
//! - The input must be one JSON object, optionally wrapped in a Markdown
//!   code fence.
//! - Field names match case-insensitively, ignoring `_`, `-` and spaces
//!   (`bucketName`, `bucket_name` and `BUCKETNAME` are all `bucketname`).
//! - The bucket name must be a non-empty string.
//! - The task array must be present; an empty array is a valid plan.
//! - Task entries without a usable title are dropped and the rest kept.
//!
//! Unknown fields are ignored. Parsing is pure.

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

use super::types::{EventPlan, TaskItem};

const BUCKET_FIELD: &str = "bucketname";
const TASKS_FIELD: &str = "tasklist";
const TITLE_FIELD: &str = "task";

/// Reasons a plan description is rejected.
#[derive(Debug, Error)]
pub enum MalformedPlanError {
    #[error("plan text is empty")]
    Empty,

    #[error("plan text is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("plan must be a JSON object, got {0}")]
    NotAnObject(&'static str),

    #[error("plan has no \"bucketname\" field")]
    MissingBucketName,

    #[error("\"bucketname\" must be a non-empty string")]
    InvalidBucketName,

    #[error("plan has no \"tasklist\" field")]
    MissingTaskList,

    #[error("\"tasklist\" must be an array, got {0}")]
    TaskListNotArray(&'static str),
}

/// Parse and validate a plan description.
pub fn parse_event_plan(raw: &str) -> Result<EventPlan, MalformedPlanError> {
    let body = strip_code_fence(raw.trim());
    if body.is_empty() {
        return Err(MalformedPlanError::Empty);
    }

    let value: Value = serde_json::from_str(body)?;
    let object = match value {
        Value::Object(map) => map,
        other => return Err(MalformedPlanError::NotAnObject(json_type(&other))),
    };

    let bucket_name = match lookup(&object, BUCKET_FIELD) {
        None => return Err(MalformedPlanError::MissingBucketName),
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        Some(_) => return Err(MalformedPlanError::InvalidBucketName),
    };

    let entries = match lookup(&object, TASKS_FIELD) {
        None => return Err(MalformedPlanError::MissingTaskList),
        Some(Value::Array(entries)) => entries,
        Some(other) => return Err(MalformedPlanError::TaskListNotArray(json_type(other))),
    };

    let mut task_list = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        match task_title(entry) {
            Some(title) => task_list.push(TaskItem::new(title)),
            None => warn!(index, entry = %entry, "dropping task entry without a title"),
        }
    }

    Ok(EventPlan {
        bucket_name,
        task_list,
    })
}

/// Extract a trimmed, non-empty title from one task entry.
fn task_title(entry: &Value) -> Option<String> {
    let Value::Object(fields) = entry else {
        return None;
    };
    match lookup(fields, TITLE_FIELD) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

/// Find a field by normalized name. The first matching key wins.
fn lookup<'a>(object: &'a Map<String, Value>, wanted: &str) -> Option<&'a Value> {
    object
        .iter()
        .find(|(key, _)| normalize_key(key) == wanted)
        .map(|(_, value)| value)
}

fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Remove a surrounding Markdown code fence, if present.
fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return text;
    };
    // Drop the info string (e.g. `json`) on the opening line.
    match body.find('\n') {
        Some(newline) => body[newline + 1..].trim(),
        None => {
            let body = body.trim();
            match body.find(char::is_whitespace) {
                Some(end) if !body.starts_with(['{', '[']) => body[end..].trim(),
                _ => body,
            }
        }
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
