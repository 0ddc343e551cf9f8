//! Plan descriptions: types and parsing.

pub mod parser;
pub mod types;

pub use parser::{MalformedPlanError, parse_event_plan};
pub use types::{EventPlan, TaskItem};
