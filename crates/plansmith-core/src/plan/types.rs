//! In-memory plan description: a bucket name and an ordered task list.

use serde::{Deserialize, Serialize};

/// A validated plan ready to be materialized.
///
/// `task_list` order is creation order. The bucket name is never empty; the
/// task list may be, in which case materialization creates only the bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventPlan {
    #[serde(rename = "bucketname")]
    pub bucket_name: String,
    #[serde(rename = "tasklist")]
    pub task_list: Vec<TaskItem>,
}

impl EventPlan {
    pub fn len(&self) -> usize {
        self.task_list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.task_list.is_empty()
    }
}

/// A single task title.
///
/// Titles produced by the generator usually carry an ordinal prefix such as
/// `"3. Sync with team lead"`. The prefix is display-only; position in
/// [`EventPlan::task_list`] decides creation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskItem {
    #[serde(rename = "task")]
    pub title: String,
}

impl TaskItem {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_in_generator_shape() {
        let plan = EventPlan {
            bucket_name: "B".into(),
            task_list: vec![TaskItem::new("T1")],
        };
        let json = serde_json::to_value(&plan).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"bucketname": "B", "tasklist": [{"task": "T1"}]})
        );
    }
}
