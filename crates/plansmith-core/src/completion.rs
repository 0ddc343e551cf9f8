//! Completion queries and updates over a bucket's tasks.
//!
//! The aggregator never retries. Gateway errors go straight back to the
//! caller, which owns the retry decision for reads.

use serde::Serialize;
use tracing::{debug, info};

use crate::error::{ErrorKind, GatewayError};
use crate::gateway::Gateway;
use crate::model::RemoteTask;

/// True when every task is at 100%. An empty slice is vacuously complete.
pub fn all_tasks_complete(tasks: &[RemoteTask]) -> bool {
    tasks.iter().all(RemoteTask::is_complete)
}

/// Task counts by completion state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CompletionSummary {
    pub total: usize,
    pub completed: usize,
    pub in_progress: usize,
    pub not_started: usize,
}

impl CompletionSummary {
    pub fn from_tasks(tasks: &[RemoteTask]) -> Self {
        let mut summary = Self {
            total: tasks.len(),
            ..Self::default()
        };
        for task in tasks {
            match task.percent() {
                100 => summary.completed += 1,
                0 => summary.not_started += 1,
                _ => summary.in_progress += 1,
            }
        }
        summary
    }

    pub fn all_complete(&self) -> bool {
        self.completed == self.total
    }
}

/// A bucket's tasks together with their counts, from a single listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BucketProgress {
    pub tasks: Vec<RemoteTask>,
    pub summary: CompletionSummary,
}

impl BucketProgress {
    pub fn from_tasks(tasks: Vec<RemoteTask>) -> Self {
        let summary = CompletionSummary::from_tasks(&tasks);
        Self { tasks, summary }
    }

    pub fn all_complete(&self) -> bool {
        all_tasks_complete(&self.tasks)
    }
}

pub struct CompletionAggregator<'a> {
    gateway: &'a dyn Gateway,
}

impl<'a> CompletionAggregator<'a> {
    pub fn new(gateway: &'a dyn Gateway) -> Self {
        Self { gateway }
    }

    /// List the bucket once and return its tasks with their counts.
    pub async fn progress(&self, bucket_id: &str) -> Result<BucketProgress, GatewayError> {
        let tasks = self.gateway.list_bucket_tasks(bucket_id).await?;
        debug!(bucket_id, tasks = tasks.len(), "listed bucket tasks");
        Ok(BucketProgress::from_tasks(tasks))
    }

    /// Whether every task in the bucket is complete. `true` for an empty bucket.
    pub async fn all_complete(&self, bucket_id: &str) -> Result<bool, GatewayError> {
        Ok(self.progress(bucket_id).await?.all_complete())
    }

    pub async fn summary(&self, bucket_id: &str) -> Result<CompletionSummary, GatewayError> {
        Ok(self.progress(bucket_id).await?.summary)
    }

    /// Set a task's completion percentage.
    ///
    /// Re-reads the task first so the update carries the current version
    /// token; a concurrent writer between the read and the update surfaces as
    /// [`GatewayError::StaleVersion`].
    pub async fn set_completion(&self, task_id: &str, percent: u8) -> Result<(), GatewayError> {
        if percent > 100 {
            return Err(GatewayError::remote(
                ErrorKind::Fatal,
                format!("percent complete must be 0..=100, got {percent}"),
            ));
        }
        let current = self.gateway.get_task(task_id).await?;
        self.update(&current, percent).await
    }

    /// Mark a task 100% complete. Does nothing if it already is.
    pub async fn mark_complete(&self, task_id: &str) -> Result<(), GatewayError> {
        let current = self.gateway.get_task(task_id).await?;
        if current.is_complete() {
            debug!(task_id, "task already complete");
            return Ok(());
        }
        self.update(&current, 100).await
    }

    async fn update(&self, task: &RemoteTask, percent: u8) -> Result<(), GatewayError> {
        self.gateway
            .update_task_completion(&task.id, task.etag.as_deref(), percent)
            .await?;
        info!(task_id = %task.id, from = task.percent(), to = percent, "updated task completion");
        Ok(())
    }
}
