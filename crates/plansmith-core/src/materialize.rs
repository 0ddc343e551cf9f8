//! Plan materializer: realizes an [`EventPlan`] as a bucket of ordered tasks
//! under an existing plan.
//!
//! Creation is strictly top-down and sequential. The bucket is created first;
//! tasks follow one at a time in list order, each awaiting the previous
//! response, because the remote service orders tasks by arrival. A failed
//! task never stops the run unless its failure is batch-aborting
//! (`Unauthorized` or `Fatal`) or the caller cancels. Whatever happens, the
//! caller gets a [`MaterializationResult`] listing what was created, what
//! failed, and what was never attempted.

use std::collections::HashSet;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{ErrorKind, GatewayError};
use crate::gateway::{Gateway, NewTask, RetryPolicy, cancellable};
use crate::model::{RemoteBucket, RemoteTask};
use crate::plan::{EventPlan, TaskItem};

/// What to do when the bucket name already exists under the plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BucketConflictPolicy {
    /// Stop before creating any task and report the conflict.
    #[default]
    FailFast,
    /// Look the bucket up by exact name and add the tasks to it.
    ReuseExisting,
}

/// Tuning knobs for a materialization run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializeOptions {
    pub retry: RetryPolicy,
    pub on_bucket_conflict: BucketConflictPolicy,
    /// Days from now at which created tasks fall due.
    pub due_offset_days: i64,
    /// Before re-issuing a create that failed with a retryable error, list
    /// the parent and adopt a same-named entity the failed attempt may have
    /// created.
    pub reconcile_on_retry: bool,
}

impl Default for MaterializeOptions {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            on_bucket_conflict: BucketConflictPolicy::default(),
            due_offset_days: 7,
            reconcile_on_retry: true,
        }
    }
}

/// A task that could not be created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedTask {
    pub task: TaskItem,
    pub kind: ErrorKind,
    /// Create attempts made, including the first.
    pub attempts: u32,
    pub message: String,
}

/// Coarse verdict over a [`MaterializationResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Bucket and every task were created.
    Complete,
    /// The bucket exists but some tasks failed, were skipped, or the run was
    /// cancelled.
    Partial,
    /// The bucket step failed; nothing was created.
    Failed,
}

/// Itemized report of a materialization run.
#[derive(Debug, Clone)]
pub struct MaterializationResult {
    pub plan_id: String,
    pub bucket: Option<RemoteBucket>,
    /// Why the bucket step failed, when `bucket` is `None`.
    pub bucket_error: Option<GatewayError>,
    /// The bucket already existed and was reused rather than created.
    pub bucket_reused: bool,
    /// Created tasks, in creation order.
    pub created_tasks: Vec<RemoteTask>,
    pub failed_tasks: Vec<FailedTask>,
    /// Tasks never attempted because the run aborted or was cancelled.
    pub skipped_tasks: Vec<TaskItem>,
    pub cancelled: bool,
}

impl MaterializationResult {
    fn new(plan_id: &str) -> Self {
        Self {
            plan_id: plan_id.to_string(),
            bucket: None,
            bucket_error: None,
            bucket_reused: false,
            created_tasks: Vec::new(),
            failed_tasks: Vec::new(),
            skipped_tasks: Vec::new(),
            cancelled: false,
        }
    }

    pub fn outcome(&self) -> Outcome {
        if self.bucket.is_none() {
            Outcome::Failed
        } else if self.failed_tasks.is_empty() && self.skipped_tasks.is_empty() && !self.cancelled
        {
            Outcome::Complete
        } else {
            Outcome::Partial
        }
    }
}

/// Drives gateway calls to realize plans. Holds no state between runs, so one
/// instance may serve concurrent materializations of different plans.
pub struct Materializer<'a> {
    gateway: &'a dyn Gateway,
    options: MaterializeOptions,
}

impl<'a> Materializer<'a> {
    pub fn new(gateway: &'a dyn Gateway) -> Self {
        Self::with_options(gateway, MaterializeOptions::default())
    }

    pub fn with_options(gateway: &'a dyn Gateway, options: MaterializeOptions) -> Self {
        Self { gateway, options }
    }

    pub fn options(&self) -> &MaterializeOptions {
        &self.options
    }

    /// Create `plan`'s bucket under `plan_id`, then its tasks in order.
    ///
    /// Cancellation stops the run at the next gateway call; tasks created
    /// before that remain created and are reported.
    pub async fn materialize(
        &self,
        plan_id: &str,
        plan: &EventPlan,
        cancel: &CancellationToken,
    ) -> MaterializationResult {
        let mut result = MaterializationResult::new(plan_id);
        info!(
            plan_id,
            bucket = %plan.bucket_name,
            tasks = plan.task_list.len(),
            "materializing plan"
        );

        let bucket = match self.ensure_bucket(plan_id, &plan.bucket_name, cancel).await {
            Ok((bucket, reused)) => {
                result.bucket_reused = reused;
                bucket
            }
            Err(e) => {
                warn!(plan_id, bucket = %plan.bucket_name, error = %e, "bucket step failed");
                result.cancelled = e.is_cancelled();
                result.bucket_error = Some(e);
                result.skipped_tasks = plan.task_list.clone();
                return result;
            }
        };

        // Ids reconciliation must never adopt: tasks this run created, and
        // tasks already present in a reused bucket.
        let mut accounted: HashSet<String> = HashSet::new();
        if result.bucket_reused && self.options.reconcile_on_retry {
            match cancellable(cancel, self.gateway.list_bucket_tasks(&bucket.id)).await {
                Ok(existing) => accounted.extend(existing.into_iter().map(|t| t.id)),
                Err(GatewayError::Cancelled) => {
                    result.cancelled = true;
                    result.skipped_tasks = plan.task_list.clone();
                    result.bucket = Some(bucket);
                    return result;
                }
                Err(e) => debug!(bucket_id = %bucket.id, error = %e, "could not list existing tasks"),
            }
        }

        for (index, item) in plan.task_list.iter().enumerate() {
            if cancel.is_cancelled() {
                result.cancelled = true;
                result.skipped_tasks.extend_from_slice(&plan.task_list[index..]);
                break;
            }

            match self
                .create_task(plan_id, &bucket.id, item, &accounted, cancel)
                .await
            {
                Ok(task) => {
                    debug!(task_id = %task.id, title = %task.title, "created task");
                    accounted.insert(task.id.clone());
                    result.created_tasks.push(task);
                }
                Err((GatewayError::Cancelled, _)) => {
                    result.cancelled = true;
                    result.skipped_tasks.extend_from_slice(&plan.task_list[index..]);
                    break;
                }
                Err((error, attempts)) => {
                    let kind = error.kind().unwrap_or(ErrorKind::Fatal);
                    warn!(
                        bucket_id = %bucket.id,
                        title = %item.title,
                        %kind,
                        attempts,
                        error = %error,
                        "task creation failed"
                    );
                    result.failed_tasks.push(FailedTask {
                        task: item.clone(),
                        kind,
                        attempts,
                        message: error.to_string(),
                    });
                    if kind.aborts_batch() {
                        let rest = &plan.task_list[index + 1..];
                        if !rest.is_empty() {
                            warn!(%kind, skipped = rest.len(), "aborting remaining tasks");
                        }
                        result.skipped_tasks.extend_from_slice(rest);
                        break;
                    }
                }
            }
        }

        if result.cancelled {
            warn!(
                plan_id,
                created = result.created_tasks.len(),
                skipped = result.skipped_tasks.len(),
                "materialization cancelled"
            );
        }
        info!(
            plan_id,
            bucket_id = %bucket.id,
            created = result.created_tasks.len(),
            failed = result.failed_tasks.len(),
            skipped = result.skipped_tasks.len(),
            "materialization finished"
        );
        result.bucket = Some(bucket);
        result
    }

    /// Returns the bucket and whether it was reused.
    async fn ensure_bucket(
        &self,
        plan_id: &str,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<(RemoteBucket, bool), GatewayError> {
        // Buckets present before the first attempt. Reconciliation only adopts
        // a bucket outside this set; without it, nothing is adopted.
        let preexisting: Option<HashSet<String>> = if self.options.reconcile_on_retry {
            match cancellable(cancel, self.gateway.list_plan_buckets(plan_id)).await {
                Ok(buckets) => Some(buckets.into_iter().map(|b| b.id).collect()),
                Err(GatewayError::Cancelled) => return Err(GatewayError::Cancelled),
                Err(e) => {
                    debug!(plan_id, error = %e, "could not list buckets; reconciliation off");
                    None
                }
            }
        } else {
            None
        };

        let policy = &self.options.retry;
        let mut attempt = 1;
        loop {
            let error = match cancellable(cancel, self.gateway.create_bucket(plan_id, name)).await
            {
                Ok(bucket) => {
                    info!(plan_id, bucket_id = %bucket.id, "created bucket");
                    return Ok((bucket, false));
                }
                Err(e) => e,
            };

            if error.kind() == Some(ErrorKind::Conflict)
                && self.options.on_bucket_conflict == BucketConflictPolicy::ReuseExisting
            {
                return match self.find_bucket(plan_id, name, cancel).await? {
                    Some(bucket) => {
                        info!(plan_id, bucket_id = %bucket.id, "reusing existing bucket");
                        Ok((bucket, true))
                    }
                    None => Err(error),
                };
            }

            if !policy.should_retry(&error, attempt) {
                return Err(error);
            }
            debug!(plan_id, attempt, error = %error, "retrying bucket creation");
            if !pause(policy.delay_for(&error, attempt), cancel).await {
                return Err(GatewayError::Cancelled);
            }

            if let Some(preexisting) = &preexisting {
                match self.find_bucket(plan_id, name, cancel).await {
                    Ok(Some(bucket)) if preexisting.contains(&bucket.id) => {
                        return match self.options.on_bucket_conflict {
                            BucketConflictPolicy::ReuseExisting => {
                                info!(plan_id, bucket_id = %bucket.id, "reusing existing bucket");
                                Ok((bucket, true))
                            }
                            BucketConflictPolicy::FailFast => Err(GatewayError::remote(
                                ErrorKind::Conflict,
                                format!("bucket {name} already exists in plan {plan_id}"),
                            )),
                        };
                    }
                    Ok(Some(bucket)) => {
                        info!(plan_id, bucket_id = %bucket.id, "adopted bucket from earlier attempt");
                        return Ok((bucket, false));
                    }
                    Ok(None) => {}
                    Err(GatewayError::Cancelled) => return Err(GatewayError::Cancelled),
                    Err(e) => debug!(plan_id, error = %e, "bucket reconciliation lookup failed"),
                }
            }
            attempt += 1;
        }
    }

    async fn find_bucket(
        &self,
        plan_id: &str,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<RemoteBucket>, GatewayError> {
        let buckets = cancellable(cancel, self.gateway.list_plan_buckets(plan_id)).await?;
        Ok(buckets.into_iter().find(|b| b.name == name))
    }

    /// Create one task with bounded retry. On failure returns the last error
    /// with the number of attempts made.
    async fn create_task(
        &self,
        plan_id: &str,
        bucket_id: &str,
        item: &TaskItem,
        accounted: &HashSet<String>,
        cancel: &CancellationToken,
    ) -> Result<RemoteTask, (GatewayError, u32)> {
        let policy = &self.options.retry;
        let request = NewTask::due_in_days(
            plan_id,
            bucket_id,
            item.title.clone(),
            self.options.due_offset_days,
        );

        let mut attempt = 1;
        loop {
            let error = match cancellable(cancel, self.gateway.create_task(&request)).await {
                Ok(task) => return Ok(task),
                Err(e) => e,
            };
            if !policy.should_retry(&error, attempt) {
                return Err((error, attempt));
            }
            debug!(title = %item.title, attempt, error = %error, "retrying task creation");
            if !pause(policy.delay_for(&error, attempt), cancel).await {
                return Err((GatewayError::Cancelled, attempt));
            }

            if self.options.reconcile_on_retry {
                match cancellable(cancel, self.gateway.list_bucket_tasks(bucket_id)).await {
                    Ok(tasks) => {
                        if let Some(task) = tasks
                            .into_iter()
                            .find(|t| t.title == item.title && !accounted.contains(&t.id))
                        {
                            info!(task_id = %task.id, title = %task.title, "adopted task from earlier attempt");
                            return Ok(task);
                        }
                    }
                    Err(GatewayError::Cancelled) => return Err((GatewayError::Cancelled, attempt)),
                    Err(e) => debug!(bucket_id, error = %e, "task reconciliation lookup failed"),
                }
            }
            attempt += 1;
        }
    }
}

/// Sleep for `delay`; false if cancelled first.
async fn pause(delay: Duration, cancel: &CancellationToken) -> bool {
    if delay.is_zero() {
        return !cancel.is_cancelled();
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bucket() -> RemoteBucket {
        RemoteBucket {
            id: "b1".into(),
            name: "B".into(),
            plan_id: "p1".into(),
        }
    }

    #[test]
    fn outcome_without_bucket_is_failed() {
        let result = MaterializationResult::new("p1");
        assert_eq!(result.outcome(), Outcome::Failed);
    }

    #[test]
    fn outcome_complete_and_partial() {
        let mut result = MaterializationResult::new("p1");
        result.bucket = Some(bucket());
        assert_eq!(result.outcome(), Outcome::Complete);

        result.skipped_tasks.push(TaskItem::new("later"));
        assert_eq!(result.outcome(), Outcome::Partial);

        result.skipped_tasks.clear();
        result.cancelled = true;
        assert_eq!(result.outcome(), Outcome::Partial);
    }

    #[test]
    fn default_options() {
        let options = MaterializeOptions::default();
        assert_eq!(options.retry.max_attempts, 3);
        assert_eq!(options.on_bucket_conflict, BucketConflictPolicy::FailFast);
        assert_eq!(options.due_offset_days, 7);
        assert!(options.reconcile_on_retry);
    }

    #[tokio::test]
    async fn pause_reports_cancellation() {
        let cancel = CancellationToken::new();
        assert!(pause(Duration::ZERO, &cancel).await);
        cancel.cancel();
        assert!(!pause(Duration::ZERO, &cancel).await);
        assert!(!pause(Duration::from_secs(60), &cancel).await);
    }
}
