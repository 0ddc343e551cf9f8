//! The `Gateway` trait -- the capability interface over the remote task
//! service.
//!
//! One method per remote operation. Implementations classify every failure
//! into a [`GatewayError`] and normalize absent collections to empty ones,
//! so callers never see a null collection. The trait is object-safe; the
//! pipeline components hold a `&dyn Gateway`.

pub mod retry;

use std::future::Future;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::error::GatewayError;
use crate::model::{Group, RemoteBucket, RemotePlan, RemoteTask, Site, User};

pub use retry::RetryPolicy;

/// Fields for a task creation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub plan_id: String,
    pub bucket_id: String,
    pub title: String,
    pub due: Option<DateTime<Utc>>,
}

impl NewTask {
    /// Build a request whose due date is `due_offset_days` from now.
    pub fn due_in_days(
        plan_id: impl Into<String>,
        bucket_id: impl Into<String>,
        title: impl Into<String>,
        due_offset_days: i64,
    ) -> Self {
        Self {
            plan_id: plan_id.into(),
            bucket_id: bucket_id.into(),
            title: title.into(),
            due: Some(Utc::now() + chrono::Duration::days(due_offset_days)),
        }
    }
}

/// The plans of one group, or the error that listing them produced.
#[derive(Debug, Clone)]
pub struct GroupPlans {
    pub group: Group,
    pub result: Result<Vec<RemotePlan>, GatewayError>,
}

/// Capability-oriented facade over the remote task service.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Look up a user by principal name. `Ok(None)` when no such user exists.
    async fn find_user(&self, principal_name: &str) -> Result<Option<User>, GatewayError>;

    /// Create a group. A name collision surfaces as a `Conflict`.
    async fn create_group(&self, name: &str, description: &str) -> Result<Group, GatewayError>;

    /// Add a user to a group's members. Adding an existing member succeeds.
    async fn add_member(&self, group_id: &str, user_id: &str) -> Result<(), GatewayError>;

    async fn list_groups(&self) -> Result<Vec<Group>, GatewayError>;

    /// Create a plan owned by a group.
    async fn create_plan(&self, title: &str, owner_group_id: &str)
    -> Result<RemotePlan, GatewayError>;

    async fn list_group_plans(&self, group_id: &str) -> Result<Vec<RemotePlan>, GatewayError>;

    async fn create_bucket(&self, plan_id: &str, name: &str) -> Result<RemoteBucket, GatewayError>;

    async fn list_plan_buckets(&self, plan_id: &str) -> Result<Vec<RemoteBucket>, GatewayError>;

    async fn create_task(&self, task: &NewTask) -> Result<RemoteTask, GatewayError>;

    /// Read the current server state of a task, including its version token.
    async fn get_task(&self, task_id: &str) -> Result<RemoteTask, GatewayError>;

    async fn list_bucket_tasks(&self, bucket_id: &str) -> Result<Vec<RemoteTask>, GatewayError>;

    /// Set a task's completion percentage.
    ///
    /// `etag` is the version token read from the task; a mismatch with the
    /// server's current version fails with [`GatewayError::StaleVersion`].
    async fn update_task_completion(
        &self,
        task_id: &str,
        etag: Option<&str>,
        percent: u8,
    ) -> Result<(), GatewayError>;

    async fn list_sites(&self) -> Result<Vec<Site>, GatewayError>;

    /// List the plans of every group, one remote call per group.
    ///
    /// Failures are reported per group; the output keeps the input order.
    async fn list_plans_for_groups(&self, groups: &[Group]) -> Vec<GroupPlans> {
        let calls = groups.iter().map(|group| async move {
            GroupPlans {
                group: group.clone(),
                result: self.list_group_plans(&group.id).await,
            }
        });
        futures::future::join_all(calls).await
    }
}

// Compile-time assertion: Gateway must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn Gateway) {}
};

/// Run a gateway call, abandoning it if `cancel` fires first.
///
/// Dropping the in-flight future aborts the underlying request; whether the
/// remote side already applied it is unknown.
pub async fn cancellable<T, F>(cancel: &CancellationToken, call: F) -> Result<T, GatewayError>
where
    F: Future<Output = Result<T, GatewayError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(GatewayError::Cancelled),
        result = call => result,
    }
}
