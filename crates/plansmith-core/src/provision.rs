//! Provisioning a plan from scratch: group, membership, then plan.
//!
//! Also plan discovery across every group the caller can see.

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::GatewayError;
use crate::gateway::{Gateway, cancellable};
use crate::model::{Group, RemotePlan, User};

/// What to provision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionRequest {
    pub group_name: String,
    pub group_description: String,
    pub plan_title: String,
    /// User principal names to add to the group.
    pub members: Vec<String>,
}

/// The group and plan that were created.
#[derive(Debug, Clone)]
pub struct ProvisionedPlan {
    pub group: Group,
    pub plan: RemotePlan,
    pub added_members: Vec<User>,
    /// Requested principals with no matching user.
    pub missing_members: Vec<String>,
}

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("failed to create group {name:?}: {source}")]
    CreateGroup {
        name: String,
        #[source]
        source: GatewayError,
    },

    #[error("failed to look up member {principal:?}: {source}")]
    LookupMember {
        principal: String,
        #[source]
        source: GatewayError,
    },

    #[error("failed to add {principal:?} to group {group_id}: {source}")]
    AddMember {
        group_id: String,
        principal: String,
        #[source]
        source: GatewayError,
    },

    /// The group exists but the plan could not be created in it.
    #[error("group {} was created but plan {title:?} failed: {source}", group.id)]
    CreatePlan {
        group: Box<Group>,
        title: String,
        #[source]
        source: GatewayError,
    },

    #[error("provisioning cancelled")]
    Cancelled,
}

impl ProvisionError {
    fn or_cancelled(source: GatewayError, wrap: impl FnOnce(GatewayError) -> Self) -> Self {
        if source.is_cancelled() {
            ProvisionError::Cancelled
        } else {
            wrap(source)
        }
    }
}

/// Create a group, add the requested members, and create a plan owned by it.
///
/// Principals that resolve to no user are reported in
/// [`ProvisionedPlan::missing_members`]. Adding an existing member succeeds.
pub async fn provision_plan(
    gateway: &dyn Gateway,
    request: &ProvisionRequest,
    cancel: &CancellationToken,
) -> Result<ProvisionedPlan, ProvisionError> {
    let group = cancellable(
        cancel,
        gateway.create_group(&request.group_name, &request.group_description),
    )
    .await
    .map_err(|source| {
        ProvisionError::or_cancelled(source, |source| ProvisionError::CreateGroup {
            name: request.group_name.clone(),
            source,
        })
    })?;
    info!(group_id = %group.id, name = %request.group_name, "created group");

    let mut added_members = Vec::new();
    let mut missing_members = Vec::new();
    for principal in &request.members {
        let found = cancellable(cancel, gateway.find_user(principal))
            .await
            .map_err(|source| {
                ProvisionError::or_cancelled(source, |source| ProvisionError::LookupMember {
                    principal: principal.clone(),
                    source,
                })
            })?;
        let Some(user) = found else {
            warn!(principal = %principal, "user not found, skipping");
            missing_members.push(principal.clone());
            continue;
        };

        cancellable(cancel, gateway.add_member(&group.id, &user.id))
            .await
            .map_err(|source| {
                ProvisionError::or_cancelled(source, |source| ProvisionError::AddMember {
                    group_id: group.id.clone(),
                    principal: principal.clone(),
                    source,
                })
            })?;
        info!(group_id = %group.id, user_id = %user.id, "added member");
        added_members.push(user);
    }

    let plan = match cancellable(cancel, gateway.create_plan(&request.plan_title, &group.id)).await
    {
        Ok(plan) => plan,
        Err(source) => {
            return Err(ProvisionError::or_cancelled(source, |source| {
                ProvisionError::CreatePlan {
                    group: Box::new(group.clone()),
                    title: request.plan_title.clone(),
                    source,
                }
            }));
        }
    };
    info!(plan_id = %plan.id, group_id = %group.id, "created plan");

    Ok(ProvisionedPlan {
        group,
        plan,
        added_members,
        missing_members,
    })
}

/// Result of searching every group's plans for a title.
#[derive(Debug, Clone, Default)]
pub struct PlanLookup {
    pub found: Option<(Group, RemotePlan)>,
    /// Groups whose plans could not be listed.
    pub failures: Vec<(Group, GatewayError)>,
}

/// Find the first plan titled exactly `title` across all groups.
///
/// A failed listing for one group does not stop the search; it is reported
/// in [`PlanLookup::failures`].
pub async fn find_plan_by_title(
    gateway: &dyn Gateway,
    title: &str,
) -> Result<PlanLookup, GatewayError> {
    let groups = gateway.list_groups().await?;
    let mut lookup = PlanLookup::default();
    for entry in gateway.list_plans_for_groups(&groups).await {
        match entry.result {
            Ok(plans) => {
                if lookup.found.is_none() {
                    if let Some(plan) = plans
                        .into_iter()
                        .find(|p| p.title.as_deref() == Some(title))
                    {
                        lookup.found = Some((entry.group, plan));
                    }
                }
            }
            Err(e) => lookup.failures.push((entry.group, e)),
        }
    }
    Ok(lookup)
}
