//! `plansmith provision` command: group, members, then plan.

use std::io::Write;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use plansmith_core::gateway::Gateway;
use plansmith_core::provision::{ProvisionRequest, provision_plan};

pub async fn run_provision(
    gateway: &dyn Gateway,
    request: &ProvisionRequest,
    cancel: &CancellationToken,
    out: &mut dyn Write,
) -> Result<()> {
    let provisioned = provision_plan(gateway, request, cancel)
        .await
        .context("provisioning failed")?;

    writeln!(
        out,
        "Group: {} ({})",
        provisioned.group.label(),
        provisioned.group.id
    )?;
    for user in &provisioned.added_members {
        let name = user
            .user_principal_name
            .as_deref()
            .or(user.display_name.as_deref())
            .unwrap_or(&user.id);
        writeln!(out, "  member: {name}")?;
    }
    for missing in &provisioned.missing_members {
        writeln!(out, "  not found: {missing}")?;
    }
    writeln!(
        out,
        "Plan: {} ({})",
        provisioned.plan.title.as_deref().unwrap_or(&request.plan_title),
        provisioned.plan.id
    )?;
    writeln!(out)?;
    writeln!(
        out,
        "Next: plansmith materialize --plan-id {}",
        provisioned.plan.id
    )?;
    Ok(())
}
