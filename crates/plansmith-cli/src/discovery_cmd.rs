//! `plansmith plans` and `plansmith sites`: read-only listings.

use std::io::Write;

use anyhow::{Context, Result};
use tracing::warn;

use plansmith_core::gateway::Gateway;
use plansmith_core::model::Site;
use plansmith_core::sites::classify;

/// List every group's plans. Groups whose listing failed are reported
/// inline and do not fail the command.
pub async fn run_plans(gateway: &dyn Gateway, out: &mut dyn Write) -> Result<()> {
    let groups = gateway.list_groups().await.context("failed to list groups")?;
    if groups.is_empty() {
        writeln!(out, "No groups found.")?;
        return Ok(());
    }

    let mut failures = 0usize;
    for entry in gateway.list_plans_for_groups(&groups).await {
        writeln!(out, "{} ({})", entry.group.label(), entry.group.id)?;
        match entry.result {
            Ok(plans) if plans.is_empty() => writeln!(out, "  (no plans)")?,
            Ok(plans) => {
                for plan in plans {
                    writeln!(
                        out,
                        "  {} ({})",
                        plan.title.as_deref().unwrap_or("(untitled)"),
                        plan.id
                    )?;
                }
            }
            Err(e) => {
                failures += 1;
                warn!(group_id = %entry.group.id, error = %e, "plan listing failed");
                writeln!(out, "  error: {e}")?;
            }
        }
    }

    if failures > 0 {
        writeln!(out)?;
        writeln!(out, "{failures} group(s) could not be listed.")?;
    }
    Ok(())
}

fn site_line(site: &Site) -> String {
    format!(
        "  {} {}",
        site.display_name.as_deref().unwrap_or_default(),
        site.web_url.as_deref().unwrap_or_default()
    )
}

/// List SharePoint sites and OneDrives separately.
pub async fn run_sites(gateway: &dyn Gateway, out: &mut dyn Write) -> Result<()> {
    let sites = gateway.list_sites().await.context("failed to list sites")?;
    let classified = classify(sites);

    writeln!(out, "SharePoint sites ({}):", classified.share_point.len())?;
    for site in &classified.share_point {
        writeln!(out, "{}", site_line(site))?;
    }
    writeln!(out)?;
    writeln!(out, "OneDrive sites ({}):", classified.one_drive.len())?;
    for site in &classified.one_drive {
        writeln!(out, "{}", site_line(site))?;
    }
    Ok(())
}
