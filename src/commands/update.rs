//! # Update and Rollback Commands
//!
//! `update` snapshots the host files to the backup branch, deploys the pull
//! branch and reloads the services whose files changed. `rollback` restores
//! the files of the last snapshot, removes the ones it recorded as absent and
//! drops it.

use anyhow::Result;
use log::{info, warn};

use server_autoconfig::workflow::{DeploySummary, Workflow};

pub fn update(workflow: &mut Workflow) -> Result<()> {
    let summary = workflow.update()?;
    if let Some(backup) = &summary.backup {
        info!("Previous configuration saved: {}", backup.message);
    }
    report(&summary);
    info!("Update complete");
    Ok(())
}

pub fn rollback(workflow: &mut Workflow) -> Result<()> {
    let summary = workflow.rollback()?;
    report(&summary);
    info!("Rollback complete");
    Ok(())
}

fn report(summary: &DeploySummary) {
    info!(
        "{} file(s) updated, {} unchanged, {} skipped",
        summary.sync.copied.len(),
        summary.sync.unchanged.len(),
        summary.sync.missing.len()
    );
    if !summary.sync.removed.is_empty() {
        info!("{} file(s) removed", summary.sync.removed.len());
    }

    let Some(reload) = &summary.reload else {
        info!("Service reloading disabled");
        return;
    };
    if reload.reloaded.is_empty() {
        info!("No service needed a reload");
    } else {
        info!("Reloaded: {}", reload.reloaded.join(", "));
    }
    if !reload.failed_hooks.is_empty() {
        warn!("Failed hooks: {}", reload.failed_hooks.join(", "));
    }
}
