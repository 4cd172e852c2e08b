//! # Mirror Commands
//!
//! `download`, `backup` and `push` work on the local mirror only and never
//! write host files.

use anyhow::Result;
use log::info;

use server_autoconfig::workflow::Workflow;

pub fn download(workflow: &Workflow) -> Result<()> {
    workflow.download()?;
    info!(
        "Mirror at {} is up to date with {}",
        workflow.mirror().repo_dir().display(),
        workflow.config().upstream.git_pull_branch
    );
    Ok(())
}

pub fn backup(workflow: &mut Workflow) -> Result<()> {
    let summary = workflow.backup()?;
    info!(
        "Backup recorded on {}: {} ({})",
        workflow.config().upstream.git_backup_branch,
        summary.message,
        summary.commit
    );
    Ok(())
}

pub fn push(workflow: &Workflow) -> Result<()> {
    workflow.push()?;
    info!(
        "Pushed {} to {}",
        workflow.config().upstream.git_backup_branch,
        workflow.config().upstream.git_addr
    );
    Ok(())
}
