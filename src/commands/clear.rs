//! # Clear Command Implementation
//!
//! Deletes the instance directory: the mirror, its marker and every backup
//! that was not pushed. Asks for confirmation first unless `--yes` is given.
//! Without a terminal to ask on, it refuses instead of guessing.

use anyhow::{bail, Context, Result};
use dialoguer::{theme::ColorfulTheme, Confirm};
use log::info;
use std::io::IsTerminal;

use server_autoconfig::workflow::Workflow;

pub fn execute(workflow: &Workflow, yes: bool) -> Result<()> {
    let instance_dir = workflow.mirror().instance_dir();

    if !yes {
        if !std::io::stdin().is_terminal() || !console::user_attended_stderr() {
            bail!(
                "Refusing to delete {} without confirmation\n  hint: Pass --yes to clear non-interactively",
                instance_dir.display()
            );
        }

        let theme = ColorfulTheme::default();
        let confirmed = Confirm::with_theme(&theme)
            .with_prompt(format!(
                "Delete {} and all local backups?",
                instance_dir.display()
            ))
            .default(false)
            .interact()
            .context("Failed to read confirmation")?;

        if !confirmed {
            info!("Aborted, nothing deleted");
            return Ok(());
        }
    }

    if workflow.clear()? {
        info!("Removed {}", instance_dir.display());
    } else {
        info!("Nothing to remove at {}", instance_dir.display());
    }
    Ok(())
}
