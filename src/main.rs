//! # Server Autoconfig CLI
//!
//! This is the binary entry point for the `server-autoconfig` command-line tool.
//!
//! Its primary responsibilities are:
//! - Parsing command-line arguments using `clap`.
//! - Installing the stderr logger.
//! - Reporting a failed action as an `[ERR]` line and exit status 1.
//!
//! The core application logic is defined in the `lib.rs` library crate, ensuring
//! that the binary is a thin wrapper around the reusable library functionality.

mod cli;
mod commands;

use std::process::ExitCode;

use clap::Parser;
use log::{error, info};

use server_autoconfig::error::Error;
use server_autoconfig::output::{self, OutputConfig};

fn main() -> ExitCode {
    let cli = cli::Cli::parse();
    output::init_logger(&OutputConfig::from_env_and_flag(&cli.color));

    match cli.execute() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            if e
                .downcast_ref::<Error>()
                .is_some_and(Error::is_validation)
            {
                info!("Nothing was changed on this host");
            }
            ExitCode::FAILURE
        }
    }
}
