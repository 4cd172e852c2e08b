//! # Output Configuration
//!
//! Everything the tool prints goes through the `log` facade to stderr, one
//! line per record, tagged with a level prefix:
//!
//! | Level | Prefix    |
//! |-------|-----------|
//! | error | `[ERR]`   |
//! | warn  | `[WARN]`  |
//! | info  | `[INFO]`  |
//! | debug | `[NOTE]`  |
//! | trace | `[TRACE]` |
//!
//! ## Respecting User Preferences
//!
//! Prefixes are colored unless one of these says otherwise:
//! - `--color=never|always|auto` - CLI flag for color control
//! - `NO_COLOR` - Disables colors when set (per https://no-color.org/)
//! - `CLICOLOR=0` - Disables colors
//! - `CLICOLOR_FORCE=1` - Forces colors even in non-TTY
//! - `TERM=dumb` - Disables colors for dumb terminals
//!
//! Debug records are hidden until [`set_debug`] is called with `true`, which
//! happens once the `--debug` flag or `basic/debug` is known.

use std::env;
use std::io::Write;

use console::style;
use log::{Level, LevelFilter};

/// Output configuration for controlling colors.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Whether level prefixes are colored.
    pub use_color: bool,
}

impl OutputConfig {
    /// Create an output configuration from environment and CLI flag.
    ///
    /// # Arguments
    /// * `color_flag` - The value of the --color CLI flag: "always", "never", or "auto"
    ///
    /// In auto mode, colors are disabled if:
    /// - `NO_COLOR` environment variable is set (any value, including empty)
    /// - `CLICOLOR=0` is set
    /// - `TERM=dumb` is set
    /// - stderr is not a TTY (unless `CLICOLOR_FORCE=1`)
    pub fn from_env_and_flag(color_flag: &str) -> Self {
        let use_color = match color_flag.to_lowercase().as_str() {
            "always" => true,
            "never" => false,
            _ => Self::detect_color_support(),
        };

        Self { use_color }
    }

    /// Detect whether color output is supported based on environment.
    fn detect_color_support() -> bool {
        // The presence of the variable (even if empty) disables colors
        if env::var_os("NO_COLOR").is_some() {
            return false;
        }

        if env::var("CLICOLOR").is_ok_and(|v| v == "0") {
            return false;
        }

        if env::var("CLICOLOR_FORCE").is_ok_and(|v| v != "0" && !v.is_empty()) {
            return true;
        }

        if env::var("TERM").is_ok_and(|v| v == "dumb") {
            return false;
        }

        console::Term::stderr().features().colors_supported()
    }

    /// Create a configuration with colors always enabled.
    #[cfg(test)]
    pub fn with_color() -> Self {
        Self { use_color: true }
    }

    /// Create a configuration with colors always disabled.
    #[cfg(test)]
    pub fn without_color() -> Self {
        Self { use_color: false }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self::from_env_and_flag("auto")
    }
}

/// The bracketed tag printed in front of records of `level`.
pub fn prefix(level: Level) -> &'static str {
    match level {
        Level::Error => "[ERR]",
        Level::Warn => "[WARN]",
        Level::Info => "[INFO]",
        Level::Debug => "[NOTE]",
        Level::Trace => "[TRACE]",
    }
}

/// Render one log line.
pub fn format_line(config: &OutputConfig, level: Level, message: &str) -> String {
    let tag = prefix(level);
    if !config.use_color {
        return format!("{} {}", tag, message);
    }

    let tag = match level {
        Level::Error => style(tag).red().bold(),
        Level::Warn => style(tag).yellow().bold(),
        Level::Info => style(tag).green(),
        Level::Debug => style(tag).cyan(),
        Level::Trace => style(tag).dim(),
    }
    .force_styling(true);
    format!("{} {}", tag, message)
}

/// Install the stderr logger.
///
/// Starts at info level; calling this twice keeps the first logger.
pub fn init_logger(config: &OutputConfig) {
    let config = config.clone();
    let installed = env_logger::Builder::new()
        .filter_level(LevelFilter::Trace)
        .target(env_logger::Target::Stderr)
        .format(move |buf, record| {
            writeln!(buf, "{}", format_line(&config, record.level(), &record.args().to_string()))
        })
        .try_init()
        .is_ok();
    if installed {
        set_debug(false);
    }
}

/// Show or hide debug records.
pub fn set_debug(debug: bool) {
    log::set_max_level(if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    });
}
