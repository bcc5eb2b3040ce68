//! CLI theme and styling.

use colored::{ColoredString, Colorize};
use keystone_core::{BreakerState, PluginStatus};

/// CLI theme.
pub(crate) struct Theme;

impl Theme {
    /// Format a header.
    pub(crate) fn header(text: &str) -> String {
        format!("{}", text.bold().cyan())
    }

    /// Format a success message.
    pub(crate) fn success(text: &str) -> String {
        format!("{} {}", "✓".green(), text)
    }

    /// Format an error message.
    pub(crate) fn error(text: &str) -> String {
        format!("{} {}", "✗".red(), text.red())
    }

    /// Format a warning message.
    pub(crate) fn warning(text: &str) -> String {
        format!("{} {}", "!".yellow(), text.yellow())
    }

    /// Format a dimmed message.
    pub(crate) fn dimmed(text: &str) -> String {
        format!("{}", text.dimmed())
    }

    /// Format a separator line.
    pub(crate) fn separator() -> String {
        "━".repeat(50).dimmed().to_string()
    }

    pub(crate) fn status(status: PluginStatus) -> ColoredString {
        let label = status.to_string();
        match status {
            PluginStatus::Active => label.green(),
            PluginStatus::Disabled => label.dimmed(),
            PluginStatus::PausedDependency => label.yellow(),
            PluginStatus::Error => label.red().bold(),
        }
    }

    pub(crate) fn breaker(state: BreakerState) -> ColoredString {
        let label = state.to_string();
        match state {
            BreakerState::Closed => label.green(),
            BreakerState::HalfOpen => label.yellow(),
            BreakerState::Open => label.red().bold(),
        }
    }
}
