//! Color and styling utilities with support for NO_COLOR and TERM environment variables.
//!
//! Colors are enabled unless one of these says otherwise:
//! - `--no-color` CLI flag
//! - `NO_COLOR` environment variable (https://no-color.org/)
//! - `MEDIQ_NO_COLOR` environment variable (application-specific)
//! - `TERM=dumb`
//! - stderr is not a TTY

use colored::ColoredString;
use std::io::{stderr, IsTerminal};
use std::sync::OnceLock;

static COLOR_CONFIG: OnceLock<ColorConfig> = OnceLock::new();

fn should_disable_colors_from_env() -> bool {
    !std::env::var("NO_COLOR").unwrap_or_default().is_empty()
        || !std::env::var("MEDIQ_NO_COLOR").unwrap_or_default().is_empty()
        || std::env::var("TERM").unwrap_or_default() == "dumb"
        // log messages go to stderr
        || !stderr().is_terminal()
}

#[derive(Debug, Clone)]
struct ColorConfig {
    colors_enabled: bool,
}

impl ColorConfig {
    fn new(no_color_flag: bool) -> Self {
        let colors_enabled = !no_color_flag && !should_disable_colors_from_env();
        Self { colors_enabled }
    }

    fn is_enabled(&self) -> bool {
        self.colors_enabled
    }
}

/// Initialize the color configuration with the CLI flag state.
/// Call once at startup after parsing CLI arguments.
pub fn init_color_config(no_color_flag: bool) {
    let config = ColorConfig::new(no_color_flag);
    if COLOR_CONFIG.set(config).is_err() {
        eprintln!("Warning: Color configuration already initialized");
    }
}

/// Whether colored output is enabled
pub fn colors_enabled() -> bool {
    COLOR_CONFIG
        .get()
        .map(|config| config.is_enabled())
        .unwrap_or_else(|| !should_disable_colors_from_env())
}

/// Apply color to a string only if `enabled`
pub fn maybe_color<F>(text: &str, enabled: bool, color_fn: F) -> String
where
    F: FnOnce(&str) -> ColoredString,
{
    if enabled {
        color_fn(text).to_string()
    } else {
        text.to_string()
    }
}

/// Apply color to a string only if colors are enabled for stderr output
pub fn maybe_color_stderr<F>(text: &str, color_fn: F) -> String
where
    F: FnOnce(&str) -> ColoredString,
{
    maybe_color(text, colors_enabled(), color_fn)
}

/// Semantic color functions for log levels
pub mod colors {
    use super::maybe_color_stderr;
    use colored::Colorize;

    pub fn error_level(text: &str) -> String {
        maybe_color_stderr(text, |s| s.red().bold())
    }

    pub fn warning_level(text: &str) -> String {
        maybe_color_stderr(text, |s| s.yellow())
    }

    pub fn info_level(text: &str) -> String {
        maybe_color_stderr(text, |s| s.green())
    }

    pub fn debug_level(text: &str) -> String {
        maybe_color_stderr(text, |s| s.blue())
    }

    pub fn trace_level(text: &str) -> String {
        maybe_color_stderr(text, |s| s.magenta())
    }
}

/// Semantic symbols for different operation types and states
pub mod symbols {
    use super::colors_enabled;

    /// Symbol for starting an image analysis
    pub fn analysis_start() -> &'static str {
        if colors_enabled() {
            "🩺 "
        } else {
            ""
        }
    }

    /// Symbol for merging metrics with metadata
    pub fn merge_start() -> &'static str {
        if colors_enabled() {
            "🔗 "
        } else {
            "[MERGE] "
        }
    }

    /// Symbol for finding/targeting resources
    pub fn resources_found() -> &'static str {
        if colors_enabled() {
            "📂 "
        } else {
            ""
        }
    }

    /// Symbol for dataset statistics
    pub fn statistics() -> &'static str {
        if colors_enabled() {
            "📊 "
        } else {
            ""
        }
    }

    /// Symbol for operation failures
    pub fn operation_failed() -> &'static str {
        if colors_enabled() {
            "❌ "
        } else {
            "[FAILED] "
        }
    }

    /// Symbol for successful completion
    pub fn completed_successfully() -> &'static str {
        if colors_enabled() {
            "✅ "
        } else {
            "[SUCCESS] "
        }
    }

    /// Symbol for partial success (some successes, some failures)
    pub fn completed_partially_successfully() -> &'static str {
        if colors_enabled() {
            "⚠️  "
        } else {
            "[PARTIAL-SUCCESS] "
        }
    }

    pub fn warning() -> &'static str {
        if colors_enabled() {
            "⚠️  "
        } else {
            ""
        }
    }
}

/// Progress bar utilities that respect TTY state
pub mod progress {
    use super::colors_enabled;
    use indicatif::{ProgressBar, ProgressStyle};
    use std::io::{stderr, IsTerminal};

    /// Create a progress bar for batch processing, only if stderr is interactive
    pub fn create_batch_progress_bar(total: usize) -> Option<ProgressBar> {
        if total <= 1 || !stderr().is_terminal() {
            return None;
        }

        let pb = ProgressBar::new(total as u64);
        let (template, chars) = if colors_enabled() {
            (
                "[{elapsed_precise}] [{bar:30.green/black}] {pos}/{len} ({percent}%) {msg}",
                "█▓▒░",
            )
        } else {
            (
                "[{elapsed_precise}] [{bar:30}] {pos}/{len} ({percent}%) {msg}",
                "#> ",
            )
        };
        // Templates are static; fall back to the default style if one is rejected
        let style = ProgressStyle::default_bar()
            .template(template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars(chars);

        pb.set_style(style);
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        Some(pb)
    }
}
