//! Color helpers for CLI output.
//!
//! Semantic Color Theme:
//!   - Created:  green
//!   - Reused:   cyan
//!   - Skipped:  yellow
//!   - Failed / drift: red
//!   - Headers:  bold
//!   - Detail:   dimmed

use colored::Colorize;

use super::OutputConfig;

/// Apply semantic "success" color (green) to text.
pub fn success(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.green().to_string()
}

/// Apply semantic "error" color (red) to text.
pub fn error(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.red().to_string()
}

/// Apply semantic "warning" color (yellow) to text.
pub fn warning(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.yellow().to_string()
}

/// Apply semantic "info" color (cyan) to text.
pub fn info(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.cyan().to_string()
}

pub(crate) fn bold(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.bold().to_string()
}

pub(crate) fn dimmed(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.dimmed().to_string()
}

/// Color a count only when it is non-zero.
pub(crate) fn count(
    n: usize,
    paint: fn(&str, &OutputConfig) -> String,
    config: &OutputConfig,
) -> String {
    let text = n.to_string();
    if n == 0 {
        text
    } else {
        paint(&text, config)
    }
}
