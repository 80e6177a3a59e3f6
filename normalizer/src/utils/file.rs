//! File path helpers

use std::path::PathBuf;

/// Expand a user-supplied path
///
/// `~` and `~/...` resolve against the home directory. Relative paths are
/// anchored at the current working directory so log lines show where a file
/// was actually read from.
pub fn expand_path(path: &str) -> PathBuf {
    let path = path.trim();

    let expanded = if path == "~" {
        dirs::home_dir().unwrap_or_else(|| PathBuf::from(path))
    } else if let Some(rest) = path.strip_prefix("~/") {
        dirs::home_dir().map_or_else(|| PathBuf::from(path), |home| home.join(rest))
    } else {
        PathBuf::from(path)
    };

    if expanded.is_relative() {
        std::env::current_dir()
            .map(|cwd| cwd.join(&expanded))
            .unwrap_or(expanded)
    } else {
        expanded
    }
}
