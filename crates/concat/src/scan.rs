//! Scanner module for discovering input clips.
//!
//! Only files directly inside the input directory are considered; the scan
//! does not descend into subdirectories.

use std::path::{Path, PathBuf};

/// Checks if a file has the given extension (case-insensitive, no dot).
pub fn has_extension(path: &Path, extension: &str) -> bool {
    let wanted = extension.trim_start_matches('.');
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(wanted))
        .unwrap_or(false)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

/// Lists the clips with `extension` directly inside `dir`.
///
/// This function:
/// - Looks at the immediate children of `dir` only
/// - Keeps regular files (symlinks to files are followed)
/// - Skips hidden files (names starting with `.`)
/// - Filters by extension (case-insensitive)
///
/// The returned list is sorted by path so discovery order is stable.
pub fn discover_clips(dir: &Path, extension: &str) -> Vec<PathBuf> {
    use walkdir::WalkDir;

    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true);

    let mut clips: Vec<PathBuf> = walker
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| !is_hidden(path) && has_extension(path, extension))
        .collect();

    clips.sort();
    clips
}
