//! Output naming and publishing.
//!
//! Concatenation renders into the scratch directory; the finished file is
//! then moved to its final name. Replacing an existing output keeps a backup
//! until the new file is in place.

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors that can occur while publishing an output.
#[derive(Debug, Error)]
pub enum OutputError {
    /// Failed to move the existing output out of the way.
    #[error("Failed to back up {path}: {source}")]
    BackupFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to move the rendered file to its destination.
    #[error("Failed to move rendered output to {path}: {source}")]
    MoveFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to create the output directory.
    #[error("Failed to create output directory {path}: {source}")]
    CreateDirFailed {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// First `<prefix>_<n><ext>` in `dir` that does not exist, counting from 1.
///
/// # Example
///
/// ```
/// use std::path::Path;
/// use clip_concat::output::next_available_output;
///
/// let path = next_available_output(Path::new("/nonexistent/out"), "Concat", ".mp4");
/// assert_eq!(path, Path::new("/nonexistent/out/Concat_1.mp4"));
/// ```
pub fn next_available_output(dir: &Path, prefix: &str, extension: &str) -> PathBuf {
    let mut number: u64 = 1;
    loop {
        let candidate = dir.join(format!("{}_{}{}", prefix, number, extension));
        if !candidate.exists() {
            return candidate;
        }
        number += 1;
    }
}

/// Backup location used while `dest` is being replaced: `<name>.bak`.
pub fn backup_path(dest: &Path) -> PathBuf {
    let mut backup = dest.as_os_str().to_owned();
    backup.push(".bak");
    PathBuf::from(backup)
}

/// Moves a file, falling back to copy and delete across filesystems.
fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    fs::copy(from, to)?;
    fs::remove_file(from)
}

/// Moves `rendered` to `dest`, replacing any existing file.
///
/// An existing `dest` is first moved to [`backup_path`]. If the new file
/// cannot be put in place, the backup is restored and `dest` is left as it
/// was. The backup is removed once the new file is in place.
pub fn publish_output(rendered: &Path, dest: &Path) -> Result<(), OutputError> {
    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| OutputError::CreateDirFailed {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let backup = if dest.exists() {
        let backup = backup_path(dest);
        move_file(dest, &backup).map_err(|source| OutputError::BackupFailed {
            path: dest.to_path_buf(),
            source,
        })?;
        Some(backup)
    } else {
        None
    };

    if let Err(source) = move_file(rendered, dest) {
        if let Some(backup) = &backup {
            if let Err(e) = move_file(backup, dest) {
                warn!("Could not restore {} from {}: {}", dest.display(), backup.display(), e);
            }
        }
        return Err(OutputError::MoveFailed {
            path: dest.to_path_buf(),
            source,
        });
    }

    if let Some(backup) = backup {
        if let Err(e) = fs::remove_file(&backup) {
            warn!("Could not remove backup {}: {}", backup.display(), e);
        }
    }

    debug!("Published {} to {}", rendered.display(), dest.display());
    Ok(())
}
