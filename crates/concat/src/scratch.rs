//! Scratch directory for intermediates.
//!
//! Every segment and the rendered output of a run live in one directory that
//! is removed as a whole when the run ends, whether it succeeded or not.

use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

/// Scratch directory owned by one run; removed on [`ScratchDir::close`] or
/// on drop.
#[derive(Debug)]
pub struct ScratchDir {
    dir: TempDir,
}

impl ScratchDir {
    /// Creates a fresh `.clip-concat-*` directory inside `base`.
    pub fn create_in(base: &Path) -> std::io::Result<Self> {
        std::fs::create_dir_all(base)?;
        let dir = tempfile::Builder::new()
            .prefix(".clip-concat-")
            .tempdir_in(base)?;
        debug!("Created scratch directory {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Location for a file inside the scratch directory.
    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Removes the directory and everything in it. Failures are logged, not
    /// returned, since the run's result is already decided.
    pub fn close(self) {
        let path = self.dir.path().to_path_buf();
        match self.dir.close() {
            Ok(()) => debug!("Removed scratch directory {}", path.display()),
            Err(e) => warn!("Failed to remove scratch directory {}: {}", path.display(), e),
        }
    }
}
