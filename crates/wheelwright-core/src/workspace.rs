//! Disposable scratch directory for a batch of platform runs.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Scratch directory that is wiped before every platform and removed on drop.
///
/// Each platform run extracts the source wheel from scratch, so nothing left
/// behind by a previous platform can leak into the next archive.
#[derive(Debug)]
pub struct Workspace {
    root: PathBuf,
    _temp: Option<tempfile::TempDir>,
}

impl Workspace {
    /// Create a workspace inside a fresh system temp directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the temp directory cannot be created.
    pub fn temporary() -> io::Result<Self> {
        let temp = tempfile::Builder::new()
            .prefix("wheelwright-")
            .tempdir()?;
        let root = temp.path().join("stage");
        fs::create_dir(&root)?;
        Ok(Self {
            root,
            _temp: Some(temp),
        })
    }

    /// Use `root` as the workspace. Anything already there is deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be cleared or created.
    pub fn at(root: impl Into<PathBuf>) -> io::Result<Self> {
        let workspace = Self {
            root: root.into(),
            _temp: None,
        };
        workspace.reset()?;
        Ok(workspace)
    }

    /// Root directory of the workspace.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Delete and recreate the root, leaving it empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the old tree cannot be removed or the new root
    /// cannot be created.
    pub fn reset(&self) -> io::Result<()> {
        match fs::remove_dir_all(&self.root) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        fs::create_dir_all(&self.root)
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        match fs::remove_dir_all(&self.root) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => {
                tracing::warn!(path = %self.root.display(), error = %e, "failed to remove workspace");
            }
            _ => {}
        }
    }
}
