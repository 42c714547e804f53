//! Unpacking the source wheel.
//!
//! The archive is first copied into the workspace and then extracted next to
//! the copy, so the original is never opened for writing.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use zip::ZipArchive;

use crate::error::RepackError;

/// A file written by [`extract_zip`].
#[derive(Debug, Clone)]
pub struct ExtractedFile {
    /// Path relative to extraction root
    pub relative_path: PathBuf,
    /// Absolute path on disk
    pub absolute_path: PathBuf,
}

/// Copy `archive_path` into `workspace_root`, returning the staged copy.
///
/// # Errors
///
/// Returns [`RepackError::ArchiveRead`] if the archive cannot be read.
pub fn stage_archive(archive_path: &Path, workspace_root: &Path) -> Result<PathBuf, RepackError> {
    let file_name = archive_path
        .file_name()
        .ok_or_else(|| RepackError::ArchiveRead {
            path: archive_path.to_path_buf(),
            reason: "path has no file name".to_string(),
        })?;
    let staged = workspace_root.join(file_name);
    fs::copy(archive_path, &staged).map_err(|e| RepackError::ArchiveRead {
        path: archive_path.to_path_buf(),
        reason: e.to_string(),
    })?;
    Ok(staged)
}

/// Extract a zip archive into `dest_dir`.
///
/// Entries whose names would escape `dest_dir` are skipped. Unix permission
/// bits recorded in the archive are restored.
///
/// # Errors
///
/// Returns [`RepackError::ArchiveRead`] if the file is not a readable zip
/// container, or an I/O error if writing an entry fails.
pub fn extract_zip(archive_path: &Path, dest_dir: &Path) -> Result<Vec<ExtractedFile>, RepackError> {
    let archive_err = |reason: String| RepackError::ArchiveRead {
        path: archive_path.to_path_buf(),
        reason,
    };

    let file = File::open(archive_path).map_err(|e| archive_err(e.to_string()))?;
    let mut archive = ZipArchive::new(file).map_err(|e| archive_err(e.to_string()))?;

    fs::create_dir_all(dest_dir)?;
    let mut extracted_files = Vec::new();

    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .map_err(|e| archive_err(e.to_string()))?;
        let Some(relative_path) = file.enclosed_name() else {
            tracing::warn!(entry = file.name(), "skipping archive entry outside the extraction root");
            continue;
        };

        if file.is_dir() {
            fs::create_dir_all(dest_dir.join(&relative_path))?;
            continue;
        }

        let absolute_path = dest_dir.join(&relative_path);
        if let Some(p) = absolute_path.parent() {
            fs::create_dir_all(p)?;
        }

        let mut outfile = File::create(&absolute_path)?;
        io::copy(&mut file, &mut outfile)?;

        restore_permissions(&absolute_path, file.unix_mode())?;

        extracted_files.push(ExtractedFile {
            relative_path,
            absolute_path,
        });
    }

    Ok(extracted_files)
}

#[cfg(unix)]
fn restore_permissions(path: &Path, mode: Option<u32>) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    match mode {
        Some(mode) if mode & 0o777 != 0 => fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o7777)),
        _ => Ok(()),
    }
}

#[cfg(not(unix))]
fn restore_permissions(_path: &Path, _mode: Option<u32>) -> io::Result<()> {
    Ok(())
}
