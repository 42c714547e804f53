//! Building `RECORD` entries from files on disk.
//!
//! Record paths are computed with [`Path::strip_prefix`] against the package
//! root, never by searching the absolute path for a marker string.

use std::io;
use std::path::{Component, Path};

use walkdir::WalkDir;
use wheelwright_schema::{RecordEntry, RecordHash};

use crate::error::RepackError;

/// Archive-relative, `/`-separated path of `path` under `root`.
///
/// # Errors
///
/// Returns an `InvalidInput` I/O error if `path` is not inside `root` or
/// contains a non-UTF-8 component.
pub fn record_path(path: &Path, root: &Path) -> Result<String, RepackError> {
    let relative = path.strip_prefix(root).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} is not under {}", path.display(), root.display()),
        )
    })?;

    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str().ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("non-UTF-8 path: {}", path.display()),
                )
            })?),
            Component::CurDir => {}
            _ => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("unexpected component in {}", relative.display()),
                )
                .into());
            }
        }
    }
    Ok(parts.join("/"))
}

/// Hash one file and describe it relative to `root`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not under `root`.
pub fn record_entry(path: &Path, root: &Path) -> Result<RecordEntry, RepackError> {
    let relative = record_path(path, root)?;
    let (hash, size) = RecordHash::sha256_file(path)?;
    Ok(RecordEntry::new(relative, hash, size))
}

/// One entry per file under `scan_dir`, with paths relative to `root`.
///
/// Directory entries are visited in file-name order, so the same tree always
/// yields the same sequence. Symlinks are followed.
///
/// # Errors
///
/// Returns an error if the walk or any file read fails.
pub fn build_entries(scan_dir: &Path, root: &Path) -> Result<Vec<RecordEntry>, RepackError> {
    let mut entries = Vec::new();
    for entry in WalkDir::new(scan_dir).follow_links(true).sort_by_file_name() {
        let entry = entry.map_err(io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        entries.push(record_entry(entry.path(), root)?);
    }
    tracing::debug!(dir = %scan_dir.display(), files = entries.len(), "hashed payload");
    Ok(entries)
}
