//! Re-emitting the platform archive.
//!
//! The dist-info and package directories are moved under a single
//! `<package>-<version>-<tag>` root, which is then zipped with entries in
//! sorted order and deflate compression. Zip timestamps only cover
//! 1980-01-01 to 2107-12-31; file times outside that range are clamped
//! rather than rejected.

use std::fs::{self, File, Metadata};
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, Timelike, Utc};
use walkdir::WalkDir;
use zip::CompressionMethod;
use zip::write::{SimpleFileOptions, ZipWriter};

use crate::error::RepackError;
use crate::manifest;

/// How entry timestamps are chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TimestampPolicy {
    /// Use each file's modification time, clamped into the zip range.
    #[default]
    Clamp,
    /// Stamp every entry with this Unix time (seconds), also clamped.
    Fixed(i64),
}

impl TimestampPolicy {
    fn entry_time(self, meta: &Metadata) -> zip::DateTime {
        match self {
            Self::Fixed(secs) => fixed_time(secs),
            Self::Clamp => meta
                .modified()
                .map_or_else(|_| zip::DateTime::default(), |t| zip_datetime(&t.into())),
        }
    }
}

/// Convert a UTC time to a zip timestamp, clamping to the representable
/// range.
pub fn zip_datetime(time: &DateTime<Utc>) -> zip::DateTime {
    match time.year() {
        ..1980 => zip::DateTime::default(),
        2108.. => zip_max(),
        year => zip::DateTime::from_date_and_time(
            year as u16,
            time.month() as u8,
            time.day() as u8,
            time.hour() as u8,
            time.minute() as u8,
            time.second() as u8,
        )
        .unwrap_or_default(),
    }
}

/// Seconds beyond chrono's range still clamp to the nearer zip bound.
fn fixed_time(secs: i64) -> zip::DateTime {
    match DateTime::from_timestamp(secs, 0) {
        Some(t) => zip_datetime(&t),
        None if secs > 0 => zip_max(),
        None => zip::DateTime::default(),
    }
}

/// Entries this large need zip64 extra fields.
fn needs_zip64(len: u64) -> bool {
    len >= u64::from(u32::MAX)
}

fn zip_max() -> zip::DateTime {
    zip::DateTime::from_date_and_time(2107, 12, 31, 23, 59, 58).unwrap_or_default()
}

/// Move `dirs` from `workspace_root` into a new `<workspace_root>/<stem>`
/// directory and return it.
///
/// # Errors
///
/// Returns [`RepackError::RepackPrecondition`] naming the first missing
/// directory; nothing is moved in that case.
pub fn assemble_root(workspace_root: &Path, stem: &str, dirs: &[&str]) -> Result<PathBuf, RepackError> {
    if let Some(missing) = dirs
        .iter()
        .map(|d| workspace_root.join(d))
        .find(|p| !p.is_dir())
    {
        return Err(RepackError::RepackPrecondition(missing));
    }

    let root = workspace_root.join(stem);
    fs::create_dir_all(&root)?;
    for dir in dirs {
        fs::rename(workspace_root.join(dir), root.join(dir))?;
    }
    Ok(root)
}

/// Zip every file under `src_root` into `dest`, returning the entry count.
///
/// Entry names are `/`-separated paths relative to `src_root`, written in
/// sorted order.
///
/// # Errors
///
/// Returns an error if a file cannot be read or the archive written.
pub fn zip_tree(src_root: &Path, dest: &Path, policy: TimestampPolicy) -> Result<usize, RepackError> {
    let mut zip = ZipWriter::new(File::create(dest)?);
    let mut count = 0;

    for entry in WalkDir::new(src_root)
        .follow_links(true)
        .sort_by_file_name()
        .min_depth(1)
    {
        let entry = entry.map_err(io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = manifest::record_path(entry.path(), src_root)?;
        let meta = entry.metadata().map_err(io::Error::from)?;
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(policy.entry_time(&meta))
            .unix_permissions(file_mode(&meta))
            .large_file(needs_zip64(meta.len()));

        zip.start_file(name, options)?;
        io::copy(&mut File::open(entry.path())?, &mut zip)?;
        count += 1;
    }

    zip.finish()?;
    Ok(count)
}

#[cfg(unix)]
fn file_mode(meta: &Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o777
}

#[cfg(not(unix))]
fn file_mode(_meta: &Metadata) -> u32 {
    0o644
}

/// Move `file` into `output_dir`, replacing any file of the same name.
///
/// # Errors
///
/// Returns an error if the output directory cannot be created or the file
/// can be neither renamed nor copied.
pub fn relocate(file: &Path, output_dir: &Path) -> Result<PathBuf, RepackError> {
    let name = file
        .file_name()
        .ok_or_else(|| RepackError::RepackPrecondition(file.to_path_buf()))?;
    fs::create_dir_all(output_dir)?;
    let target = output_dir.join(name);
    if target.exists() {
        fs::remove_file(&target)?;
    }

    // Rename fails across filesystems; fall back to copying.
    if fs::rename(file, &target).is_err() {
        fs::copy(file, &target)?;
        fs::remove_file(file)?;
    }
    Ok(target)
}

/// Assemble, zip and relocate one platform archive.
///
/// `stem` is `<package>-<version>-<tag>`; `dirs` are the workspace
/// directories that make up the archive. Returns the final archive path.
///
/// # Errors
///
/// Returns [`RepackError::RepackPrecondition`] if a directory is missing,
/// or any I/O or zip failure.
pub fn repack(
    workspace_root: &Path,
    stem: &str,
    dirs: &[&str],
    output_dir: &Path,
    policy: TimestampPolicy,
) -> Result<PathBuf, RepackError> {
    let root = assemble_root(workspace_root, stem, dirs)?;
    let archive = workspace_root.join(format!("{stem}.whl"));
    let entries = zip_tree(&root, &archive, policy)?;
    tracing::debug!(archive = %archive.display(), entries, "wrote archive");
    relocate(&archive, output_dir)
}
