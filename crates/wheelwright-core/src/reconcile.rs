//! Reconciling the source wheel's `RECORD` with the merged payload.
//!
//! The reconciled manifest is, in order: the freshly hashed payload entries,
//! the entries carried over from the source wheel (minus the stale `WHEEL`
//! entry and anything the payload shadows), the recomputed `WHEEL` entry, and
//! finally the `RECORD` self-entry if the source lacked one.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use wheelwright_schema::{RECORD_FILE, Record, RecordEntry, WHEEL_FILE};

use crate::error::RepackError;
use crate::manifest;

/// Manifest key of the `WHEEL` file, `<dist-info>/WHEEL`.
pub fn metadata_key(dist_info: &str) -> String {
    format!("{dist_info}/{WHEEL_FILE}")
}

/// Manifest key of the manifest itself, `<dist-info>/RECORD`.
pub fn record_key(dist_info: &str) -> String {
    format!("{dist_info}/{RECORD_FILE}")
}

/// Merge payload entries into an existing manifest and swap in a fresh
/// `WHEEL` entry.
///
/// `wheel_entry` must describe the rewritten `WHEEL` file; its path is the
/// key whose stale entries are dropped.
pub fn reconcile(
    payload: Vec<RecordEntry>,
    existing: Record,
    wheel_entry: RecordEntry,
    dist_info: &str,
) -> Record {
    let payload_paths: HashSet<String> = payload.iter().map(|e| e.path.clone()).collect();
    let own_key = record_key(dist_info);

    let mut record: Record = payload.into_iter().collect();
    record.extend(existing.into_entries().into_iter().filter(|e| {
        let shadowed = payload_paths.contains(&e.path);
        if shadowed {
            tracing::debug!(path = %e.path, "payload replaces existing record entry");
        }
        !shadowed
    }));

    record.retain(|e| e.path != wheel_entry.path);
    record.push(wheel_entry);

    if record.count(&own_key) == 0 {
        record.push(RecordEntry::unhashed(own_key));
    }
    record
}

/// Read and parse a `RECORD` file.
///
/// # Errors
///
/// Returns [`RepackError::RepackPrecondition`] if the file is missing,
/// [`RepackError::Record`] if it does not parse.
pub fn read_record(path: &Path) -> Result<Record, RepackError> {
    if !path.is_file() {
        return Err(RepackError::RepackPrecondition(path.to_path_buf()));
    }
    let text = fs::read_to_string(path)?;
    Record::parse(&text).map_err(|source| RepackError::Record {
        path: path.to_path_buf(),
        source,
    })
}

/// Serialize `record` to `path`, one entry per line.
///
/// # Errors
///
/// Returns an I/O error if the file cannot be written.
pub fn write_record(path: &Path, record: &Record) -> Result<(), RepackError> {
    fs::write(path, record.to_string())?;
    Ok(())
}

/// Reconcile the manifest of the wheel extracted under `root` in place.
///
/// Hashes the (already rewritten) `WHEEL` file, merges `payload` into the
/// existing `RECORD`, writes the result back and returns it.
///
/// # Errors
///
/// Returns an error if the dist-info files are missing or unreadable, or
/// the manifest cannot be written.
pub fn reconcile_in_place(
    root: &Path,
    dist_info: &str,
    payload: Vec<RecordEntry>,
) -> Result<Record, RepackError> {
    let dist_info_dir = root.join(dist_info);
    let record_file = dist_info_dir.join(RECORD_FILE);
    let wheel_file = dist_info_dir.join(WHEEL_FILE);
    if !wheel_file.is_file() {
        return Err(RepackError::RepackPrecondition(wheel_file));
    }

    let existing = read_record(&record_file)?;
    let wheel_entry = manifest::record_entry(&wheel_file, root)?;
    let record = reconcile(payload, existing, wheel_entry, dist_info);
    write_record(&record_file, &record)?;

    tracing::debug!(path = %record_file.display(), entries = record.len(), "wrote reconciled RECORD");
    Ok(record)
}
