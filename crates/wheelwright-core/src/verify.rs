//! Checking a `RECORD` against the files it describes.
//!
//! The same comparison backs two callers: the pipeline's post-reconciliation
//! check over the workspace tree, and `wheelwright verify` over a finished
//! archive.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use walkdir::WalkDir;
use wheelwright_schema::{RECORD_FILE, Record, RecordHash};
use zip::ZipArchive;

use crate::error::RepackError;
use crate::manifest;

/// Digest and size of every file actually present, keyed by record path.
pub type FileIndex = BTreeMap<String, (RecordHash, u64)>;

/// A disagreement between a manifest and the files it describes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Issue {
    /// A file is present but has no record.
    Unrecorded(String),
    /// A record names a file that is not present.
    Missing(String),
    /// A path has more than one record.
    Duplicate(String),
    /// A record other than the manifest's own has no hash.
    Unhashed(String),
    /// The recorded digest differs from the file's content.
    HashMismatch(String),
    /// The recorded size differs from the file's length.
    SizeMismatch {
        /// Record path.
        path: String,
        /// Size in the manifest.
        recorded: u64,
        /// Size on disk.
        actual: u64,
    },
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unrecorded(p) => write!(f, "{p} has no record"),
            Self::Missing(p) => write!(f, "{p} is recorded but missing"),
            Self::Duplicate(p) => write!(f, "{p} is recorded more than once"),
            Self::Unhashed(p) => write!(f, "{p} has no hash"),
            Self::HashMismatch(p) => write!(f, "{p} does not match its recorded hash"),
            Self::SizeMismatch {
                path,
                recorded,
                actual,
            } => write!(f, "{path} is {actual} bytes, recorded as {recorded}"),
        }
    }
}

/// Compare `record` with `files`.
///
/// `own_path` is the manifest's own key, which is allowed to carry no hash
/// or size. Issues come back sorted.
pub fn check_record(record: &Record, files: &FileIndex, own_path: &str) -> Vec<Issue> {
    let mut issues = Vec::new();
    let mut seen: HashMap<&str, usize> = HashMap::new();

    for entry in record {
        let count = seen.entry(entry.path.as_str()).or_default();
        *count += 1;
        if *count == 2 {
            issues.push(Issue::Duplicate(entry.path.clone()));
        }
        if *count > 1 {
            continue;
        }

        let Some((actual_hash, actual_size)) = files.get(&entry.path) else {
            issues.push(Issue::Missing(entry.path.clone()));
            continue;
        };
        if entry.path == own_path {
            continue;
        }

        match &entry.hash {
            None => issues.push(Issue::Unhashed(entry.path.clone())),
            Some(hash) if !hash.same_content(actual_hash) => {
                issues.push(Issue::HashMismatch(entry.path.clone()));
            }
            Some(_) => {}
        }
        match entry.size {
            Some(recorded) if recorded != *actual_size => issues.push(Issue::SizeMismatch {
                path: entry.path.clone(),
                recorded,
                actual: *actual_size,
            }),
            _ => {}
        }
    }

    for path in files.keys() {
        if !seen.contains_key(path.as_str()) {
            issues.push(Issue::Unrecorded(path.clone()));
        }
    }

    issues.sort();
    issues
}

/// Hash every file under `root/<dir>` for each of `dirs`.
///
/// # Errors
///
/// Returns an error if a directory is missing or a file cannot be read.
pub fn index_tree(root: &Path, dirs: &[&str]) -> Result<FileIndex, RepackError> {
    let mut files = FileIndex::new();
    for dir in dirs {
        let scan = root.join(dir);
        if !scan.is_dir() {
            return Err(RepackError::RepackPrecondition(scan));
        }
        for entry in WalkDir::new(&scan).follow_links(true) {
            let entry = entry.map_err(io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = manifest::record_path(entry.path(), root)?;
            files.insert(path, RecordHash::sha256_file(entry.path())?);
        }
    }
    Ok(files)
}

/// Check `record` against the files under the given top-level directories
/// of `root`.
///
/// # Errors
///
/// Returns [`RepackError::ManifestInconsistency`] listing every issue, or an
/// error if the tree cannot be read.
pub fn verify_tree(
    record: &Record,
    root: &Path,
    dirs: &[&str],
    own_path: &str,
) -> Result<(), RepackError> {
    let files = index_tree(root, dirs)?;
    let issues = check_record(record, &files, own_path);
    if issues.is_empty() {
        Ok(())
    } else {
        Err(RepackError::ManifestInconsistency {
            issues: issues.iter().map(ToString::to_string).collect(),
        })
    }
}

/// Outcome of checking a built archive.
#[derive(Debug, Clone)]
pub struct ArchiveReport {
    /// Path of the manifest inside the archive.
    pub record_path: String,
    /// Number of file entries in the archive.
    pub files: usize,
    /// Problems found; empty when the archive is consistent.
    pub issues: Vec<Issue>,
}

impl ArchiveReport {
    /// Whether the manifest and the archive agree.
    pub fn is_consistent(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Check the `RECORD` of a wheel archive against the archive's entries.
///
/// # Errors
///
/// Returns [`RepackError::ArchiveRead`] if the archive cannot be opened or
/// has no top-level `*.dist-info/RECORD`, or [`RepackError::Record`] if the
/// manifest does not parse.
pub fn verify_archive(path: &Path) -> Result<ArchiveReport, RepackError> {
    let archive_err = |reason: String| RepackError::ArchiveRead {
        path: path.to_path_buf(),
        reason,
    };
    let file = File::open(path).map_err(|e| archive_err(e.to_string()))?;
    let mut archive = ZipArchive::new(file).map_err(|e| archive_err(e.to_string()))?;

    let mut record_path = None;
    let mut files = FileIndex::new();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        if is_manifest_name(&name) {
            record_path = Some(name.clone());
        }
        files.insert(name, RecordHash::sha256_reader(&mut entry)?);
    }

    let record_path =
        record_path.ok_or_else(|| archive_err("no *.dist-info/RECORD entry".to_string()))?;
    let mut text = String::new();
    archive.by_name(&record_path)?.read_to_string(&mut text)?;
    let record = Record::parse(&text).map_err(|source| RepackError::Record {
        path: path.join(&record_path),
        source,
    })?;

    let issues = check_record(&record, &files, &record_path);
    Ok(ArchiveReport {
        record_path,
        files: files.len(),
        issues,
    })
}

fn is_manifest_name(name: &str) -> bool {
    match name.split_once('/') {
        Some((dir, file)) => dir.ends_with(".dist-info") && file == RECORD_FILE,
        None => false,
    }
}
