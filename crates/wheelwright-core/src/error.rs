//! Error types for the repackaging pipeline.

use std::path::PathBuf;

use thiserror::Error;
use wheelwright_schema::{PlatformError, RecordParseError, WheelNameError};

/// A failure while repackaging one platform.
#[derive(Error, Debug)]
pub enum RepackError {
    /// Plain filesystem failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The source archive is unreadable or not a zip container.
    #[error("Cannot read archive {}: {reason}", .path.display())]
    ArchiveRead {
        /// Archive that failed to open.
        path: PathBuf,
        /// Underlying reason.
        reason: String,
    },

    /// The payload destination already existed before the merge.
    #[error("Payload directory {} already exists; the workspace was not reset", .0.display())]
    WorkspaceCollision(PathBuf),

    /// A native or support tree to merge does not exist.
    #[error("Source tree {} does not exist", .0.display())]
    MissingSource(PathBuf),

    /// A recursive directory copy failed.
    #[error("Failed to copy {} into {}: {reason}", .src.display(), .dst.display())]
    Copy {
        /// Tree being copied.
        src: PathBuf,
        /// Destination directory.
        dst: PathBuf,
        /// Underlying reason.
        reason: String,
    },

    /// The `WHEEL` file lacks the generic tag line.
    #[error("'{sentinel}' not found in {}", .path.display())]
    MissingMetadataSentinel {
        /// The metadata file.
        path: PathBuf,
        /// The line that was expected.
        sentinel: String,
    },

    /// The reconciled `RECORD` disagrees with the files on disk.
    #[error("RECORD inconsistent with payload: {}", .issues.join("; "))]
    ManifestInconsistency {
        /// One message per problem found.
        issues: Vec<String>,
    },

    /// A directory or file a stage needs is absent.
    #[error("Precondition failed: {} does not exist", .0.display())]
    RepackPrecondition(PathBuf),

    /// A stage ran before the stage that produces its inputs.
    #[error("Stage '{stage}' requires '{requires}' to run first")]
    StageOrder {
        /// Stage that was attempted.
        stage: &'static str,
        /// Stage that should have run before it.
        requires: &'static str,
    },

    /// An existing `RECORD` file could not be parsed.
    #[error("Invalid RECORD {}: {source}", .path.display())]
    Record {
        /// The manifest file.
        path: PathBuf,
        /// Parse failure.
        #[source]
        source: RecordParseError,
    },

    /// The source archive's filename is not a wheel name.
    #[error(transparent)]
    WheelName(#[from] WheelNameError),

    /// A tag or artifact name could not be parsed.
    #[error(transparent)]
    Platform(#[from] PlatformError),

    /// The zip writer or reader failed.
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

/// A failure of a whole batch.
#[derive(Error, Debug)]
pub enum BatchError {
    /// The source archive's filename is not a wheel name.
    #[error("Invalid source archive: {0}")]
    InvalidSource(#[from] WheelNameError),

    /// The scratch workspace could not be created at all.
    #[error("Failed to prepare workspace {}: {source}", .path.display())]
    Workspace {
        /// Intended workspace root.
        path: PathBuf,
        /// Underlying failure.
        #[source]
        source: std::io::Error,
    },

    /// At least one platform failed; the source archive was kept.
    #[error("{failed} of {total} platform(s) failed to repackage; see the log for details")]
    PlatformsFailed {
        /// Number of failed platforms.
        failed: usize,
        /// Number of platforms attempted.
        total: usize,
    },
}

/// Render an error and its sources on one line, `outer: inner: root`.
///
/// Sources whose text the outer message already embeds are skipped.
pub fn error_chain(err: &dyn std::error::Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !out.contains(&text) {
            out.push_str(": ");
            out.push_str(&text);
        }
        source = cause.source();
    }
    out
}
