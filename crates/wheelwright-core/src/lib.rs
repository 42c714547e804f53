//! Core library for wheelwright.
//!
//! Turns a platform-independent (`py3-none-any`) wheel into one wheel per
//! target platform: the source archive is unpacked into a scratch
//! [`Workspace`], a native library tree is merged into the package, the
//! `WHEEL` tag is rewritten, `RECORD` is reconciled and checked, and the
//! result is zipped into the output directory. [`Pipeline`] drives the
//! stages for every platform in a [`RepackConfig`].

pub mod config;
pub mod error;
pub mod io;
pub mod manifest;
pub mod metadata;
pub mod payload;
pub mod pipeline;
pub mod reconcile;
pub mod repack;
pub mod reporter;
pub mod verify;
pub mod workspace;

// Re-exports
pub use config::{ConfigError, RepackConfig};
pub use error::{BatchError, RepackError, error_chain};
pub use payload::PayloadLayout;
pub use pipeline::{BatchReport, Pipeline, PlatformOutcome, Stage};
pub use repack::TimestampPolicy;
pub use reporter::{LogReporter, NullReporter, Reporter};
pub use verify::{ArchiveReport, Issue};
pub use workspace::Workspace;
