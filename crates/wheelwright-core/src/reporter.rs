//! Reporter trait for dependency injection
//!
//! The pipeline reports progress through this trait so that it is not
//! coupled to any particular output. The CLI logs through [`LogReporter`];
//! tests either ignore progress with [`NullReporter`] or record it.

use std::path::Path;

use wheelwright_schema::PlatformTag;

use crate::error::{RepackError, error_chain};
use crate::pipeline::Stage;

/// Receives progress events from a batch run.
pub trait Reporter: Send + Sync {
    /// A platform run is starting. `index` is zero-based.
    fn platform_started(&self, tag: &PlatformTag, index: usize, total: usize);

    /// A stage of the current platform run is starting.
    fn stage(&self, tag: &PlatformTag, stage: Stage);

    /// A platform archive was written to `archive`.
    fn platform_done(&self, tag: &PlatformTag, archive: &Path);

    /// A platform run failed. The batch continues with the next platform.
    fn platform_failed(&self, tag: &PlatformTag, error: &RepackError);

    /// The batch finished.
    fn summary(&self, succeeded: usize, failed: usize, elapsed_secs: f64);
}

impl<T: Reporter + ?Sized> Reporter for std::sync::Arc<T> {
    fn platform_started(&self, tag: &PlatformTag, index: usize, total: usize) {
        (**self).platform_started(tag, index, total);
    }
    fn stage(&self, tag: &PlatformTag, stage: Stage) {
        (**self).stage(tag, stage);
    }
    fn platform_done(&self, tag: &PlatformTag, archive: &Path) {
        (**self).platform_done(tag, archive);
    }
    fn platform_failed(&self, tag: &PlatformTag, error: &RepackError) {
        (**self).platform_failed(tag, error);
    }
    fn summary(&self, succeeded: usize, failed: usize, elapsed_secs: f64) {
        (**self).summary(succeeded, failed, elapsed_secs);
    }
}

/// A reporter that discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn platform_started(&self, _tag: &PlatformTag, _index: usize, _total: usize) {}
    fn stage(&self, _tag: &PlatformTag, _stage: Stage) {}
    fn platform_done(&self, _tag: &PlatformTag, _archive: &Path) {}
    fn platform_failed(&self, _tag: &PlatformTag, _error: &RepackError) {}
    fn summary(&self, _succeeded: usize, _failed: usize, _elapsed_secs: f64) {}
}

/// A reporter that forwards events to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn platform_started(&self, tag: &PlatformTag, index: usize, total: usize) {
        tracing::info!(%tag, "repackaging platform {}/{}", index + 1, total);
    }

    fn stage(&self, tag: &PlatformTag, stage: Stage) {
        tracing::debug!(%tag, %stage, "stage");
    }

    fn platform_done(&self, tag: &PlatformTag, archive: &Path) {
        tracing::info!(%tag, archive = %archive.display(), "wrote platform wheel");
    }

    fn platform_failed(&self, tag: &PlatformTag, error: &RepackError) {
        tracing::error!(%tag, "platform failed: {}", error_chain(error));
    }

    fn summary(&self, succeeded: usize, failed: usize, elapsed_secs: f64) {
        if failed == 0 {
            tracing::info!("repackaged {succeeded} platform(s) in {elapsed_secs:.2}s");
        } else {
            tracing::warn!(
                "{failed} of {} platform(s) failed after {elapsed_secs:.2}s",
                succeeded + failed
            );
        }
    }
}
