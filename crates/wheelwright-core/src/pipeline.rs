//! The batch driver.
//!
//! Each platform is repackaged from a freshly reset workspace by running
//! the stages in [`Stage::ORDER`]. A stage refuses to run before the stage
//! that produces its inputs. A failed platform is reported and skipped; the
//! source archive is deleted only when every platform succeeded.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use wheelwright_schema::{PlatformDescriptor, PlatformTag, Record, WHEEL_FILE, WheelFilename};

use crate::config::RepackConfig;
use crate::error::{BatchError, RepackError};
use crate::io::extract;
use crate::reporter::Reporter;
use crate::workspace::Workspace;
use crate::{manifest, metadata, payload, reconcile, repack, verify};

/// One step of a platform run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Stage the source archive in the workspace and unpack it.
    Extract,
    /// Copy the native and support trees into the package.
    MergePayload,
    /// Stamp the platform tag into `WHEEL`.
    RewriteTag,
    /// Hash the payload and rewrite `RECORD`.
    Reconcile,
    /// Check `RECORD` against the files that will be archived.
    Verify,
    /// Zip the result into the output directory.
    Repack,
}

impl Stage {
    /// Every stage, in execution order.
    pub const ORDER: [Stage; 6] = [
        Stage::Extract,
        Stage::MergePayload,
        Stage::RewriteTag,
        Stage::Reconcile,
        Stage::Verify,
        Stage::Repack,
    ];

    /// Short lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Extract => "extract",
            Stage::MergePayload => "merge-payload",
            Stage::RewriteTag => "rewrite-tag",
            Stage::Reconcile => "reconcile",
            Stage::Verify => "verify",
            Stage::Repack => "repack",
        }
    }

    /// The stage that must have completed immediately before this one.
    pub fn previous(self) -> Option<Stage> {
        let index = Self::ORDER.iter().position(|s| *s == self)?;
        index.checked_sub(1).map(|i| Self::ORDER[i])
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A platform wheel that was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformOutcome {
    /// Tag of the platform.
    pub tag: PlatformTag,
    /// Final archive path in the output directory.
    pub archive: PathBuf,
}

/// Result of a fully successful batch.
#[derive(Debug, Clone)]
pub struct BatchReport {
    /// One outcome per platform, in configuration order.
    pub outcomes: Vec<PlatformOutcome>,
    /// Wall time of the batch.
    pub elapsed: Duration,
}

impl BatchReport {
    /// Archive paths, in configuration order.
    pub fn archives(&self) -> impl Iterator<Item = &Path> {
        self.outcomes.iter().map(|o| o.archive.as_path())
    }
}

/// State carried between the stages of one platform run.
struct PlatformRun<'a> {
    config: &'a RepackConfig,
    platform: &'a PlatformDescriptor,
    wheel: &'a WheelFilename,
    source: &'a Path,
    root: &'a Path,
    dist_info: String,
    completed: Option<Stage>,
    payload_dir: Option<PathBuf>,
    record: Option<Record>,
    archive: Option<PathBuf>,
}

impl<'a> PlatformRun<'a> {
    fn new(
        config: &'a RepackConfig,
        platform: &'a PlatformDescriptor,
        wheel: &'a WheelFilename,
        source: &'a Path,
        root: &'a Path,
    ) -> Self {
        Self {
            config,
            platform,
            wheel,
            source,
            root,
            dist_info: wheel.dist_info_dir(),
            completed: None,
            payload_dir: None,
            record: None,
            archive: None,
        }
    }

    fn ensure_order(&self, stage: Stage) -> Result<(), RepackError> {
        let required = stage.previous();
        if self.completed == required {
            return Ok(());
        }
        Err(RepackError::StageOrder {
            stage: stage.as_str(),
            requires: required.map_or("a fresh workspace", Stage::as_str),
        })
    }

    fn archived_dirs(&self) -> [&str; 2] {
        [self.dist_info.as_str(), self.config.package.as_str()]
    }

    fn run_stage(&mut self, stage: Stage) -> Result<(), RepackError> {
        self.ensure_order(stage)?;
        match stage {
            Stage::Extract => {
                let staged = extract::stage_archive(self.source, self.root)?;
                let files = extract::extract_zip(&staged, self.root)?;
                tracing::debug!(archive = %staged.display(), files = files.len(), "extracted source wheel");
            }
            Stage::MergePayload => {
                let layout = self.config.layout_for(self.platform)?;
                let dest = payload::merge_payload(
                    self.root,
                    &layout,
                    &self.config.native_dir(self.platform),
                    &self.config.support_dir(self.platform),
                )?;
                self.payload_dir = Some(dest);
            }
            Stage::RewriteTag => {
                let wheel_file = self.root.join(&self.dist_info).join(WHEEL_FILE);
                metadata::rewrite_tag(&wheel_file, &self.platform.tag)?;
            }
            Stage::Reconcile => {
                let payload_dir = self.payload_dir.as_deref().ok_or(RepackError::StageOrder {
                    stage: stage.as_str(),
                    requires: Stage::MergePayload.as_str(),
                })?;
                let entries = manifest::build_entries(payload_dir, self.root)?;
                let record = reconcile::reconcile_in_place(self.root, &self.dist_info, entries)?;
                self.record = Some(record);
            }
            Stage::Verify => {
                let record = self.record.as_ref().ok_or(RepackError::StageOrder {
                    stage: stage.as_str(),
                    requires: Stage::Reconcile.as_str(),
                })?;
                verify::verify_tree(
                    record,
                    self.root,
                    &self.archived_dirs(),
                    &reconcile::record_key(&self.dist_info),
                )?;
            }
            Stage::Repack => {
                let stem = self.wheel.with_tag(self.platform.tag.clone()).stem();
                let archive = repack::repack(
                    self.root,
                    &stem,
                    &self.archived_dirs(),
                    &self.config.output_dir,
                    self.config.timestamp_policy(),
                )?;
                self.archive = Some(archive);
            }
        }
        self.completed = Some(stage);
        Ok(())
    }
}

/// Runs a batch of platforms against one source wheel.
#[derive(Debug)]
pub struct Pipeline<'a, R: Reporter> {
    config: &'a RepackConfig,
    reporter: &'a R,
}

impl<'a, R: Reporter> Pipeline<'a, R> {
    /// Create a driver for `config`, reporting progress to `reporter`.
    pub fn new(config: &'a RepackConfig, reporter: &'a R) -> Self {
        Self { config, reporter }
    }

    /// Repackage `source` once per configured platform.
    ///
    /// Failures of individual platforms are reported and do not stop the
    /// batch. The source archive is deleted only if every platform
    /// succeeded.
    ///
    /// # Errors
    ///
    /// - [`BatchError::InvalidSource`] if `source` is not a wheel filename.
    /// - [`BatchError::Workspace`] if the workspace cannot be created.
    /// - [`BatchError::PlatformsFailed`] if any platform failed.
    pub fn run(&self, source: &Path) -> Result<BatchReport, BatchError> {
        let started = Instant::now();
        let wheel = WheelFilename::from_path(source)?;
        if !wheel.tag.is_generic() {
            tracing::warn!(tag = %wheel.tag, "source wheel is not tagged py3-none-any");
        }

        let workspace = self.open_workspace()?;
        let total = self.config.platforms.len();
        let mut outcomes = Vec::with_capacity(total);

        for (index, platform) in self.config.platforms.iter().enumerate() {
            self.reporter.platform_started(&platform.tag, index, total);
            let result = workspace
                .reset()
                .map_err(RepackError::from)
                .and_then(|()| self.run_platform(source, &wheel, platform, workspace.root()));
            match result {
                Ok(archive) => {
                    self.reporter.platform_done(&platform.tag, &archive);
                    outcomes.push(PlatformOutcome {
                        tag: platform.tag.clone(),
                        archive,
                    });
                }
                Err(e) => self.reporter.platform_failed(&platform.tag, &e),
            }
        }

        drop(workspace);
        let elapsed = started.elapsed();
        let succeeded = outcomes.len();
        let failed = total - succeeded;
        self.reporter
            .summary(succeeded, failed, elapsed.as_secs_f64());

        if failed > 0 {
            tracing::info!(source = %source.display(), "keeping source wheel after failures");
            return Err(BatchError::PlatformsFailed { failed, total });
        }

        if outcomes.iter().any(|o| same_path(&o.archive, source)) {
            tracing::warn!(source = %source.display(), "an output replaced the source wheel; not removing it");
        } else {
            remove_source(source);
        }
        Ok(BatchReport { outcomes, elapsed })
    }

    /// Run every stage for one platform in a workspace rooted at `root`,
    /// which must be empty. Returns the final archive path.
    ///
    /// # Errors
    ///
    /// Returns the first stage failure.
    pub fn run_platform(
        &self,
        source: &Path,
        wheel: &WheelFilename,
        platform: &PlatformDescriptor,
        root: &Path,
    ) -> Result<PathBuf, RepackError> {
        let mut run = PlatformRun::new(self.config, platform, wheel, source, root);
        for stage in Stage::ORDER {
            self.reporter.stage(&platform.tag, stage);
            run.run_stage(stage)?;
        }
        run.archive
            .ok_or(RepackError::StageOrder {
                stage: "finish",
                requires: Stage::Repack.as_str(),
            })
    }

    fn open_workspace(&self) -> Result<Workspace, BatchError> {
        match &self.config.workspace_dir {
            Some(dir) => Workspace::at(dir).map_err(|source| BatchError::Workspace {
                path: dir.clone(),
                source,
            }),
            None => Workspace::temporary().map_err(|source| BatchError::Workspace {
                path: std::env::temp_dir(),
                source,
            }),
        }
    }
}

fn same_path(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

fn remove_source(source: &Path) {
    match fs::remove_file(source) {
        Ok(()) => tracing::info!(source = %source.display(), "removed source wheel"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(source = %source.display(), error = %e, "failed to remove source wheel");
        }
    }
}
