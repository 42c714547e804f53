//! `wheelwright repack`

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use wheelwright_core::{LogReporter, Pipeline, RepackConfig};

/// Run the configured batch against `wheel`, printing each archive written.
pub(crate) fn repack(
    wheel: &Path,
    config_path: &Path,
    output_dir: Option<PathBuf>,
    source_date_epoch: Option<i64>,
) -> Result<()> {
    let mut config = RepackConfig::load(config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;
    if let Some(dir) = output_dir {
        config.output_dir = dir;
    }
    if source_date_epoch.is_some() {
        config.source_date_epoch = source_date_epoch;
    }
    tracing::debug!(
        output_dir = %config.output_dir.display(),
        platforms = config.platforms.len(),
        "starting batch"
    );

    let report = Pipeline::new(&config, &LogReporter).run(wheel)?;
    for archive in report.archives() {
        println!("{}", archive.display());
    }
    Ok(())
}
