//! `wheelwright verify`

use anyhow::{Context, Result, bail};
use std::path::PathBuf;
use wheelwright_core::verify::verify_archive;

/// Check every wheel, listing the problems of each inconsistent one.
pub(crate) fn verify(wheels: &[PathBuf]) -> Result<()> {
    let mut failed = 0;
    for wheel in wheels {
        let report = verify_archive(wheel)
            .with_context(|| format!("Failed to check {}", wheel.display()))?;
        if report.is_consistent() {
            println!("ok    {} ({} files)", wheel.display(), report.files);
            continue;
        }
        failed += 1;
        println!("FAIL  {}", wheel.display());
        for issue in &report.issues {
            println!("      {issue}");
        }
    }

    if failed > 0 {
        bail!("{failed} of {} wheel(s) failed verification", wheels.len());
    }
    Ok(())
}
