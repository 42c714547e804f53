//! `wheelwright record`

use anyhow::{Context, Result};
use std::path::Path;
use wheelwright_core::manifest;
use wheelwright_schema::Record;

/// Print one `RECORD` line per file under `dir`.
pub(crate) fn record(dir: &Path, root: Option<&Path>) -> Result<()> {
    let dir = dir
        .canonicalize()
        .with_context(|| format!("Failed to resolve {}", dir.display()))?;
    let root = match root {
        Some(root) => root
            .canonicalize()
            .with_context(|| format!("Failed to resolve {}", root.display()))?,
        None => dir.parent().unwrap_or(&dir).to_path_buf(),
    };

    let record: Record = manifest::build_entries(&dir, &root)?.into_iter().collect();
    if !record.is_empty() {
        println!("{record}");
    }
    Ok(())
}
