//! Rewriting the compatibility tag in the dist-info `WHEEL` file.

use std::fs;
use std::path::Path;

use wheelwright_schema::{GENERIC_TAG, PlatformTag};

use crate::error::RepackError;

/// Prefix of the tag declaration line in `WHEEL`.
const TAG_PREFIX: &str = "Tag: ";

/// The generic tag line, `Tag: py3-none-any`.
pub fn sentinel_line() -> String {
    format!("{TAG_PREFIX}{GENERIC_TAG}")
}

/// Replace the generic tag line in `text` with one declaring `tag`.
///
/// Every other line, including its line ending, is returned unchanged.
/// Returns `None` when the generic tag line is absent.
pub fn rewrite_tag_text(text: &str, tag: &PlatformTag) -> Option<String> {
    let sentinel = sentinel_line();
    let replacement = format!("{TAG_PREFIX}{tag}");
    let mut out = String::with_capacity(text.len() + replacement.len());
    let mut replaced = 0usize;

    for line in text.split_inclusive('\n') {
        let body = line.trim_end_matches(['\r', '\n']);
        if body == sentinel {
            out.push_str(&replacement);
            out.push_str(&line[body.len()..]);
            replaced += 1;
        } else {
            out.push_str(line);
        }
    }

    (replaced > 0).then_some(out)
}

/// Rewrite the `WHEEL` file at `path` in place to declare `tag`.
///
/// # Errors
///
/// Returns [`RepackError::RepackPrecondition`] if the file does not exist,
/// [`RepackError::MissingMetadataSentinel`] if it has no generic tag line,
/// or an I/O error.
pub fn rewrite_tag(path: &Path, tag: &PlatformTag) -> Result<(), RepackError> {
    if !path.is_file() {
        return Err(RepackError::RepackPrecondition(path.to_path_buf()));
    }
    let text = fs::read_to_string(path)?;
    let rewritten =
        rewrite_tag_text(&text, tag).ok_or_else(|| RepackError::MissingMetadataSentinel {
            path: path.to_path_buf(),
            sentinel: sentinel_line(),
        })?;
    fs::write(path, rewritten)?;
    tracing::debug!(path = %path.display(), %tag, "rewrote compatibility tag");
    Ok(())
}
