//! Merging native artifact trees into the extracted package.
//!
//! The native library tree is copied whole to
//! `<workspace>/<package>/<library_dir>`. Selected subdirectories of the
//! support library tree (`lib` and `share` by default) are then merged on top
//! of it. Merging never deletes anything; a support file with the same name
//! as a native file replaces it.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::RepackError;

/// Where the payload goes inside the workspace and what gets merged into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadLayout {
    /// Top-level package directory, e.g. `xspectrampoline`.
    pub package: String,
    /// Payload directory inside the package, e.g. `LibXSPEC_v6_35_1`.
    pub library_dir: String,
    /// Subdirectories of the support tree merged into the payload.
    pub support_subdirs: Vec<String>,
}

impl PayloadLayout {
    /// Payload directory relative to the workspace root.
    pub fn relative_dir(&self) -> PathBuf {
        Path::new(&self.package).join(&self.library_dir)
    }

    /// Absolute payload directory for a workspace rooted at `root`.
    pub fn destination(&self, root: &Path) -> PathBuf {
        root.join(self.relative_dir())
    }
}

/// Copy `native` and the configured subdirectories of `support` into the
/// payload directory, returning that directory.
///
/// # Errors
///
/// - [`RepackError::WorkspaceCollision`] if the payload directory exists.
/// - [`RepackError::MissingSource`] if `native` or a support subdirectory
///   is absent.
/// - [`RepackError::Copy`] if a recursive copy fails.
pub fn merge_payload(
    root: &Path,
    layout: &PayloadLayout,
    native: &Path,
    support: &Path,
) -> Result<PathBuf, RepackError> {
    let dest = layout.destination(root);
    if dest.exists() {
        return Err(RepackError::WorkspaceCollision(dest));
    }
    if !native.is_dir() {
        return Err(RepackError::MissingSource(native.to_path_buf()));
    }

    fs::create_dir_all(root.join(&layout.package))?;
    let copied = copy_tree(native, &dest)?;
    tracing::debug!(src = %native.display(), dest = %dest.display(), bytes = copied, "copied native tree");

    for subdir in &layout.support_subdirs {
        let src = support.join(subdir);
        if !src.is_dir() {
            return Err(RepackError::MissingSource(src));
        }
        let copied = copy_tree(&src, &dest.join(subdir))?;
        tracing::debug!(src = %src.display(), bytes = copied, "merged support subdirectory");
    }

    Ok(dest)
}

/// Recursively copy the contents of `src` into `dst`, creating `dst` if
/// needed and overwriting files that already exist there.
fn copy_tree(src: &Path, dst: &Path) -> Result<u64, RepackError> {
    fs_extra::dir::copy(
        src,
        dst,
        &fs_extra::dir::CopyOptions::new()
            .content_only(true)
            .copy_inside(true)
            .overwrite(true),
    )
    .map_err(|e| RepackError::Copy {
        src: src.to_path_buf(),
        dst: dst.to_path_buf(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn layout() -> PayloadLayout {
        PayloadLayout {
            package: "xspectrampoline".to_string(),
            library_dir: "LibXSPEC_v6_35_1".to_string(),
            support_subdirs: vec!["lib".to_string(), "share".to_string()],
        }
    }

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_merge_native_then_support() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("ws");
        let native = dir.path().join("LibXSPEC.v6.35.1.x86_64-linux-gnu-libgfortran5");
        let support = dir.path().join("CompilerSupportLibraries.v1.1.1.x86_64-linux-gnu");

        write(&native.join("lib/libXS.so"), "native-xs");
        write(&native.join("lib/libgfortran.so.5"), "native-gfortran");
        write(&native.join("spectral/modelData/a.dat"), "data");
        write(&support.join("lib/libgfortran.so.5"), "support-gfortran");
        write(&support.join("share/licenses/GPL"), "license");
        write(&support.join("include/ignored.h"), "not merged");

        let dest = merge_payload(&root, &layout(), &native, &support).unwrap();

        assert_eq!(dest, root.join("xspectrampoline/LibXSPEC_v6_35_1"));
        assert_eq!(fs::read_to_string(dest.join("lib/libXS.so")).unwrap(), "native-xs");
        // Support merge wins on collisions
        assert_eq!(
            fs::read_to_string(dest.join("lib/libgfortran.so.5")).unwrap(),
            "support-gfortran"
        );
        assert!(dest.join("spectral/modelData/a.dat").exists());
        assert!(dest.join("share/licenses/GPL").exists());
        assert!(!dest.join("include").exists());
    }

    #[test]
    fn test_stale_payload_is_a_collision() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("ws");
        fs::create_dir_all(root.join("xspectrampoline/LibXSPEC_v6_35_1")).unwrap();
        let native = dir.path().join("native");
        fs::create_dir_all(&native).unwrap();

        let err = merge_payload(&root, &layout(), &native, dir.path()).unwrap_err();
        assert!(matches!(err, RepackError::WorkspaceCollision(_)));
    }

    #[test]
    fn test_missing_sources_are_reported() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("ws");
        fs::create_dir_all(&root).unwrap();

        let err = merge_payload(&root, &layout(), &dir.path().join("absent"), dir.path())
            .unwrap_err();
        assert!(matches!(err, RepackError::MissingSource(_)));

        let native = dir.path().join("native");
        write(&native.join("lib/libXS.so"), "x");
        let support = dir.path().join("support");
        write(&support.join("lib/libquadmath.so"), "q");
        let err = merge_payload(&root, &layout(), &native, &support).unwrap_err();
        match err {
            RepackError::MissingSource(path) => assert_eq!(path, support.join("share")),
            other => panic!("unexpected error: {other}"),
        }
    }
}
