//! Compatibility tags, platform descriptors and native artifact names.

use serde::{Deserialize, Serialize};

/// The tag a platform-independent wheel declares before repackaging.
pub const GENERIC_TAG: &str = "py3-none-any";

/// Errors raised when a tag or artifact name is malformed.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    /// The tag is not `<python>-<abi>-<platform>`.
    #[error("Invalid compatibility tag '{0}': expected <python>-<abi>-<platform>")]
    InvalidTag(String),

    /// The artifact name is not `<LibraryName>.<version>.<triple>`.
    #[error("Invalid artifact name '{0}': expected <LibraryName>.<version>.<triple>")]
    InvalidArtifactName(String),
}

/// A wheel compatibility tag such as `py3-none-linux_x86_64`.
///
/// Always three non-empty, `-`-separated parts. Compressed tag sets
/// (`py2.py3`) are kept as-is inside their part.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PlatformTag(String);

impl PlatformTag {
    /// Create a validated tag.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::InvalidTag`] unless `s` has exactly three
    /// non-empty `-`-separated parts.
    pub fn new(s: impl Into<String>) -> Result<Self, PlatformError> {
        let s = s.into();
        let parts: Vec<&str> = s.split('-').collect();
        if parts.len() == 3 && parts.iter().all(|p| !p.is_empty() && !p.contains(char::is_whitespace)) {
            Ok(Self(s))
        } else {
            Err(PlatformError::InvalidTag(s))
        }
    }

    /// The generic `py3-none-any` tag.
    pub fn generic() -> Self {
        Self(GENERIC_TAG.to_string())
    }

    /// The tag as written in filenames and `WHEEL` metadata.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn part(&self, idx: usize) -> &str {
        self.0.split('-').nth(idx).unwrap_or_default()
    }

    /// Python tag, e.g. `py3`.
    pub fn python(&self) -> &str {
        self.part(0)
    }

    /// ABI tag, e.g. `none`.
    pub fn abi(&self) -> &str {
        self.part(1)
    }

    /// Platform tag, e.g. `linux_x86_64`.
    pub fn platform(&self) -> &str {
        self.part(2)
    }

    /// Whether this is the platform-independent `any` tag.
    pub fn is_generic(&self) -> bool {
        self.platform() == "any"
    }
}

impl std::fmt::Display for PlatformTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for PlatformTag {
    type Err = PlatformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for PlatformTag {
    type Error = PlatformError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<PlatformTag> for String {
    fn from(tag: PlatformTag) -> Self {
        tag.0
    }
}

impl AsRef<str> for PlatformTag {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// One packaging target: the tag to stamp and the artifact trees to inject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformDescriptor {
    /// Compatibility tag of the wheel produced for this target.
    pub tag: PlatformTag,
    /// Directory name of the native library tree under the artifacts root.
    pub native: String,
    /// Directory name of the support library tree under the artifacts root.
    pub support: String,
}

/// A native artifact directory name, `<LibraryName>.<version>.<triple>`.
///
/// For example `LibXSPEC.v6.35.1.x86_64-linux-gnu-libgfortran5` splits into
/// library `LibXSPEC`, version `v6.35.1` and triple
/// `x86_64-linux-gnu-libgfortran5`. The triple never contains a dot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactName {
    /// Library name, e.g. `LibXSPEC`.
    pub library: String,
    /// Version string including any leading `v`.
    pub version: String,
    /// Target triple plus ABI suffixes.
    pub triple: String,
}

impl ArtifactName {
    /// Name of the directory the payload is installed under inside the package.
    ///
    /// `LibXSPEC.v6.35.1.<triple>` becomes `LibXSPEC_v6_35_1`.
    pub fn library_dir_name(&self) -> String {
        format!("{}_{}", self.library, self.version.replace('.', "_"))
    }
}

impl std::str::FromStr for ArtifactName {
    type Err = PlatformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || PlatformError::InvalidArtifactName(s.to_string());
        let (library, rest) = s.split_once('.').ok_or_else(invalid)?;
        let (version, triple) = rest.rsplit_once('.').ok_or_else(invalid)?;
        if library.is_empty() || version.is_empty() || triple.is_empty() {
            return Err(invalid());
        }
        Ok(Self {
            library: library.to_string(),
            version: version.to_string(),
            triple: triple.to_string(),
        })
    }
}

impl std::fmt::Display for ArtifactName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.library, self.version, self.triple)
    }
}
