//! Wheel filenames.

use std::path::Path;

use crate::platform::{PlatformError, PlatformTag};

/// Errors raised when a wheel filename cannot be parsed.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum WheelNameError {
    /// The name does not end in `.whl`.
    #[error("'{0}' is not a wheel: missing .whl extension")]
    MissingExtension(String),

    /// The stem does not have five or six `-`-separated components.
    #[error("'{0}' is not <name>-<version>[-<build>]-<python>-<abi>-<platform>.whl")]
    Malformed(String),

    /// The trailing three components are not a valid tag.
    #[error(transparent)]
    Tag(#[from] PlatformError),
}

/// A parsed wheel filename,
/// `<name>-<version>[-<build>]-<python>-<abi>-<platform>.whl`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WheelFilename {
    /// Distribution name, e.g. `xspectrampoline`.
    pub name: String,
    /// Distribution version, e.g. `0.1.0`.
    pub version: String,
    /// Optional build tag.
    pub build: Option<String>,
    /// Compatibility tag.
    pub tag: PlatformTag,
}

impl WheelFilename {
    /// Parse the final component of `path`.
    ///
    /// # Errors
    ///
    /// Returns a [`WheelNameError`] if the file name is not a wheel name.
    pub fn from_path(path: &Path) -> Result<Self, WheelNameError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        name.parse()
    }

    /// Name of the dist-info directory inside the wheel.
    pub fn dist_info_dir(&self) -> String {
        format!("{}-{}.dist-info", self.name, self.version)
    }

    /// The same distribution with a different compatibility tag.
    pub fn with_tag(&self, tag: PlatformTag) -> Self {
        Self {
            tag,
            ..self.clone()
        }
    }

    /// Filename without the `.whl` extension.
    pub fn stem(&self) -> String {
        match &self.build {
            Some(build) => format!("{}-{}-{build}-{}", self.name, self.version, self.tag),
            None => format!("{}-{}-{}", self.name, self.version, self.tag),
        }
    }
}

impl std::fmt::Display for WheelFilename {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.whl", self.stem())
    }
}

impl std::str::FromStr for WheelFilename {
    type Err = WheelNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let stem = s
            .strip_suffix(".whl")
            .ok_or_else(|| WheelNameError::MissingExtension(s.to_string()))?;
        let parts: Vec<&str> = stem.split('-').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(WheelNameError::Malformed(s.to_string()));
        }

        let (name, version, build, tag) = match parts.as_slice() {
            [name, version, python, abi, platform] => {
                (*name, *version, None, format!("{python}-{abi}-{platform}"))
            }
            [name, version, build, python, abi, platform] => (
                *name,
                *version,
                Some((*build).to_string()),
                format!("{python}-{abi}-{platform}"),
            ),
            _ => return Err(WheelNameError::Malformed(s.to_string())),
        };

        Ok(Self {
            name: name.to_string(),
            version: version.to_string(),
            build,
            tag: PlatformTag::new(tag)?,
        })
    }
}
