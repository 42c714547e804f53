//! Batch configuration parsed from a `wheelwright.toml` file.
//!
//! ```toml
//! package = "xspectrampoline"
//! artifacts_dir = "artifacts"
//! output_dir = "dist"
//!
//! [[platform]]
//! tag = "py3-none-linux_x86_64"
//! native = "LibXSPEC.v6.35.1.x86_64-linux-gnu-libgfortran5"
//! support = "CompilerSupportLibraries.v1.1.1.x86_64-linux-gnu-libgfortran5"
//! ```
//!
//! Relative paths are resolved against the directory holding the file.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use wheelwright_schema::{ArtifactName, PlatformDescriptor, PlatformError};

use crate::payload::PayloadLayout;
use crate::repack::TimestampPolicy;

/// Errors raised while loading a configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        /// Configuration file path.
        path: PathBuf,
        /// Underlying failure.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML for this schema.
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// The file parsed but describes an unusable batch.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Everything a batch run needs besides the source archive.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepackConfig {
    /// Top-level package directory inside the wheel.
    pub package: String,

    /// Payload directory name inside the package. Derived from each
    /// platform's native artifact name when absent.
    #[serde(default)]
    pub library_dir: Option<String>,

    /// Directory holding the native and support artifact trees.
    #[serde(default = "default_artifacts_dir")]
    pub artifacts_dir: PathBuf,

    /// Directory the platform wheels are written to.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Fixed scratch directory; a temporary one is used when absent.
    #[serde(default)]
    pub workspace_dir: Option<PathBuf>,

    /// Support tree subdirectories merged into the payload.
    #[serde(default = "default_support_subdirs")]
    pub support_subdirs: Vec<String>,

    /// Fixed timestamp for every archive entry.
    #[serde(default)]
    pub source_date_epoch: Option<i64>,

    /// Targets, processed in order.
    #[serde(default, rename = "platform")]
    pub platforms: Vec<PlatformDescriptor>,
}

fn default_artifacts_dir() -> PathBuf {
    PathBuf::from("artifacts")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("dist")
}

fn default_support_subdirs() -> Vec<String> {
    vec!["lib".to_string(), "share".to_string()]
}

impl RepackConfig {
    /// A configuration with defaults for everything but the package name
    /// and targets.
    pub fn new(package: impl Into<String>, platforms: Vec<PlatformDescriptor>) -> Self {
        Self {
            package: package.into(),
            library_dir: None,
            artifacts_dir: default_artifacts_dir(),
            output_dir: default_output_dir(),
            workspace_dir: None,
            support_subdirs: default_support_subdirs(),
            source_date_epoch: None,
            platforms,
        }
    }

    /// Load, resolve and validate a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read, parsed or
    /// validated.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml(&text)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        tracing::debug!(path = %path.display(), platforms = config.platforms.len(), "loaded configuration");
        Ok(config)
    }

    /// Parse and validate configuration text. Paths are left as written.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the text cannot be parsed or validated.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Join relative paths onto `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        for path in [&mut self.artifacts_dir, &mut self.output_dir] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
        if let Some(dir) = self.workspace_dir.as_mut().filter(|d| d.is_relative()) {
            *dir = base.join(&*dir);
        }
    }

    /// Check the batch is usable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_single_component(&self.package) {
            return Err(ConfigError::Invalid(format!(
                "package '{}' must be a single directory name",
                self.package
            )));
        }
        if let Some(dir) = self.library_dir.as_deref().filter(|d| !is_single_component(d)) {
            return Err(ConfigError::Invalid(format!(
                "library_dir '{dir}' must be a single directory name"
            )));
        }
        if self.platforms.is_empty() {
            return Err(ConfigError::Invalid("no [[platform]] entries".to_string()));
        }

        let mut seen = HashSet::new();
        for platform in &self.platforms {
            if !seen.insert(&platform.tag) {
                return Err(ConfigError::Invalid(format!(
                    "platform tag '{}' appears more than once",
                    platform.tag
                )));
            }
            if platform.tag.is_generic() {
                return Err(ConfigError::Invalid(format!(
                    "platform tag '{}' is the generic tag; each platform needs its own",
                    platform.tag
                )));
            }
            if platform.native.is_empty() || platform.support.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "platform '{}' needs both native and support artifacts",
                    platform.tag
                )));
            }
            if self.library_dir.is_none() {
                platform.native.parse::<ArtifactName>().map_err(|e| {
                    ConfigError::Invalid(format!(
                        "{e}; set library_dir to name the payload directory explicitly"
                    ))
                })?;
            }
        }
        Ok(())
    }

    /// Timestamp policy for archive entries.
    pub fn timestamp_policy(&self) -> TimestampPolicy {
        self.source_date_epoch
            .map_or(TimestampPolicy::Clamp, TimestampPolicy::Fixed)
    }

    /// Payload directory name for `platform`.
    ///
    /// # Errors
    ///
    /// Returns an error if no `library_dir` is configured and the native
    /// artifact name cannot be parsed.
    pub fn library_dir_for(&self, platform: &PlatformDescriptor) -> Result<String, PlatformError> {
        match &self.library_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(platform.native.parse::<ArtifactName>()?.library_dir_name()),
        }
    }

    /// Payload layout for `platform`.
    ///
    /// # Errors
    ///
    /// Same as [`Self::library_dir_for`].
    pub fn layout_for(&self, platform: &PlatformDescriptor) -> Result<PayloadLayout, PlatformError> {
        Ok(PayloadLayout {
            package: self.package.clone(),
            library_dir: self.library_dir_for(platform)?,
            support_subdirs: self.support_subdirs.clone(),
        })
    }

    /// Native artifact tree for `platform`.
    pub fn native_dir(&self, platform: &PlatformDescriptor) -> PathBuf {
        self.artifacts_dir.join(&platform.native)
    }

    /// Support artifact tree for `platform`.
    pub fn support_dir(&self, platform: &PlatformDescriptor) -> PathBuf {
        self.artifacts_dir.join(&platform.support)
    }
}

fn is_single_component(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}
