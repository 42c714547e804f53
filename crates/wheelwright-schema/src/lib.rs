//! Shared types for wheelwright.
//!
//! Everything here is pure data plus the text formats that go with it: the
//! wheel `RECORD` manifest, content digests, wheel filenames, compatibility
//! tags and the names of native artifact trees. No filesystem walking or
//! archive handling lives in this crate.

pub mod hash;
pub mod platform;
pub mod record;
pub mod wheel;

// Re-exports
pub use hash::*;
pub use platform::*;
pub use record::*;
pub use wheel::*;

/// File name of the integrity manifest inside a dist-info directory.
pub const RECORD_FILE: &str = "RECORD";

/// File name of the metadata file that declares the compatibility tag.
pub const WHEEL_FILE: &str = "WHEEL";
