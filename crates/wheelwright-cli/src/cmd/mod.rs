//! Subcommand implementations.

pub(crate) mod record;
pub(crate) mod repack;
pub(crate) mod verify;
