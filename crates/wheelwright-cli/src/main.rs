//! `wheelwright` - repackage a pure-Python wheel into platform wheels.
//!
//! Logs go to stderr; `RUST_LOG` overrides the default level.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod cmd;

#[derive(Parser)]
#[command(name = "wheelwright", version)]
#[command(about = "Repackage a py3-none-any wheel with native payloads, one wheel per platform", long_about = None)]
struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build one platform wheel per configured platform
    Repack {
        /// Source wheel tagged py3-none-any
        wheel: PathBuf,
        /// Configuration file
        #[arg(short, long, default_value = "wheelwright.toml")]
        config: PathBuf,
        /// Write wheels here instead of the configured output directory
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
        /// Fixed Unix timestamp for every archive entry
        #[arg(long, env = "SOURCE_DATE_EPOCH")]
        source_date_epoch: Option<i64>,
    },
    /// Check that each wheel's RECORD matches its contents
    Verify {
        /// Wheels to check
        #[arg(required = true)]
        wheels: Vec<PathBuf>,
    },
    /// Print RECORD lines for every file under a directory
    Record {
        /// Directory to hash
        dir: PathBuf,
        /// Root the printed paths are relative to (default: parent of DIR)
        #[arg(long)]
        root: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Repack {
            wheel,
            config,
            output_dir,
            source_date_epoch,
        } => cmd::repack::repack(&wheel, &config, output_dir, source_date_epoch),
        Commands::Verify { wheels } => cmd::verify::verify(&wheels),
        Commands::Record { dir, root } => cmd::record::record(&dir, root.as_deref()),
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
