//! Build tasks for Astra
//!
//! ## Commands
//!
//! - `xtask version-stamp` - Write `version.json` from the workspace manifest
//!
//! The client polls `version.json` to notice a new deployment.

mod version_stamp;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Build tasks for Astra")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the build version stamp file
    VersionStamp {
        /// Manifest to read the version from
        #[arg(long, default_value = "Cargo.toml")]
        manifest: PathBuf,

        /// Where to write the stamp
        #[arg(long, default_value = "version.json")]
        out: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::VersionStamp { manifest, out } => {
            let stamp = version_stamp::write_stamp(&manifest, &out, chrono::Utc::now())
                .with_context(|| format!("Failed to stamp version from {}", manifest.display()))?;

            println!("Wrote {} (version {})", out.display(), stamp.version);
        }
    }

    Ok(())
}
