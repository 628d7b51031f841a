//! The `uniq exif` command for metadata maintenance.

use clap::{Args, Subcommand};
use std::path::PathBuf;
use uniq_core::metadata;

/// Arguments for the `exif` command.
#[derive(Args, Debug)]
pub struct ExifArgs {
    #[command(subcommand)]
    pub command: ExifCommand,
}

/// Metadata operations.
#[derive(Subcommand, Debug)]
pub enum ExifCommand {
    /// Print the EXIF summary of an image as JSON
    Show { path: PathBuf },

    /// Remove all metadata
    Strip {
        path: PathBuf,

        /// Write the stripped copy here instead of in place
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Copy the EXIF block of one JPEG into another
    Copy {
        source: PathBuf,
        target: PathBuf,

        /// Write the result here instead of overwriting the target
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Replace metadata with synthetic camera provenance
    Randomize { path: PathBuf },
}

/// Execute the exif command.
pub fn execute(args: ExifArgs) -> anyhow::Result<()> {
    match args.command {
        ExifCommand::Show { path } => match metadata::read(&path) {
            Some(summary) => println!("{}", serde_json::to_string_pretty(&summary)?),
            None => anyhow::bail!("No EXIF data in {:?}", path),
        },

        ExifCommand::Strip { path, output } => {
            let output = output.unwrap_or_else(|| path.clone());
            metadata::strip_to(&path, &output)?;
            eprintln!("Metadata stripped: {}", output.display());
        }

        ExifCommand::Copy {
            source,
            target,
            output,
        } => {
            let output = output.unwrap_or_else(|| target.clone());
            metadata::copy(&source, &target, &output)?;
            eprintln!("EXIF copied from {} to {}", source.display(), output.display());
        }

        ExifCommand::Randomize { path } => {
            let meta = metadata::randomize(&path)?;
            tracing::info!("Stamped {:?} as {} {}", path, meta.make, meta.model);
            println!("{}", serde_json::to_string_pretty(&meta)?);
        }
    }

    Ok(())
}
