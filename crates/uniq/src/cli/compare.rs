//! The `uniq compare` command.

use clap::Args;
use std::path::PathBuf;

/// Arguments for the `compare` command.
#[derive(Args, Debug)]
pub struct CompareArgs {
    /// First file
    pub a: PathBuf,

    /// Second file
    pub b: PathBuf,
}

/// Print content hashes and perceptual distance of two files as JSON.
pub fn execute(args: CompareArgs) -> anyhow::Result<()> {
    let comparison = uniq_core::hash::compare(&args.a, &args.b)?;
    println!("{}", serde_json::to_string_pretty(&comparison)?);

    if comparison.identical_bytes {
        tracing::warn!("Files are byte-identical");
    }
    Ok(())
}
