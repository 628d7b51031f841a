//! The `uniq config` command.

use clap::{Args, Subcommand};
use std::path::{Path, PathBuf};
use uniq_core::Config;

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the effective configuration as TOML
    Show,

    /// Print the config file location
    Path,

    /// Write a config file populated with defaults
    Init {
        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },

    /// Parse and range-check a config file without using it
    Check {
        /// File to check (defaults to the active config location)
        file: Option<PathBuf>,
    },
}

/// `explicit` is the global `--config` path, if one was given.
pub fn execute(args: ConfigArgs, config: &Config, explicit: Option<&Path>) -> anyhow::Result<()> {
    let location = explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(Config::default_path);

    match args.command {
        ConfigCommand::Show => {
            let source = if location.exists() {
                location.display().to_string()
            } else {
                "built-in defaults".to_string()
            };
            println!("# source: {source}\n{}", config.to_toml()?);
        }
        ConfigCommand::Path => println!("{}", location.display()),
        ConfigCommand::Init { force } => init(&location, force)?,
        ConfigCommand::Check { file } => {
            let file = file.unwrap_or(location);
            Config::load_from(&file)?;
            println!("{}: ok", file.display());
        }
    }
    Ok(())
}

fn init(location: &Path, force: bool) -> anyhow::Result<()> {
    if location.exists() && !force {
        anyhow::bail!(
            "{} already exists.\n\n  Hint: pass --force to overwrite it.",
            location.display()
        );
    }
    if let Some(parent) = location.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(location, Config::default().to_toml()?)?;

    tracing::info!("Wrote default config to {:?}", location);
    println!("{}", location.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        init(&path, false).unwrap();
        assert!(Config::load_from(&path).is_ok());

        let err = init(&path, false).unwrap_err();
        assert!(err.to_string().contains("--force"));
        assert!(init(&path, true).is_ok());
    }
}
