//! Uniq CLI - produce look-alike but byte-, hash- and metadata-distinct
//! copies of photos and videos.
//!
//! # Usage
//!
//! ```bash
//! # Five variations of a photo next to the original
//! uniq run photo.jpg -n 5
//!
//! # A video with a custom transform spec
//! uniq run clip.mp4 --spec spec.toml --output-dir ./out
//!
//! # Inspect or rewrite metadata
//! uniq exif show photo_uniq_1.jpg
//!
//! # Check how far two files drifted apart
//! uniq compare photo.jpg photo_uniq_1.jpg
//! ```

use std::io::IsTerminal;
use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use uniq_core::Config;

mod cli;
mod logging;

/// Uniq - perceptually similar, byte-distinct media copies.
#[derive(Parser, Debug)]
#[command(name = "uniq")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    /// Config file to use instead of the platform default
    #[arg(long, global = true, env = "UNIQ_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Uniqualize a photo or video into one or more variations
    Run(cli::run::RunArgs),

    /// Show, strip, copy or randomize EXIF metadata
    Exif(cli::exif::ExifArgs),

    /// Compare two files by content hash and perceptual distance
    Compare(cli::compare::CompareArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't initialized yet, so config warnings go through eprintln.
    let config = match &cli.config {
        Some(path) if path.exists() => Config::load_from(path)?,
        Some(path) => {
            eprintln!(
                "Warning: Config file {} not found, using defaults.",
                path.display()
            );
            Config::default()
        }
        None => match Config::load() {
            Ok(config) => config,
            Err(e) => {
                eprintln!(
                    "Warning: Failed to load config: {e}\n  \
                     Using default configuration. Check your config file with `uniq config path`."
                );
                Config::default()
            }
        },
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Uniq v{}", uniq_core::VERSION);

    match cli.command {
        Some(Commands::Run(args)) => cli::run::execute(args, config).await,
        Some(Commands::Exif(args)) => cli::exif::execute(args),
        Some(Commands::Compare(args)) => cli::compare::execute(args),
        Some(Commands::Config(args)) => cli::config::execute(args, &config, cli.config.as_deref()),
        None if std::io::stdin().is_terminal() => cli::interactive::run(config).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    }
}
