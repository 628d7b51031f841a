//! The `uniq run` command.

use std::fs::File;
use std::io::{BufWriter, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use uniq_core::output::write_results;
use uniq_core::{
    BatchSummary, Config, ImageSpec, JobSpec, MediaKind, Spec, UniqRequest, Uniqualizer, UserId,
    VariationResult, VideoSpec,
};

/// Which engine handles the input.
#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum KindArg {
    /// Detect from the file extension
    #[default]
    Auto,
    Image,
    Video,
}

/// Result serialization.
#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum FormatArg {
    /// One JSON document with a summary
    #[default]
    Json,
    /// One JSON object per variation
    Jsonl,
}

impl From<FormatArg> for uniq_core::OutputFormat {
    fn from(format: FormatArg) -> Self {
        match format {
            FormatArg::Json => Self::Json,
            FormatArg::Jsonl => Self::JsonLines,
        }
    }
}

/// Arguments for the `run` command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Photo or video to uniqualize
    pub input: PathBuf,

    /// Number of variations to produce
    #[arg(short = 'n', long, default_value = "1")]
    pub variations: usize,

    /// Media kind (detected from the extension by default)
    #[arg(short, long, value_enum, default_value = "auto")]
    pub kind: KindArg,

    /// Directory for the variations (defaults to the input's directory)
    #[arg(short = 'd', long)]
    pub output_dir: Option<PathBuf>,

    /// TOML transform spec; randomized defaults when omitted
    #[arg(short, long)]
    pub spec: Option<PathBuf>,

    /// Result format
    #[arg(short, long, value_enum, default_value = "json")]
    pub format: FormatArg,

    /// Write results to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Apply per-user rate limiting for this caller
    #[arg(long)]
    pub user: Option<UserId>,
}

/// Execute the run command.
pub async fn execute(args: RunArgs, config: Config) -> anyhow::Result<()> {
    if !args.input.exists() {
        anyhow::bail!(
            "Input path does not exist: {:?}\n\n  Hint: Check the file path and try again.",
            args.input
        );
    }

    let kind = match args.kind {
        KindArg::Auto => MediaKind::detect(&args.input).ok_or_else(|| {
            anyhow::anyhow!(
                "Cannot tell whether {:?} is a photo or a video.\n\n  Hint: pass --kind image or --kind video.",
                args.input
            )
        })?,
        KindArg::Image => MediaKind::Image,
        KindArg::Video => MediaKind::Video,
    };

    let spec = match &args.spec {
        Some(path) => load_spec(path, kind)?,
        None => JobSpec::default_for(kind),
    };

    let mut request = UniqRequest::new(kind, &args.input)
        .variations(args.variations)
        .spec(spec);
    if let Some(dir) = &args.output_dir {
        std::fs::create_dir_all(dir)?;
        request = request.output_dir(dir);
    }

    let results = run_request(config, request, args.user).await?;
    report(&results, args.format, args.output.as_deref())?;

    if results.iter().all(|r| !r.ok) {
        anyhow::bail!("All {} variation(s) failed", results.len());
    }
    Ok(())
}

/// Parse a TOML transform spec for `kind`.
pub fn load_spec(path: &Path, kind: MediaKind) -> anyhow::Result<JobSpec> {
    let content = std::fs::read_to_string(path)?;
    let spec = match kind {
        MediaKind::Image => JobSpec::Image(Spec::Custom(toml::from_str::<ImageSpec>(&content)?)),
        MediaKind::Video => JobSpec::Video(Spec::Custom(toml::from_str::<VideoSpec>(&content)?)),
    };
    Ok(spec)
}

/// Run one request behind a spinner.
pub async fn run_request(
    config: Config,
    request: UniqRequest,
    user: Option<UserId>,
) -> anyhow::Result<Vec<VariationResult>> {
    let uniq = Uniqualizer::new(config);
    let spinner = create_spinner(&request)?;

    let results = match user {
        Some(user) => uniq.uniqualize_as(user, request).await,
        None => Ok(uniq.uniqualize(request).await),
    };
    spinner.finish_and_clear();
    uniq.governor().shutdown();

    Ok(results?)
}

/// Write results to `output` (or stdout) and a summary to stderr.
pub fn report(
    results: &[VariationResult],
    format: FormatArg,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    match output {
        Some(path) => {
            let mut writer = BufWriter::new(File::create(path)?);
            write_results(&mut writer, results, format.into(), true)?;
            writer.flush()?;
            tracing::info!("Results written to {:?}", path);
        }
        None => {
            let stdout = std::io::stdout();
            let pretty = stdout.is_terminal();
            let mut writer = stdout.lock();
            write_results(&mut writer, results, format.into(), pretty)?;
            writer.flush()?;
        }
    }

    for result in results.iter().filter(|r| !r.ok) {
        tracing::warn!(
            "Variation {} failed: {}",
            result.index,
            result.error.as_deref().unwrap_or("unknown error")
        );
    }
    print_summary(&BatchSummary::from_results(results));
    Ok(())
}

fn create_spinner(request: &UniqRequest) -> anyhow::Result<ProgressBar> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?,
    );
    spinner.set_message(format!(
        "uniqualizing {} ({} variation(s))",
        request.input.display(),
        request.variations
    ));
    spinner.enable_steady_tick(Duration::from_millis(100));
    Ok(spinner)
}

fn print_summary(summary: &BatchSummary) {
    eprintln!();
    eprintln!("  ====================================");
    eprintln!("               Summary");
    eprintln!("  ====================================");
    eprintln!("    Succeeded:    {:>8}", summary.succeeded);
    if summary.failed > 0 {
        eprintln!("    Failed:       {:>8}", summary.failed);
    }
    eprintln!("  ------------------------------------");
    eprintln!("    Requested:    {:>8}", summary.requested);
    eprintln!("    Duration:     {:>7.1}s", summary.wall_ms as f64 / 1000.0);
    eprintln!("  ====================================");
}
