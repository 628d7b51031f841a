//! Interactive mode for a bare `uniq` invocation on a TTY.
//!
//! A menu-driven front end over the same request path as `uniq run`.

pub mod process;
pub mod theme;

use console::Style;
use dialoguer::Select;
use uniq_core::Config;

/// Map a dialoguer result to `Ok(None)` on Ctrl+C so flows exit cleanly.
fn handle_interrupt<T>(result: dialoguer::Result<T>) -> anyhow::Result<Option<T>> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(dialoguer::Error::IO(e)) if e.kind() == std::io::ErrorKind::Interrupted => Ok(None),
        Err(e) => Err(e.into()),
    }
}

const MENU_ITEMS: &[&str] = &["Uniqualize a photo or video", "Show configuration", "Exit"];

/// Entry point for interactive mode.
pub async fn run(config: Config) -> anyhow::Result<()> {
    theme::print_banner();
    let theme = theme::uniq_theme();

    loop {
        let selection = Select::with_theme(&theme)
            .with_prompt("What would you like to do?")
            .items(MENU_ITEMS)
            .default(0)
            .interact_opt()?;

        match selection {
            Some(0) => process::guided_uniqualize(&config).await?,
            Some(1) => show_config(&config),
            _ => break,
        }
    }

    Ok(())
}

fn show_config(config: &Config) {
    let dim = Style::new().for_stderr().dim();
    let cyan = Style::new().for_stderr().cyan();
    let label = Style::new().for_stderr().bold();

    let path = Config::default_path();
    let note = if path.exists() {
        "(exists)"
    } else {
        "(using defaults)"
    };

    eprintln!();
    eprintln!("  {}", cyan.apply_to("Current configuration:"));
    eprintln!();
    eprintln!(
        "    {:<20} {} {}",
        label.apply_to("Config file:"),
        path.display(),
        dim.apply_to(note)
    );
    eprintln!(
        "    {:<20} video {} / image {} / network {}",
        label.apply_to("Workers:"),
        config.pools.video_workers,
        config.pools.image_workers,
        config.pools.network_workers
    );
    eprintln!(
        "    {:<20} {} per {}s",
        label.apply_to("Rate limit:"),
        config.rate.max_requests,
        config.rate.window_secs
    );
    eprintln!(
        "    {:<20} {:?}, max {}p, timeout {}s",
        label.apply_to("Video:"),
        config.video.mode,
        config.video.max_height,
        config.video.timeout_secs
    );
    eprintln!(
        "    {:<20} {}..{}",
        label.apply_to("JPEG quality:"),
        config.image.quality_min,
        config.image.quality_max
    );
    eprintln!();
}
