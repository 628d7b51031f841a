//! Dialoguer theme and banner for interactive mode.

use console::{style, Style};
use dialoguer::theme::ColorfulTheme;

pub fn uniq_theme() -> ColorfulTheme {
    let dim = || Style::new().for_stderr().dim();
    ColorfulTheme {
        prompt_prefix: style("»".to_string()).for_stderr().magenta(),
        prompt_style: Style::new().for_stderr().bold(),
        prompt_suffix: dim().apply_to(":".to_string()),
        active_item_prefix: style("›".to_string()).for_stderr().magenta(),
        active_item_style: Style::new().for_stderr().magenta().bold(),
        success_prefix: style("●".to_string()).for_stderr().green(),
        success_suffix: dim().apply_to("=".to_string()),
        error_prefix: style("!".to_string()).for_stderr().red().bold(),
        values_style: Style::new().for_stderr().green(),
        ..ColorfulTheme::default()
    }
}

/// Version line and tagline on stderr, so stdout stays clean for results.
pub fn print_banner() {
    let magenta = Style::new().for_stderr().magenta().bold();
    let dim = Style::new().for_stderr().dim();
    eprintln!();
    eprintln!("  {} {}", magenta.apply_to("uniq"), dim.apply_to(uniq_core::VERSION));
    eprintln!("  {}", dim.apply_to("same picture, different file"));
    eprintln!("  {}", dim.apply_to("─".repeat(30)));
    eprintln!();
}
