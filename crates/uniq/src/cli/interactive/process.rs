//! Guided uniqualization: input path, settings, variation count, confirm, run.

use console::Style;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input, Select};
use std::path::PathBuf;
use uniq_core::{
    Config, ImageSpec, JobSpec, MediaKind, Spec, UniqRequest, Value, VideoMode,
};

use super::handle_interrupt;
use super::theme::uniq_theme;
use crate::cli::run::{report, run_request, FormatArg};

/// One prompt of the custom image settings walk.
struct Setting {
    prompt: &'static str,
    min: f64,
    max: f64,
}

const IMAGE_SETTINGS: [Setting; 6] = [
    Setting { prompt: "Rotation in degrees", min: -10.0, max: 10.0 },
    Setting { prompt: "Brightness", min: -10.0, max: 10.0 },
    Setting { prompt: "Contrast", min: -10.0, max: 10.0 },
    Setting { prompt: "Color", min: -10.0, max: 10.0 },
    Setting { prompt: "Noise", min: 0.0, max: 10.0 },
    Setting { prompt: "Blur", min: 0.0, max: 10.0 },
];

pub async fn guided_uniqualize(config: &Config) -> anyhow::Result<()> {
    let theme = uniq_theme();
    let warn = Style::new().for_stderr().yellow();

    let (input, kind) = loop {
        let Some(raw) = handle_interrupt(
            Input::<String>::with_theme(&theme)
                .with_prompt("Path to photo or video")
                .interact_text(),
        )?
        else {
            return Ok(());
        };

        let path = PathBuf::from(shellexpand::tilde(&raw).into_owned());
        if !path.is_file() {
            eprintln!("  {}", warn.apply_to(format!("File not found: {}", path.display())));
            continue;
        }
        match MediaKind::detect(&path) {
            Some(kind) => break (path, kind),
            None => eprintln!("  {}", warn.apply_to("Unsupported file type.")),
        }
    };

    let mut config = config.clone();
    let spec = match kind {
        MediaKind::Image => {
            let Some(spec) = prompt_image_spec(&theme)? else {
                return Ok(());
            };
            spec
        }
        MediaKind::Video => {
            let modes = &["Fast (scale and colour only)", "Full (every filter)"];
            match Select::with_theme(&theme)
                .with_prompt("Video mode")
                .items(modes)
                .default(0)
                .interact_opt()?
            {
                Some(0) => config.video.mode = VideoMode::Fast,
                Some(_) => config.video.mode = VideoMode::Full,
                None => return Ok(()),
            }
            JobSpec::Video(Spec::Default)
        }
    };

    let max = config.limits.max_variations;
    let Some(variations) = handle_interrupt(
        Input::<usize>::with_theme(&theme)
            .with_prompt(format!("Variations (1-{max})"))
            .default(1)
            .validate_with(move |n: &usize| {
                if (1..=max).contains(n) {
                    Ok(())
                } else {
                    Err(format!("must be between 1 and {max}"))
                }
            })
            .interact_text(),
    )?
    else {
        return Ok(());
    };

    eprintln!();
    let bold = Style::new().for_stderr().bold();
    eprintln!(
        "  {}",
        bold.apply_to(format!(
            "Ready to produce {variations} variation(s) of {}",
            input.display()
        ))
    );
    let confirm = Confirm::with_theme(&theme)
        .with_prompt("Start?")
        .default(true)
        .interact_opt()?;
    if !matches!(confirm, Some(true)) {
        return Ok(());
    }

    let request = UniqRequest::new(kind, input).variations(variations).spec(spec);
    let results = run_request(config, request, None).await?;
    report(&results, FormatArg::Json, None)?;
    Ok(())
}

/// Randomized defaults, or a walk through each image setting where 0 skips it.
fn prompt_image_spec(theme: &ColorfulTheme) -> anyhow::Result<Option<JobSpec>> {
    let choice = Select::with_theme(theme)
        .with_prompt("Settings")
        .items(&["Randomized defaults", "Custom"])
        .default(0)
        .interact_opt()?;
    match choice {
        Some(0) => return Ok(Some(JobSpec::Image(Spec::Default))),
        Some(_) => {}
        None => return Ok(None),
    }

    let mut values = [None; 6];
    for (slot, setting) in values.iter_mut().zip(&IMAGE_SETTINGS) {
        let (min, max) = (setting.min, setting.max);
        let Some(v) = handle_interrupt(
            Input::<f64>::with_theme(theme)
                .with_prompt(format!("{} ({min}..{max}, 0 to skip)", setting.prompt))
                .default(0.0)
                .validate_with(move |v: &f64| {
                    if (min..=max).contains(v) {
                        Ok(())
                    } else {
                        Err(format!("must be between {min} and {max}"))
                    }
                })
                .interact_text(),
        )?
        else {
            return Ok(None);
        };
        *slot = (v != 0.0).then_some(Value::Fixed(v));
    }

    let [rotation, brightness, contrast, color, noise, blur] = values;
    Ok(Some(JobSpec::Image(Spec::Custom(ImageSpec {
        rotation,
        brightness,
        contrast,
        color,
        noise,
        blur,
    }))))
}
