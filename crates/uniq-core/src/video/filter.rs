//! Filter-graph construction for the transcoder.
//!
//! Everything here is pure: given probe results and resolved parameters it
//! produces the exact argument vector, so the graph can be tested without
//! a transcoder on the machine.

use rand::Rng;
use std::ffi::OsString;
use std::path::Path;

use super::probe::ProbeInfo;
use crate::config::VideoConfig;
use crate::metadata::ContainerTags;
use crate::params::VideoParams;

pub const MIN_FPS: f64 = 15.0;
pub const MAX_FPS: f64 = 60.0;

/// Format a float with at most six decimals and no trailing zeros.
pub(crate) fn num(value: f64) -> String {
    let s = format!("{value:.6}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" {
        "0".to_string()
    } else {
        s.to_string()
    }
}

/// Codec parameters sampled once per job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeSettings {
    pub preset: String,
    pub crf: u8,
    pub audio_bitrate_kbps: u32,
}

impl EncodeSettings {
    pub fn sample<R: Rng + ?Sized>(config: &VideoConfig, rng: &mut R) -> Self {
        let jitter = config.audio_bitrate_jitter_kbps as i64;
        let bitrate = config.audio_bitrate_kbps as i64 + rng.gen_range(-jitter..=jitter);
        Self {
            preset: config.preset.clone(),
            crf: rng.gen_range(config.crf_min..=config.crf_max),
            audio_bitrate_kbps: bitrate.max(8) as u32,
        }
    }
}

/// The complete set of video/audio operations for one job.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoPlan {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub video_filters: Vec<String>,
    /// Empty when the input has no audio stream or neither tempo nor pitch
    /// changed.
    pub audio_filters: Vec<String>,
    pub has_audio: bool,
}

impl VideoPlan {
    /// Build the plan. `max_height` of 0 disables the height cap.
    pub fn build(info: &ProbeInfo, params: &VideoParams, max_height: u32) -> Self {
        let (width, height) =
            target_dimensions(info.width, info.height, params.scale_pct, max_height);

        let mut vf = vec![format!("scale={width}:{height}")];

        if params.brightness != 0.0 || params.contrast != 1.0 || params.saturation != 1.0 {
            vf.push(format!(
                "eq=brightness={}:contrast={}:saturation={}",
                num(params.brightness),
                num(params.contrast),
                num(params.saturation)
            ));
        }

        if params.noise_strength > 0 {
            vf.push(format!("noise=alls={}:allf=t", params.noise_strength));
        }

        let border = safe_border(width, height, params.border_px);
        if border > 0 {
            let px = border * 2;
            vf.push(format!("crop=iw-{px}:ih-{px}"));
            vf.push(format!("pad=iw+{px}:ih+{px}:(ow-iw)/2:(oh-ih)/2:black"));
        }

        if let Some([r, g, b]) = params.color_balance {
            vf.push(format!(
                "colorbalance=rs={}:gs={}:bs={}",
                num(r),
                num(g),
                num(b)
            ));
        }

        if params.rotation_deg != 0.0 {
            vf.push(format!(
                "rotate={}:fillcolor=black",
                num(params.rotation_deg.to_radians())
            ));
        }

        if params.tempo_changed() {
            vf.push(format!("setpts={}*PTS", num(1.0 / params.tempo)));
        }

        let audio_filters = match info.audio_sample_rate {
            Some(rate) => audio_chain(rate, params),
            None => Vec::new(),
        };

        Self {
            width,
            height,
            fps: (info.fps + params.fps_delta).clamp(MIN_FPS, MAX_FPS),
            video_filters: vf,
            audio_filters,
            has_audio: info.has_audio(),
        }
    }

    /// Full transcoder argument vector (without the program name).
    pub fn ffmpeg_args(
        &self,
        input: &Path,
        output: &Path,
        encode: &EncodeSettings,
        tags: &ContainerTags,
    ) -> Vec<OsString> {
        let mut args: Vec<OsString> = ["-y", "-hide_banner", "-nostdin", "-loglevel", "error"]
            .iter()
            .map(OsString::from)
            .collect();
        args.push("-i".into());
        args.push(input.as_os_str().to_owned());

        let mut push = |items: &[&str]| args.extend(items.iter().map(OsString::from));
        push(&["-vf", &self.video_filters.join(",")]);
        if !self.audio_filters.is_empty() {
            push(&["-af", &self.audio_filters.join(",")]);
        }
        push(&["-r", &num(self.fps)]);
        push(&[
            "-c:v",
            "libx264",
            "-preset",
            &encode.preset,
            "-crf",
            &encode.crf.to_string(),
            "-pix_fmt",
            "yuv420p",
        ]);
        if self.has_audio {
            push(&["-c:a", "aac", "-b:a", &format!("{}k", encode.audio_bitrate_kbps)]);
        }
        push(&["-map_metadata", "-1"]);
        args.extend(tags.to_ffmpeg_args().into_iter().map(OsString::from));
        args.push(output.as_os_str().to_owned());
        args
    }
}

/// Scale by a percentage, cap the height, then force both sides even.
pub fn target_dimensions(width: u32, height: u32, scale_pct: f64, max_height: u32) -> (u32, u32) {
    let factor = 1.0 + scale_pct / 100.0;
    let mut w = (width as f64 * factor).floor().max(1.0);
    let h = (height as f64 * factor).floor().max(1.0);
    if max_height > 0 && h > max_height as f64 {
        w = (w * max_height as f64 / h).floor().max(1.0);
        // The cap is a ceiling, so an odd cap rounds down.
        return (even(w as u32), (max_height - max_height % 2).max(2));
    }
    (even(w as u32), even(h as u32))
}

fn even(v: u32) -> u32 {
    if v % 2 == 0 {
        v.max(2)
    } else {
        v + 1
    }
}

/// Largest border that still leaves at least one pixel on each axis after
/// cropping `2 * border` from it.
fn safe_border(width: u32, height: u32, requested: u32) -> u32 {
    let limit = (width.min(height).saturating_sub(1)) / 2;
    requested.min(limit)
}

/// Pitch shift via resampling, followed by a tempo stage that undoes the
/// resampler's speed change and applies the requested one.
fn audio_chain(sample_rate: u32, params: &VideoParams) -> Vec<String> {
    if !params.tempo_changed() && !params.pitch_changed() {
        return Vec::new();
    }
    let mut af = Vec::new();
    let mut speed = 1.0;
    if params.pitch_changed() {
        let shifted = (sample_rate as f64 * params.pitch).round().max(1.0) as u32;
        af.push(format!("asetrate={shifted}"));
        af.push(format!("aresample={sample_rate}"));
        speed = shifted as f64 / sample_rate as f64;
    }
    af.extend(
        atempo_stages(params.tempo / speed)
            .into_iter()
            .map(|stage| format!("atempo={}", num(stage))),
    );
    af
}

/// Split a tempo factor into `atempo` stages, each within [0.5, 2.0].
fn atempo_stages(mut factor: f64) -> Vec<f64> {
    const MIN: f64 = 0.5;
    const MAX: f64 = 2.0;
    let mut stages = Vec::new();
    if !factor.is_finite() || factor <= 0.0 {
        return stages;
    }
    while factor > MAX {
        stages.push(MAX);
        factor /= MAX;
    }
    while factor < MIN {
        stages.push(MIN);
        factor /= MIN;
    }
    if (factor - 1.0).abs() > 1e-9 {
        stages.push(factor);
    }
    stages
}
