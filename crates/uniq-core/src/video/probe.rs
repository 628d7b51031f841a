//! Stream inspection via ffprobe's JSON output.

use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::error::{truncate_tail, PipelineError, PipelineResult};

/// Frame rate assumed when the container does not declare a usable one.
const FALLBACK_FPS: f64 = 30.0;
/// Sample rate assumed for audio streams that do not declare one.
const FALLBACK_SAMPLE_RATE: u32 = 44_100;

/// Properties of the input that drive filter-graph construction.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeInfo {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// Sample rate of the first audio stream; `None` when there is no audio.
    pub audio_sample_rate: Option<u32>,
    pub duration_secs: Option<f64>,
}

impl ProbeInfo {
    pub fn has_audio(&self) -> bool {
        self.audio_sample_rate.is_some()
    }

    /// Parse `ffprobe -print_format json -show_format -show_streams` output.
    /// The first video and first audio stream win.
    pub fn from_json(json: &str) -> Result<Self, String> {
        let parsed: FfprobeOutput =
            serde_json::from_str(json).map_err(|e| format!("invalid ffprobe output: {e}"))?;

        let video = parsed
            .streams
            .iter()
            .find(|s| s.codec_type.as_deref() == Some("video"))
            .ok_or_else(|| "no video stream found".to_string())?;
        let audio = parsed
            .streams
            .iter()
            .find(|s| s.codec_type.as_deref() == Some("audio"));

        let (width, height) = match (video.width, video.height) {
            (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
            _ => return Err("video stream has no dimensions".to_string()),
        };
        let fps = video
            .r_frame_rate
            .as_deref()
            .and_then(parse_rate)
            .or_else(|| video.avg_frame_rate.as_deref().and_then(parse_rate))
            .unwrap_or(FALLBACK_FPS);
        let audio_sample_rate = audio.map(|a| {
            a.sample_rate
                .as_deref()
                .and_then(|r| r.parse().ok())
                .filter(|&r: &u32| r > 0)
                .unwrap_or(FALLBACK_SAMPLE_RATE)
        });
        let duration_secs = parsed
            .format
            .and_then(|f| f.duration)
            .and_then(|d| d.parse().ok());

        Ok(Self {
            width,
            height,
            fps,
            audio_sample_rate,
            duration_secs,
        })
    }
}

/// Parse a rational rate such as `30000/1001` or a plain `25`.
/// Zero or non-finite rates yield `None`.
pub fn parse_rate(rate: &str) -> Option<f64> {
    let value = match rate.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => rate.trim().parse().ok()?,
    };
    (value.is_finite() && value > 0.0).then_some(value)
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
    format: Option<FfprobeFormat>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    sample_rate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

/// Run ffprobe on `input` with a wall-clock limit.
pub async fn probe(ffprobe: &str, input: &Path, timeout: Duration) -> PipelineResult<ProbeInfo> {
    let probe_err = |message: String| PipelineError::Probe {
        path: input.to_path_buf(),
        message,
    };

    let child = Command::new(ffprobe)
        .args(["-v", "error", "-print_format", "json", "-show_format", "-show_streams"])
        .arg(input)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| probe_err(format!("cannot run {ffprobe}: {e}")))?;

    let output = tokio::time::timeout(timeout, child.wait_with_output())
        .await
        .map_err(|_| probe_err(format!("timed out after {}ms", timeout.as_millis())))?
        .map_err(|e| probe_err(e.to_string()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(probe_err(truncate_tail(&stderr, 500)));
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    ProbeInfo::from_json(&stdout).map_err(probe_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    const WITH_AUDIO: &str = r#"{
        "streams": [
            {"index": 0, "codec_type": "video", "width": 1920, "height": 1080,
             "r_frame_rate": "30000/1001", "avg_frame_rate": "30000/1001"},
            {"index": 1, "codec_type": "audio", "sample_rate": "48000"}
        ],
        "format": {"duration": "10.010000"}
    }"#;

    #[test]
    fn test_parse_with_audio() {
        let info = ProbeInfo::from_json(WITH_AUDIO).unwrap();
        assert_eq!((info.width, info.height), (1920, 1080));
        assert!((info.fps - 29.97).abs() < 0.01);
        assert_eq!(info.audio_sample_rate, Some(48_000));
        assert!(info.has_audio());
        assert_eq!(info.duration_secs, Some(10.01));
    }

    #[test]
    fn test_parse_without_audio() {
        let json = r#"{"streams": [{"codec_type": "video", "width": 640, "height": 360, "r_frame_rate": "25/1"}]}"#;
        let info = ProbeInfo::from_json(json).unwrap();
        assert!(!info.has_audio());
        assert_eq!(info.fps, 25.0);
        assert_eq!(info.duration_secs, None);
    }

    #[test]
    fn test_bad_rate_falls_back() {
        let json = r#"{"streams": [{"codec_type": "video", "width": 640, "height": 360, "r_frame_rate": "0/0", "avg_frame_rate": "24/1"}]}"#;
        assert_eq!(ProbeInfo::from_json(json).unwrap().fps, 24.0);

        let json = r#"{"streams": [{"codec_type": "video", "width": 640, "height": 360}]}"#;
        assert_eq!(ProbeInfo::from_json(json).unwrap().fps, FALLBACK_FPS);
    }

    #[test]
    fn test_audio_only_is_rejected() {
        let json = r#"{"streams": [{"codec_type": "audio", "sample_rate": "44100"}]}"#;
        assert!(ProbeInfo::from_json(json).unwrap_err().contains("no video stream"));
        assert!(ProbeInfo::from_json("not json").is_err());
    }

    #[test]
    fn test_parse_rate() {
        assert_eq!(parse_rate("60"), Some(60.0));
        assert_eq!(parse_rate("1/0"), None);
        assert_eq!(parse_rate("abc"), None);
    }

    #[tokio::test]
    async fn test_missing_binary_is_probe_error() {
        let err = probe(
            "/nonexistent/ffprobe",
            Path::new("in.mp4"),
            Duration::from_secs(1),
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Probe);
    }
}
