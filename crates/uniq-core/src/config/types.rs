//! Sub-configuration structs with production defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GeneralConfig {
    /// Root directory for per-job scratch directories.
    /// Empty means the system temp directory.
    pub scratch_dir: Option<PathBuf>,
}

/// Resource limits to protect against problematic inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum input file size in megabytes
    pub max_file_size_mb: u64,

    /// Maximum image dimension (width or height)
    pub max_image_dimension: u32,

    /// Maximum variations per request
    pub max_variations: usize,

    /// Wall-clock budget for one image job in milliseconds
    pub image_timeout_ms: u64,

    /// Wall-clock budget for probing a video in milliseconds
    pub probe_timeout_ms: u64,

    /// Maximum length of a user-facing error message
    pub max_error_chars: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: 20,
            max_image_dimension: 10000,
            max_variations: 10,
            image_timeout_ms: 60_000,
            probe_timeout_ms: 30_000,
            max_error_chars: 500,
        }
    }
}

/// Worker pool sizes, one pool per job class.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolsConfig {
    /// Concurrent video transcodes
    pub video_workers: usize,

    /// Concurrent image transforms
    pub image_workers: usize,

    /// Concurrent network-bound operations (downloads)
    pub network_workers: usize,

    /// How long a job may wait for a free slot before being denied
    pub admission_timeout_ms: u64,
}

impl Default for PoolsConfig {
    fn default() -> Self {
        Self {
            video_workers: 10,
            image_workers: 20,
            network_workers: 15,
            admission_timeout_ms: 300_000,
        }
    }
}

/// Per-user request rate limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateConfig {
    /// Requests admitted per window
    pub max_requests: usize,

    /// Sliding window length in seconds
    pub window_secs: u64,

    /// Attempts beyond `max_requests * flood_multiplier` in one window trigger a ban
    pub flood_multiplier: usize,

    /// Flood ban duration in seconds
    pub ban_secs: u64,
}

impl Default for RateConfig {
    fn default() -> Self {
        Self {
            max_requests: 30,
            window_secs: 60,
            flood_multiplier: 3,
            ban_secs: 120,
        }
    }
}

/// Image engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// Lowest JPEG quality used on re-encode
    pub quality_min: u8,

    /// Highest JPEG quality used on re-encode
    pub quality_max: u8,

    /// RGB fill for corners exposed by rotation
    pub fill: [u8; 3],
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            quality_min: 90,
            quality_max: 95,
            fill: [255, 255, 255],
        }
    }
}

/// Which filters the randomized default video spec enables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum VideoMode {
    /// Cheap filters only: scale and colour equalization
    #[default]
    Fast,
    /// Every filter, including noise, border, rotation, tempo and pitch
    Full,
}

/// Video engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// Transcoder executable
    pub ffmpeg_path: String,

    /// Stream probe executable
    pub ffprobe_path: String,

    /// Default-spec policy
    pub mode: VideoMode,

    /// Output height ceiling in pixels (0 disables the cap)
    pub max_height: u32,

    /// x264 preset
    pub preset: String,

    /// Lowest CRF sampled per job
    pub crf_min: u8,

    /// Highest CRF sampled per job
    pub crf_max: u8,

    /// Nominal AAC bitrate
    pub audio_bitrate_kbps: u32,

    /// Random spread around the nominal audio bitrate
    pub audio_bitrate_jitter_kbps: u32,

    /// Hard wall-clock limit for one transcode
    pub timeout_secs: u64,

    /// Output container extension
    pub container: String,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            mode: VideoMode::Fast,
            max_height: 720,
            preset: "ultrafast".to_string(),
            crf_min: 21,
            crf_max: 25,
            audio_bitrate_kbps: 128,
            audio_bitrate_jitter_kbps: 16,
            timeout_secs: 600,
            container: "mp4".to_string(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
