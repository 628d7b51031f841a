//! Configuration validation with range checks.

use crate::error::ConfigError;

use super::Config;

fn positive(value: u64, name: &str) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::ValidationError(format!("{name} must be > 0")));
    }
    Ok(())
}

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        positive(self.limits.max_file_size_mb, "limits.max_file_size_mb")?;
        positive(
            self.limits.max_image_dimension as u64,
            "limits.max_image_dimension",
        )?;
        positive(self.limits.max_variations as u64, "limits.max_variations")?;
        positive(self.limits.image_timeout_ms, "limits.image_timeout_ms")?;
        positive(self.limits.probe_timeout_ms, "limits.probe_timeout_ms")?;
        positive(self.limits.max_error_chars as u64, "limits.max_error_chars")?;

        positive(self.pools.video_workers as u64, "pools.video_workers")?;
        positive(self.pools.image_workers as u64, "pools.image_workers")?;
        positive(self.pools.network_workers as u64, "pools.network_workers")?;
        positive(self.pools.admission_timeout_ms, "pools.admission_timeout_ms")?;

        positive(self.rate.max_requests as u64, "rate.max_requests")?;
        positive(self.rate.window_secs, "rate.window_secs")?;
        if self.rate.flood_multiplier < 2 {
            return Err(ConfigError::ValidationError(
                "rate.flood_multiplier must be >= 2".into(),
            ));
        }

        if self.image.quality_min == 0
            || self.image.quality_max > 100
            || self.image.quality_min > self.image.quality_max
        {
            return Err(ConfigError::ValidationError(
                "image.quality_min..quality_max must be a range within 1..=100".into(),
            ));
        }

        if self.video.crf_min > self.video.crf_max || self.video.crf_max > 51 {
            return Err(ConfigError::ValidationError(
                "video.crf_min..crf_max must be a range within 0..=51".into(),
            ));
        }
        if self.video.audio_bitrate_jitter_kbps >= self.video.audio_bitrate_kbps {
            return Err(ConfigError::ValidationError(
                "video.audio_bitrate_jitter_kbps must be < audio_bitrate_kbps".into(),
            ));
        }
        if self.video.max_height != 0 && self.video.max_height < 16 {
            return Err(ConfigError::ValidationError(
                "video.max_height must be 0 (disabled) or >= 16".into(),
            ));
        }
        positive(self.video.timeout_secs, "video.timeout_secs")?;
        if self.video.container.is_empty() || self.video.ffmpeg_path.is_empty() {
            return Err(ConfigError::ValidationError(
                "video.container and video.ffmpeg_path must be set".into(),
            ));
        }
        Ok(())
    }
}
