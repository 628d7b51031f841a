//! Configuration management for uniq.
//!
//! Configuration is loaded from the platform config directory with sensible
//! defaults. All config structs implement `Default`.

mod types;
mod validate;

pub use types::*;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure for uniq.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Resource limits
    pub limits: LimitsConfig,

    /// Worker pool sizes
    pub pools: PoolsConfig,

    /// Per-user rate limits
    pub rate: RateConfig,

    /// Image engine settings
    pub image: ImageConfig,

    /// Video engine settings
    pub video: VideoConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default configuration if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path.
    ///
    /// Uses platform-appropriate directories:
    /// - macOS: ~/Library/Application Support/com.uniq.uniq/config.toml
    /// - Linux: ~/.config/uniq/config.toml
    /// - Windows: C:\Users\<User>\AppData\Roaming\uniq\config\config.toml
    ///
    /// Falls back to ~/.uniq/config.toml if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "uniq", "uniq")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".uniq").join("config.toml")
            })
    }

    /// Resolved root for per-job scratch directories (with ~ expansion).
    pub fn scratch_dir(&self) -> PathBuf {
        match &self.general.scratch_dir {
            Some(dir) => {
                let path_str = dir.to_string_lossy();
                PathBuf::from(shellexpand::tilde(&path_str).into_owned())
            }
            None => std::env::temp_dir(),
        }
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.pools.video_workers, 10);
        assert_eq!(config.pools.image_workers, 20);
        assert_eq!(config.pools.network_workers, 15);
        assert_eq!(config.rate.max_requests, 30);
        assert_eq!(config.rate.window_secs, 60);
        assert_eq!(config.video.timeout_secs, 600);
        assert_eq!(config.limits.max_error_chars, 500);
    }

    #[test]
    fn test_config_to_toml() {
        let config = Config::default();
        let toml = config.to_toml().unwrap();
        assert!(toml.contains("[limits]"));
        assert!(toml.contains("[pools]"));
        assert!(toml.contains("[video]"));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[video]\nmode = \"full\"\nmax_height = 0\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.video.mode, VideoMode::Full);
        assert_eq!(config.video.max_height, 0);
        assert_eq!(config.video.preset, "ultrafast");
        assert_eq!(config.image.quality_min, 90);
    }

    #[test]
    fn test_invalid_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[rate]\nmax_requests = 0\n").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("rate.max_requests"));
    }

    #[test]
    fn test_scratch_dir_defaults_to_temp() {
        let config = Config::default();
        assert_eq!(config.scratch_dir(), std::env::temp_dir());
    }
}
