//! Configuration for truyen-tui.
//!
//! Read from `~/.config/truyen-tui/config.toml` at startup. A missing file means
//! defaults; missing fields inside an existing file fall back to their defaults too.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::reader::image_cache::MAX_MEMORY_PAGES;
use crate::reader::prefetch::DEFAULT_RADIUS;

pub const DEFAULT_BASE_URL: &str = "https://otruyenapi.com/v1/api";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub cache: CacheConfig,
    pub reader: ReaderConfig,
    pub controls: ControlsConfig,
    pub search: SearchConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub user_agent: String,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: concat!("truyen-tui/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout_secs: 30,
        }
    }
}

/// Query cache timings. Per-endpoint stale windows are fixed in `QueryKey`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub gc_secs: u64,
    pub max_retries: u32,
    pub retry_base_ms: u64,
    pub retry_max_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            gc_secs: 600,
            max_retries: 3,
            retry_base_ms: 1000,
            retry_max_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChapterLanding {
    #[default]
    First,
    Last,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    pub default_mode: String,
    pub prefetch_radius: usize,
    pub image_cache_limit: usize,
    pub mobile_breakpoint_px: u32,
    pub previous_chapter_landing: ChapterLanding,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            default_mode: "single".to_string(),
            prefetch_radius: DEFAULT_RADIUS,
            image_cache_limit: MAX_MEMORY_PAGES,
            mobile_breakpoint_px: 768,
            previous_chapter_landing: ChapterLanding::First,
        }
    }
}

/// Overlay visibility thresholds. Distances are in pixels, times in milliseconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ControlsConfig {
    pub idle_hide_ms: u64,
    pub scroll_hide_ms: u64,
    pub double_tap_hide_ms: u64,
    pub double_tap_window_ms: u64,
    pub scroll_noise_px: u32,
    pub scroll_hide_offset_px: u32,
    pub scroll_to_top_px: u32,
}

impl Default for ControlsConfig {
    fn default() -> Self {
        Self {
            idle_hide_ms: 3000,
            scroll_hide_ms: 4000,
            double_tap_hide_ms: 6000,
            double_tap_window_ms: 400,
            scroll_noise_px: 5,
            scroll_hide_offset_px: 50,
            scroll_to_top_px: 300,
        }
    }
}

impl ControlsConfig {
    pub fn idle_hide(&self) -> Duration {
        Duration::from_millis(self.idle_hide_ms)
    }

    pub fn scroll_hide(&self) -> Duration {
        Duration::from_millis(self.scroll_hide_ms)
    }

    pub fn double_tap_hide(&self) -> Duration {
        Duration::from_millis(self.double_tap_hide_ms)
    }

    pub fn double_tap_window(&self) -> Duration {
        Duration::from_millis(self.double_tap_window_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub min_length: usize,
    pub debounce_ms: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            min_length: 3,
            debounce_ms: 500,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl Config {
    /// Load from `path`, or from the default location when `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_config_path()?,
        };

        if !path.exists() {
            log::info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path).map_err(|e| ConfigError::Io {
            path: path.clone(),
            source: e,
        })?;

        Self::parse(&content).map_err(|e| ConfigError::Parse { path, source: e })
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// `~/.config/truyen-tui/config.toml`
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("truyen-tui").join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.api.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.reader.prefetch_radius, 3);
        assert_eq!(config.reader.image_cache_limit, 50);
        assert_eq!(config.controls.double_tap_window_ms, 400);
        assert_eq!(config.search.min_length, 3);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = Config::parse(
            r#"
[reader]
prefetch_radius = 5
previous_chapter_landing = "last"

[controls]
idle_hide_ms = 1500
"#,
        )
        .unwrap();

        assert_eq!(config.reader.prefetch_radius, 5);
        assert_eq!(config.reader.previous_chapter_landing, ChapterLanding::Last);
        assert_eq!(config.reader.mobile_breakpoint_px, 768);
        assert_eq!(config.controls.idle_hide(), Duration::from_millis(1500));
        assert_eq!(config.controls.scroll_hide_ms, 4000);
    }

    #[test]
    fn rejects_invalid_landing() {
        let result = Config::parse("[reader]\nprevious_chapter_landing = \"middle\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(Some(&dir.path().join("nope.toml"))).unwrap();
        assert_eq!(config.cache.max_retries, 3);
    }
}
