//! ==============================================================================
//! config.rs - Dashboard Configuration Loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `monitor.toml`.
//!     loads configuration from file or falls back to defaults.
//!
//! structure:
//!     - ApiConfig: Where the farm backend lives and how long to wait for it.
//!     - WindowConfig: Default [start, end] bounds of readings queries.
//!     - MapConfig: Home position, zoom, marker icon url prefix and directory.
//!     - ServerConfig: Address the dashboard listens on.
//!     - LoggingConfig: Log level and sensor data echo.
//!
//! environment:
//!     - FARM_MONITOR_CONFIG: explicit path to the config file
//!     - API_BASE_URL: overrides [api].base_url
//!
//! ==============================================================================

use crate::domain::FetchWindow;

use anyhow::{anyhow, Context};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "http://127.0.0.1:8000";

/// 44°50′24″N
pub const FARM_CENTER_LAT: f64 = 44.0 + 50.0 / 60.0 + 24.0 / 3600.0;
/// 122°46′22″W
pub const FARM_CENTER_LON: f64 = -(122.0 + 46.0 / 60.0 + 22.0 / 3600.0);

pub const DEFAULT_ZOOM: f64 = 19.0;
pub const MAX_ZOOM: f64 = 20.0;

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct MonitorConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub window: WindowConfig,
    #[serde(default)]
    pub map: MapConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct WindowConfig {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MapConfig {
    pub center_latitude: f64,
    pub center_longitude: f64,
    pub zoom: f64,
    /// prefix for `icons/*.png`
    pub icon_base: String,
    /// local directory served under `/icons`
    pub icons_dir: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub show_sensor_data: bool,
}

/// where the effective configuration came from
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSource {
    File(PathBuf),
    /// no usable file; `failures` lists files that exist but did not load
    Defaults { failures: Vec<String> },
}

impl ConfigSource {
    pub fn log(&self) {
        match self {
            ConfigSource::File(path) => tracing::info!(path = %path.display(), "config loaded"),
            ConfigSource::Defaults { failures } => {
                for failure in failures {
                    tracing::warn!("failed to load config {}", failure);
                }
                tracing::warn!("no usable config file found - using defaults");
            }
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self { base_url: DEFAULT_API_BASE.to_string(), timeout_seconds: 10 }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        let legacy = FetchWindow::legacy();
        Self { start: legacy.start, end: legacy.end }
    }
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            center_latitude: FARM_CENTER_LAT,
            center_longitude: FARM_CENTER_LON,
            zoom: DEFAULT_ZOOM,
            icon_base: "/".to_string(),
            icons_dir: PathBuf::from("assets").join("icons"),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: "127.0.0.1:3000".to_string() }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), show_sensor_data: true }
    }
}

impl MonitorConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file {}", path.as_ref().display()))?;
        Self::parse(&content)
    }

    /// Parse and validate a toml document
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: MonitorConfig = toml::from_str(content)
            .map_err(|e| anyhow!("Failed to parse config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.window.start >= self.window.end {
            return Err(anyhow!(
                "[window] start ({}) must be before end ({})",
                self.window.start,
                self.window.end
            ));
        }
        if !(0.0..=MAX_ZOOM).contains(&self.map.zoom) {
            return Err(anyhow!("[map] zoom must be within 0..={}", MAX_ZOOM));
        }
        if self.api.timeout_seconds == 0 {
            return Err(anyhow!("[api] timeout_seconds must be positive"));
        }
        Ok(())
    }

    /// Load with default fallback, then apply environment overrides
    ///
    /// runs before logging is up, so what happened is reported back in the
    /// returned [`ConfigSource`] instead of being logged here.
    pub fn load_or_default() -> (Self, ConfigSource) {
        let mut paths: Vec<PathBuf> = Vec::new();
        if let Ok(explicit) = std::env::var("FARM_MONITOR_CONFIG") {
            paths.push(PathBuf::from(explicit));
        }
        paths.push(PathBuf::from("config").join("monitor.toml"));
        paths.push(PathBuf::from("..").join("config").join("monitor.toml"));

        let mut source = ConfigSource::Defaults { failures: Vec::new() };
        let mut config = None;
        for path in &paths {
            if !path.exists() {
                continue;
            }
            match Self::load(path) {
                Ok(loaded) => {
                    config = Some(loaded);
                    source = ConfigSource::File(path.clone());
                    break;
                }
                Err(e) => {
                    if let ConfigSource::Defaults { failures } = &mut source {
                        failures.push(format!("{}: {:#}", path.display(), e));
                    }
                }
            }
        }

        let mut config = config.unwrap_or_default();
        config.apply_api_base_override(std::env::var("API_BASE_URL").ok());
        (config, source)
    }

    /// `API_BASE_URL` wins over the file when set and non-empty
    pub fn apply_api_base_override(&mut self, value: Option<String>) {
        if let Some(base) = value.filter(|v| !v.trim().is_empty()) {
            self.api.base_url = base.trim().to_string();
        }
    }

    /// backend base url without a trailing slash
    pub fn api_base(&self) -> String {
        self.api.base_url.trim_end_matches('/').to_string()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_seconds)
    }

    pub fn fetch_window(&self) -> FetchWindow {
        FetchWindow { start: self.window.start, end: self.window.end }
    }

    /// Log configuration summary
    pub fn log_summary(&self) {
        tracing::info!(
            api = %self.api_base(),
            timeout_s = self.api.timeout_seconds,
            window_start = %self.window.start,
            window_end = %self.window.end,
            center = %format!("{:.5},{:.5}", self.map.center_latitude, self.map.center_longitude),
            zoom = self.map.zoom,
            bind = %self.server.bind,
            log_level = %self.logging.level,
            "dashboard configuration"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = MonitorConfig::parse("").unwrap();
        assert_eq!(config.api_base(), DEFAULT_API_BASE);
        assert_eq!(config.fetch_window(), FetchWindow::legacy());
        assert_eq!(config.map.zoom, DEFAULT_ZOOM);
        assert_eq!(config.server.bind, "127.0.0.1:3000");
    }

    #[test]
    fn test_partial_sections() {
        let config = MonitorConfig::parse(
            r#"
            [api]
            base_url = "http://farm.local:8000/"

            [window]
            start = "2025-09-18T00:00:00Z"
            end = "2025-09-19T00:00:00Z"
            "#,
        )
        .unwrap();
        assert_eq!(config.api_base(), "http://farm.local:8000");
        assert_eq!(config.api.timeout_seconds, 10);
        assert_eq!(config.window.start.to_rfc3339(), "2025-09-18T00:00:00+00:00");
    }

    #[test]
    fn test_inverted_window_rejected() {
        let err = MonitorConfig::parse(
            r#"
            [window]
            start = "2025-09-19T00:00:00Z"
            end = "2025-09-18T00:00:00Z"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("must be before end"));
    }

    #[test]
    fn test_shipped_config_parses() {
        let config = MonitorConfig::parse(include_str!("../config/monitor.toml")).unwrap();
        assert_eq!(config.fetch_window(), FetchWindow::legacy());
        assert_eq!(config.map.zoom, 19.0);
        assert!((config.map.center_latitude - FARM_CENTER_LAT).abs() < 1e-4);
        assert_eq!(config.map.icons_dir, MapConfig::default().icons_dir);
    }

    #[test]
    fn test_api_base_override() {
        let mut config = MonitorConfig::default();
        config.apply_api_base_override(Some("   ".to_string()));
        assert_eq!(config.api_base(), DEFAULT_API_BASE);
        config.apply_api_base_override(Some("http://10.0.0.2:9000/".to_string()));
        assert_eq!(config.api_base(), "http://10.0.0.2:9000");
    }
}
