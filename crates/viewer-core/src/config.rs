//! Viewer configuration.
//!
//! Loaded from a JSON file, from `DEEDVIEW_*` environment variables, or built
//! programmatically. Every field has a default, so a partial file is valid.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How page surfaces are sized.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum ScalePolicy {
    /// Pages are as wide as the container's content box
    FitWidth,
    /// Pages are painted at a fixed zoom factor regardless of container width
    Fixed { scale: f32 },
}

impl Default for ScalePolicy {
    fn default() -> Self {
        ScalePolicy::FitWidth
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub scale: ScalePolicy,
    /// Show the "Page N of M" indicator and previous/next controls
    pub show_navigation: bool,
    /// Quiet period before visibility changes pick a new current page
    pub debounce_ms: u64,
    /// Intersection ratios at which visibility notifications fire
    pub thresholds: Vec<f32>,
    /// Vertical gap below every page surface
    pub page_spacing_px: f32,
    /// Pages this close to the current page are painted before the rest
    pub adjacent_radius: u32,
    /// Length of the smooth scroll used by navigation
    pub scroll_duration_ms: u64,
    /// Directory that relative and root-relative sources resolve against
    pub asset_root: Option<PathBuf>,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            scale: ScalePolicy::FitWidth,
            show_navigation: true,
            debounce_ms: 100,
            thresholds: vec![0.0, 0.25, 0.5, 0.75, 1.0],
            page_spacing_px: 16.0,
            adjacent_radius: 2,
            scroll_duration_ms: 300,
            asset_root: None,
        }
    }
}

impl ViewerConfig {
    pub fn with_scale(mut self, scale: ScalePolicy) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_navigation(mut self, show_navigation: bool) -> Self {
        self.show_navigation = show_navigation;
        self
    }

    pub fn with_debounce_ms(mut self, debounce_ms: u64) -> Self {
        self.debounce_ms = debounce_ms;
        self
    }

    pub fn with_scroll_duration_ms(mut self, scroll_duration_ms: u64) -> Self {
        self.scroll_duration_ms = scroll_duration_ms;
        self
    }

    pub fn with_asset_root<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.asset_root = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn scroll_duration(&self) -> Duration {
        Duration::from_millis(self.scroll_duration_ms)
    }

    /// Loads configuration from a JSON file.
    ///
    /// ```json
    /// { "scale": { "mode": "fixed", "scale": 1.5 }, "debounce_ms": 50 }
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by environment variables.
    ///
    /// - `DEEDVIEW_SCALE`: `fit-width` or a zoom factor such as `1.5`
    /// - `DEEDVIEW_SHOW_NAVIGATION`: `true` / `false`
    /// - `DEEDVIEW_DEBOUNCE_MS`
    /// - `DEEDVIEW_PAGE_SPACING_PX`
    /// - `DEEDVIEW_SCROLL_DURATION_MS`
    /// - `DEEDVIEW_ASSET_ROOT`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().apply_env(|key| std::env::var(key).ok())
    }

    /// Apply `DEEDVIEW_*` overrides read through `lookup`.
    pub fn apply_env<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("DEEDVIEW_SCALE") {
            self.scale = parse_scale(&value)?;
        }
        if let Some(value) = lookup("DEEDVIEW_SHOW_NAVIGATION") {
            self.show_navigation = parse_value("DEEDVIEW_SHOW_NAVIGATION", &value)?;
        }
        if let Some(value) = lookup("DEEDVIEW_DEBOUNCE_MS") {
            self.debounce_ms = parse_value("DEEDVIEW_DEBOUNCE_MS", &value)?;
        }
        if let Some(value) = lookup("DEEDVIEW_PAGE_SPACING_PX") {
            self.page_spacing_px = parse_value("DEEDVIEW_PAGE_SPACING_PX", &value)?;
        }
        if let Some(value) = lookup("DEEDVIEW_SCROLL_DURATION_MS") {
            self.scroll_duration_ms = parse_value("DEEDVIEW_SCROLL_DURATION_MS", &value)?;
        }
        if let Some(value) = lookup("DEEDVIEW_ASSET_ROOT") {
            self.asset_root = Some(PathBuf::from(value));
        }

        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let ScalePolicy::Fixed { scale } = self.scale {
            if !scale.is_finite() || scale <= 0.0 {
                return Err(invalid("scale", scale));
            }
        }

        if self.thresholds.is_empty() {
            return Err(invalid("thresholds", "[]"));
        }
        if let Some(bad) =
            self.thresholds.iter().find(|t| !t.is_finite() || **t < 0.0 || **t > 1.0)
        {
            return Err(invalid("thresholds", bad));
        }

        if !self.page_spacing_px.is_finite() || self.page_spacing_px < 0.0 {
            return Err(invalid("page_spacing_px", self.page_spacing_px));
        }

        Ok(())
    }
}

fn parse_scale(value: &str) -> Result<ScalePolicy, ConfigError> {
    if value.trim().eq_ignore_ascii_case("fit-width") {
        return Ok(ScalePolicy::FitWidth);
    }
    let scale = parse_value("DEEDVIEW_SCALE", value)?;
    Ok(ScalePolicy::Fixed { scale })
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| invalid(key, value))
}

fn invalid(key: &str, value: impl ToString) -> ConfigError {
    ConfigError::InvalidValue { key: key.to_owned(), value: value.to_string() }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for configuration key {key}: {value}")]
    InvalidValue { key: String, value: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed configuration file: {0}")]
    Parse(#[from] serde_json::Error),
}
