//! Engine configuration and style defaults.

use crate::shapes::{FillStyle, FontSpec, Rgba, StrokeStyle};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Styles given to new shapes when the caller does not pick one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleDefaults {
    pub stroke: StrokeStyle,
    pub fill: FillStyle,
    pub font: FontSpec,
    pub text_color: Rgba,
}

impl Default for StyleDefaults {
    fn default() -> Self {
        Self {
            stroke: StrokeStyle::default(),
            fill: FillStyle::default(),
            font: FontSpec::default(),
            text_color: Rgba::black(),
        }
    }
}

/// Editor-wide settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of history entries (`None` = unbounded).
    pub history_limit: Option<usize>,
    /// Edge of the placeholder rectangle used for an empty group.
    pub group_placeholder: f64,
    /// Wrap width of new text blocks.
    pub default_text_width: f64,
    pub style: StyleDefaults,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history_limit: Some(100),
            group_placeholder: 10.0,
            default_text_width: 150.0,
            style: StyleDefaults::default(),
        }
    }
}

impl EngineConfig {
    /// Parse a configuration; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_json(&text)?;
        log::info!("Loaded engine config from {}", path.as_ref().display());
        Ok(config)
    }
}
