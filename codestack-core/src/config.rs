use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub view: ViewConfig,
    pub render: RenderConfig,
    pub log: LogConfig,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {:?}", path))?;
        toml::from_str(&raw).with_context(|| format!("failed to parse config file {:?}", path))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    /// Share of the viewport a frame occupies before it is resized.
    pub default_height_share: f32,
    pub min_height_px: f32,
    pub resize_margin_px: f32,
    pub line_height_px: f32,
    pub viewport_height_px: f32,
    /// Glyph advance of the monospace editor font.
    pub char_width_px: f32,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            default_height_share: 0.25,
            min_height_px: 100.0,
            resize_margin_px: 10.0,
            line_height_px: 18.0,
            viewport_height_px: 800.0,
            char_width_px: 8.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub title: String,
    pub empty_hint: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            title: "StackView".to_owned(),
            empty_hint: "No frames yet. Use Alt+Cmd+F12 (Mac) or Alt+Ctrl+F12 (Windows) to add definitions to the stack.".to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.view.default_height_share, 0.25);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[view]\nmin_height_px = 140.0\n\n[log]\nlevel = \"debug\"\n",
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.view.min_height_px, 140.0);
        assert_eq!(config.view.resize_margin_px, 10.0);
        assert_eq!(config.log.level, "debug");
        assert_eq!(config.render, RenderConfig::default());
    }

    #[test]
    fn malformed_file_reports_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[view\n").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(format!("{err}").contains("config.toml"));
    }
}
