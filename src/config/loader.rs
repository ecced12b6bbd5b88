use super::types::*;
use crate::utils::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";
const FALLBACK_CONFIG_FILE: &str = "config.default.yaml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub tools: ToolsConfig,
    pub logging: LoggingConfig,
    pub pairing: PairingConfig,
    pub preview: PreviewConfig,
    pub render: RenderConfig,
}

impl Config {
    pub fn load<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let config_str = std::fs::read_to_string(config_path)?;
        let config: Config = serde_yaml::from_str(&config_str)?;
        config.validate()?;
        Ok(config)
    }

    /// The explicit path wins; otherwise the shipped defaults file; as a
    /// last resort the built-in defaults.
    pub fn load_with_fallback<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let path = config_path.as_ref();
        if path.exists() {
            return Self::load(path);
        }
        if Path::new(FALLBACK_CONFIG_FILE).exists() {
            return Self::load(FALLBACK_CONFIG_FILE);
        }
        warn!(
            "No {} or {} found, using built-in defaults",
            path.display(),
            FALLBACK_CONFIG_FILE
        );
        Ok(Self::default())
    }

    pub fn validate(&self) -> Result<()> {
        if self.pairing.max_start_gap_seconds <= 0.0 {
            return Err(Error::validation(
                "pairing.max_start_gap_seconds must be greater than 0",
            ));
        }
        if self.pairing.left_marker.is_empty() || self.pairing.right_marker.is_empty() {
            return Err(Error::validation("pairing markers must not be empty"));
        }
        if self.pairing.left_marker.to_lowercase() == self.pairing.right_marker.to_lowercase() {
            return Err(Error::validation(
                "pairing.left_marker and pairing.right_marker must differ",
            ));
        }
        if self.preview.frame_count == 0 {
            return Err(Error::validation("preview.frame_count must be at least 1"));
        }
        if self.preview.edge == 0 {
            return Err(Error::validation("preview.edge must be at least 1"));
        }
        if self.render.crf < 0.0 || self.render.crf > 51.0 {
            return Err(Error::validation(format!(
                "Invalid render.crf {}: must be between 0 and 51",
                self.render.crf
            )));
        }
        if self.render.eye_edge == 0 || self.render.eye_edge % 2 != 0 {
            return Err(Error::validation(format!(
                "Invalid render.eye_edge {}: must be a positive even number",
                self.render.eye_edge
            )));
        }
        if self.render.fov_degrees <= 0.0 || self.render.fov_degrees > 360.0 {
            return Err(Error::validation(format!(
                "Invalid render.fov_degrees {}: must be in (0, 360]",
                self.render.fov_degrees
            )));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tools: ToolsConfig {
                ffmpeg: "ffmpeg".to_string(),
                ffprobe: "ffprobe".to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                show_timestamps: true,
                colored_output: true,
            },
            pairing: PairingConfig {
                max_start_gap_seconds: 5.0,
                left_marker: "left".to_string(),
                right_marker: "right".to_string(),
            },
            preview: PreviewConfig {
                frame_count: 30,
                edge: 512,
            },
            render: RenderConfig {
                encoder: "libx265".to_string(),
                crf: 18.0,
                preset: "medium".to_string(),
                eye_edge: 2048,
                dewarp: true,
                fov_degrees: 190.0,
                organize_by_date: true,
            },
        }
    }
}
