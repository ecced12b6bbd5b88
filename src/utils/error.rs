use std::path::Path;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("FFmpeg error: {message}")]
    Ffmpeg { message: String },

    #[error("Metadata error in {path}: {message}")]
    Metadata { path: String, message: String },

    #[error("Frame rate mismatch: {left} vs {right}")]
    RateMismatch { left: String, right: String },

    #[error("Calibration store error in {path}: {message}")]
    Store { path: String, message: String },

    #[error("Render error: {message}")]
    Render { message: String },

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Parse error: {message}")]
    Parse { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },
}

impl Error {
    pub fn ffmpeg<T: Into<String>>(message: T) -> Self {
        Self::Ffmpeg {
            message: message.into(),
        }
    }

    pub fn metadata<P: AsRef<Path>, T: Into<String>>(path: P, message: T) -> Self {
        Self::Metadata {
            path: path.as_ref().display().to_string(),
            message: message.into(),
        }
    }

    pub fn rate_mismatch<L: Into<String>, R: Into<String>>(left: L, right: R) -> Self {
        Self::RateMismatch {
            left: left.into(),
            right: right.into(),
        }
    }

    pub fn store<P: AsRef<Path>, T: Into<String>>(path: P, message: T) -> Self {
        Self::Store {
            path: path.as_ref().display().to_string(),
            message: message.into(),
        }
    }

    pub fn render<T: Into<String>>(message: T) -> Self {
        Self::Render {
            message: message.into(),
        }
    }

    pub fn parse<T: Into<String>>(message: T) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    pub fn validation<T: Into<String>>(message: T) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}
