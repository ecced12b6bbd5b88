pub mod probe;
pub mod rate;
pub mod timecode;

pub use probe::{probe_file, ProbedMetadata};
pub use rate::FrameRate;
pub use timecode::{FrameDelta, Timecode};

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::utils::error::{Error, Result};

/// Which camera of the rig a file came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    /// Classifies by case-insensitive filename markers. A name that carries
    /// both markers, or neither, is ambiguous and yields `None`.
    pub fn detect(file_name: &str, left_marker: &str, right_marker: &str) -> Option<Side> {
        let name = file_name.to_lowercase();
        let has_left = name.contains(&left_marker.to_lowercase());
        let has_right = name.contains(&right_marker.to_lowercase());
        match (has_left, has_right) {
            (true, false) => Some(Side::Left),
            (false, true) => Some(Side::Right),
            _ => None,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Left => write!(f, "left"),
            Side::Right => write!(f, "right"),
        }
    }
}

/// A probed footage file with its identity facts resolved: eye side, start
/// timecode bound to the declared frame rate, wall-clock creation time.
#[derive(Debug, Clone)]
pub struct MediaFile {
    path: PathBuf,
    side: Option<Side>,
    creation_time: DateTime<Utc>,
    start_timecode: Timecode,
    duration_seconds: f64,
    frame_rate: FrameRate,
}

impl MediaFile {
    pub fn new(
        path: PathBuf,
        probed: ProbedMetadata,
        left_marker: &str,
        right_marker: &str,
    ) -> Result<Self> {
        let start_timecode = Timecode::parse(&probed.start_timecode, probed.frame_rate)
            .map_err(|e| Error::metadata(&path, format!("Bad start timecode: {}", e)))?;
        let side = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .and_then(|n| Side::detect(&n, left_marker, right_marker));
        Ok(Self {
            path,
            side,
            creation_time: probed.creation_time,
            start_timecode,
            duration_seconds: probed.duration_seconds,
            frame_rate: probed.frame_rate,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn display_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    pub fn side(&self) -> Option<Side> {
        self.side
    }

    pub fn creation_time(&self) -> DateTime<Utc> {
        self.creation_time
    }

    pub fn start_timecode(&self) -> Timecode {
        self.start_timecode
    }

    pub fn duration_seconds(&self) -> f64 {
        self.duration_seconds
    }

    pub fn frame_rate(&self) -> FrameRate {
        self.frame_rate
    }

    pub fn duration_frames(&self) -> u64 {
        self.frame_rate.seconds_to_frames(self.duration_seconds)
    }
}
