use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolsConfig {
    pub ffmpeg: String,
    pub ffprobe: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub show_timestamps: bool,
    pub colored_output: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairingConfig {
    /// Widest allowed wall-clock gap between the two cameras' file
    /// creation times.
    pub max_start_gap_seconds: f64,
    pub left_marker: String,
    pub right_marker: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewConfig {
    /// How many leading frames are decoded per eye for the interactive
    /// preview.
    pub frame_count: u32,
    /// Square edge length of each decoded preview frame.
    pub edge: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderConfig {
    pub encoder: String,
    pub crf: f32,
    pub preset: String,
    /// Square edge length of each eye in the merged output.
    pub eye_edge: u32,
    /// Re-project the stacked fisheye pair to equirectangular.
    pub dewarp: bool,
    /// Lens field of view fed to the dewarp projection.
    pub fov_degrees: f32,
    /// Place merged files into per-day subdirectories of the egress dir.
    pub organize_by_date: bool,
}
