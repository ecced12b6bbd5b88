pub mod error;
pub mod ffmpeg;
pub mod filesystem;
pub mod logging;
pub mod progress;

pub use error::{Error, Result};
pub use ffmpeg::FfmpegWrapper;
pub use filesystem::{find_video_files, format_file_size};
pub use logging::setup_logging;
