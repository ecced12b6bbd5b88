pub mod calibration;
pub mod cli;
pub mod config;
pub mod media;
pub mod pairing;
pub mod preview;
pub mod render;
pub mod utils;

pub use calibration::{AlignmentState, CalibrationRecord, CalibrationSession, SessionReport};
pub use config::Config;
pub use media::{FrameRate, MediaFile, Timecode};
pub use pairing::{MatchOutcome, VideoPair};
pub use render::{MergePlan, MergeReport};
pub use utils::{Error, FfmpegWrapper, Result};
