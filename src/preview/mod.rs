pub mod frames;
pub mod terminal;

pub use frames::{extract_preview, FrameSet};
pub use terminal::TerminalView;

use crate::calibration::command::Command;
use crate::calibration::state::{AlignmentState, Bounds};
use crate::utils::error::Result;

/// Display-only flags. Never persisted, reset for every pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayOptions {
    pub anaglyph: bool,
    pub show_grid: bool,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            anaglyph: true,
            show_grid: false,
        }
    }
}

/// Everything a view needs to draw one iteration: the numeric state, the
/// current frame of each eye, and the pair's labels.
pub struct SessionView<'a> {
    pub state: &'a AlignmentState,
    pub display: &'a DisplayOptions,
    pub bounds: Bounds,
    pub left_frame: &'a [u8],
    pub right_frame: &'a [u8],
    pub frame_edge: u32,
    pub left_name: &'a str,
    pub right_name: &'a str,
    pub pair_index: usize,
    pub pair_count: usize,
}

/// The interactive surface of a calibration session. `present` blocks until
/// the operator issues exactly one command.
pub trait CalibrationView {
    fn present(&mut self, view: &SessionView<'_>) -> Result<Command>;
}
