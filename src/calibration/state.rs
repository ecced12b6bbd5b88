use std::cmp::Ordering;

use crate::calibration::command::Command;
use crate::calibration::store::CalibrationRecord;
use crate::media::Timecode;
use crate::utils::error::Result;

const ROTATION_STEP: f32 = 0.1;

/// Offsets handed from one saved pair to the next fresh state, so a rig
/// whose cameras sit at a fixed misalignment does not have to be re-dialed
/// for every take. Start frames are never carried; they come from each
/// pair's own timecodes.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CarriedOffsets {
    pub x_offset: i32,
    pub y_offset: i32,
    pub rotation_global: f32,
    pub rotation_local: f32,
}

/// The preview-frame budget of one session: start frames may not pass it,
/// and seek may not push either side past it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    max_frames: u64,
}

impl Bounds {
    pub fn new(max_frames: u64) -> Self {
        Self { max_frames }
    }

    pub fn max_frames(&self) -> u64 {
        self.max_frames
    }
}

/// The in-memory calibration of one pair. Mutated only through `apply`;
/// persisted as two mirrored per-file records.
#[derive(Debug, Clone)]
pub struct AlignmentState {
    start_frame_left: u64,
    start_frame_right: u64,
    seek: u64,
    x_offset: i32,
    y_offset: i32,
    rotation_global: f32,
    rotation_local: f32,
    changed: bool,
    fresh: bool,
    seed_left: u64,
    seed_right: u64,
}

impl AlignmentState {
    /// Fresh state for an uncalibrated pair. The start-frame seed follows
    /// the historical tool: the side whose timecode is later takes the
    /// whole frame delta, the other side stays at zero.
    pub fn seeded(
        left_tc: &Timecode,
        right_tc: &Timecode,
        carried: CarriedOffsets,
    ) -> Result<Self> {
        let (seed_left, seed_right) = match left_tc.compare(right_tc)? {
            Ordering::Greater => (left_tc.delta(right_tc)?.frames(), 0),
            Ordering::Less => (0, right_tc.delta(left_tc)?.frames()),
            Ordering::Equal => (0, 0),
        };
        Ok(Self {
            start_frame_left: seed_left,
            start_frame_right: seed_right,
            seek: 0,
            x_offset: carried.x_offset,
            y_offset: carried.y_offset,
            rotation_global: carried.rotation_global,
            rotation_local: carried.rotation_local,
            changed: false,
            fresh: true,
            seed_left,
            seed_right,
        })
    }

    /// State restored from a stored record pair. The left record carries
    /// the canonical signs; the right record only contributes its own
    /// start frame.
    pub fn loaded(left: &CalibrationRecord, right: &CalibrationRecord) -> Self {
        Self {
            start_frame_left: left.start_frame,
            start_frame_right: right.start_frame,
            seek: 0,
            x_offset: left.x_offset,
            y_offset: left.y_offset,
            rotation_global: left.rotation_global,
            rotation_local: left.rotation_local,
            changed: false,
            fresh: false,
            seed_left: left.start_frame,
            seed_right: right.start_frame,
        }
    }

    pub fn start_frame_left(&self) -> u64 {
        self.start_frame_left
    }

    pub fn start_frame_right(&self) -> u64 {
        self.start_frame_right
    }

    pub fn seek(&self) -> u64 {
        self.seek
    }

    pub fn x_offset(&self) -> i32 {
        self.x_offset
    }

    pub fn y_offset(&self) -> i32 {
        self.y_offset
    }

    pub fn rotation_global(&self) -> f32 {
        self.rotation_global
    }

    pub fn rotation_local(&self) -> f32 {
        self.rotation_local
    }

    pub fn is_changed(&self) -> bool {
        self.changed
    }

    /// A fresh state is saved even untouched, so the seeded alignment
    /// becomes the stored baseline; a loaded state is only rewritten after
    /// an edit.
    pub fn should_persist(&self) -> bool {
        self.changed || self.fresh
    }

    pub fn apply(&mut self, command: Command, bounds: Bounds) {
        match command {
            Command::ShiftXNeg => self.x_offset -= 1,
            Command::ShiftXPos => self.x_offset += 1,
            Command::ShiftYNeg => self.y_offset -= 1,
            Command::ShiftYPos => self.y_offset += 1,
            Command::LeftStartBack => {
                self.start_frame_left = self.start_frame_left.saturating_sub(1)
            }
            Command::LeftStartForward => self.start_frame_left += 1,
            Command::RightStartBack => {
                self.start_frame_right = self.start_frame_right.saturating_sub(1)
            }
            Command::RightStartForward => self.start_frame_right += 1,
            Command::RotateGlobalNeg => self.rotation_global -= ROTATION_STEP,
            Command::RotateGlobalPos => self.rotation_global += ROTATION_STEP,
            Command::RotateLocalNeg => self.rotation_local -= ROTATION_STEP,
            Command::RotateLocalPos => self.rotation_local += ROTATION_STEP,
            Command::SeekBack => self.seek = self.seek.saturating_sub(1),
            Command::SeekForward => self.seek += 1,
            Command::Reset => {
                self.seek = 0;
                self.x_offset = 0;
                self.y_offset = 0;
                self.start_frame_left = self.seed_left;
                self.start_frame_right = self.seed_right;
            }
            Command::ToggleAnaglyph | Command::ToggleGrid | Command::NextPair | Command::Quit => {}
        }
        if command.edits_state() {
            self.changed = true;
        }
        self.clamp(bounds);
    }

    /// Reasserts every bound, not just the one the last command could have
    /// broken; the seek cap depends on both start frames, so clamping only
    /// on seek commands would leave stale values behind.
    pub fn clamp(&mut self, bounds: Bounds) {
        let max = bounds.max_frames();
        self.start_frame_left = self.start_frame_left.min(max);
        self.start_frame_right = self.start_frame_right.min(max);
        let seek_cap = (max - self.start_frame_left).min(max - self.start_frame_right);
        self.seek = self.seek.min(seek_cap);
    }

    /// The two on-disk records; the right file stores the complementary
    /// correction, so x/y and the local rotation flip sign while the shared
    /// horizon rotation is copied as-is.
    pub fn to_records(&self) -> (CalibrationRecord, CalibrationRecord) {
        let left = CalibrationRecord {
            start_frame: self.start_frame_left,
            x_offset: self.x_offset,
            y_offset: self.y_offset,
            rotation_global: self.rotation_global,
            rotation_local: self.rotation_local,
        };
        let right = CalibrationRecord {
            start_frame: self.start_frame_right,
            x_offset: -self.x_offset,
            y_offset: -self.y_offset,
            rotation_global: self.rotation_global,
            rotation_local: -self.rotation_local,
        };
        (left, right)
    }

    pub fn carried_offsets(&self) -> CarriedOffsets {
        CarriedOffsets {
            x_offset: self.x_offset,
            y_offset: self.y_offset,
            rotation_global: self.rotation_global,
            rotation_local: self.rotation_local,
        }
    }
}
