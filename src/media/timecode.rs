use std::cmp::Ordering;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::media::rate::FrameRate;
use crate::utils::error::{Error, Result};

static TIMECODE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{2}):(\d{2}):(\d{2})([:;])(\d{2})$").unwrap());

/// A start-of-recording instant, counted in whole frames since 00:00:00:00 at
/// a fixed frame rate. Drop-frame timecodes (";" separator) are read with the
/// separator treated as plain punctuation; at the clip lengths this tool
/// handles the drift stays under a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timecode {
    total_frames: u64,
    rate: FrameRate,
}

impl Timecode {
    /// Parses "HH:MM:SS:FF" (or the ";" drop-frame variant) against the
    /// clip's frame rate.
    pub fn parse(raw: &str, rate: FrameRate) -> Result<Self> {
        let caps = TIMECODE_REGEX
            .captures(raw.trim())
            .ok_or_else(|| Error::parse(format!("Invalid timecode '{}'", raw)))?;

        let hours: u64 = caps[1].parse().map_err(|_| bad_field(raw))?;
        let minutes: u64 = caps[2].parse().map_err(|_| bad_field(raw))?;
        let seconds: u64 = caps[3].parse().map_err(|_| bad_field(raw))?;
        let frames: u64 = caps[5].parse().map_err(|_| bad_field(raw))?;

        if minutes > 59 || seconds > 59 {
            return Err(Error::parse(format!(
                "Timecode '{}' has out-of-range minutes or seconds",
                raw
            )));
        }
        let fps = rate.rounded() as u64;
        if frames >= fps {
            return Err(Error::parse(format!(
                "Timecode '{}' has frame field {} but rate {} only counts to {}",
                raw,
                frames,
                rate,
                fps - 1
            )));
        }

        let total_frames = (hours * 3600 + minutes * 60 + seconds) * fps + frames;
        Ok(Self { total_frames, rate })
    }

    pub fn from_total_frames(total_frames: u64, rate: FrameRate) -> Self {
        Self { total_frames, rate }
    }

    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    pub fn rate(&self) -> FrameRate {
        self.rate
    }

    pub fn advanced_by(&self, frames: u64) -> Self {
        Self {
            total_frames: self.total_frames + frames,
            rate: self.rate,
        }
    }

    pub fn to_seconds(&self) -> f64 {
        self.rate.frames_to_seconds(self.total_frames)
    }

    fn guard_rate(&self, other: &Timecode) -> Result<()> {
        if self.rate != other.rate {
            return Err(Error::rate_mismatch(
                self.rate.to_string(),
                other.rate.to_string(),
            ));
        }
        Ok(())
    }

    /// Absolute distance to another timecode of the same rate.
    pub fn delta(&self, other: &Timecode) -> Result<FrameDelta> {
        self.guard_rate(other)?;
        let frames = self.total_frames.abs_diff(other.total_frames);
        Ok(FrameDelta {
            frames,
            rate: self.rate,
        })
    }

    /// Ordering against another timecode of the same rate. Cross-rate
    /// comparison is refused rather than silently converted.
    pub fn compare(&self, other: &Timecode) -> Result<Ordering> {
        self.guard_rate(other)?;
        Ok(self.total_frames.cmp(&other.total_frames))
    }
}

impl fmt::Display for Timecode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fps = self.rate.rounded() as u64;
        let frames = self.total_frames % fps;
        let total_seconds = self.total_frames / fps;
        write!(
            f,
            "{:02}:{:02}:{:02}:{:02}",
            total_seconds / 3600,
            (total_seconds / 60) % 60,
            total_seconds % 60,
            frames
        )
    }
}

/// An unsigned distance between two timecodes, carrying the rate it was
/// measured at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameDelta {
    frames: u64,
    rate: FrameRate,
}

impl FrameDelta {
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.rate.frames_to_seconds(self.frames)
    }
}

impl fmt::Display for FrameDelta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} frames ({:.3}s)", self.frames, self.as_secs_f64())
    }
}

fn bad_field(raw: &str) -> Error {
    Error::parse(format!("Invalid timecode '{}'", raw))
}
