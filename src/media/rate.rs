use std::fmt;

use crate::utils::error::{Error, Result};

/// Frame rate kept as an exact rational so NTSC rates (30000/1001) never
/// drift through float arithmetic. Stored reduced, denominator never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameRate {
    num: u32,
    den: u32,
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a
}

impl FrameRate {
    pub fn new(num: u32, den: u32) -> Result<Self> {
        if num == 0 || den == 0 {
            return Err(Error::parse(format!(
                "Frame rate must be positive, got {}/{}",
                num, den
            )));
        }
        let g = gcd(num as u64, den as u64) as u32;
        Ok(Self {
            num: num / g,
            den: den / g,
        })
    }

    /// Parses ffprobe rate strings: "30000/1001", "25", "29.97".
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if let Some((num, den)) = raw.split_once('/') {
            let num: u32 = num
                .trim()
                .parse()
                .map_err(|_| Error::parse(format!("Invalid frame rate '{}'", raw)))?;
            let den: u32 = den
                .trim()
                .parse()
                .map_err(|_| Error::parse(format!("Invalid frame rate '{}'", raw)))?;
            return Self::new(num, den);
        }
        if let Some((whole, frac)) = raw.split_once('.') {
            if frac.is_empty() || frac.len() > 6 || !frac.bytes().all(|b| b.is_ascii_digit()) {
                return Err(Error::parse(format!("Invalid frame rate '{}'", raw)));
            }
            let whole: u64 = whole
                .parse()
                .map_err(|_| Error::parse(format!("Invalid frame rate '{}'", raw)))?;
            let frac_value: u64 = frac
                .parse()
                .map_err(|_| Error::parse(format!("Invalid frame rate '{}'", raw)))?;
            let den = 10u64.pow(frac.len() as u32);
            let num = whole * den + frac_value;
            if num > u32::MAX as u64 {
                return Err(Error::parse(format!("Frame rate '{}' out of range", raw)));
            }
            return Self::new(num as u32, den as u32);
        }
        let num: u32 = raw
            .parse()
            .map_err(|_| Error::parse(format!("Invalid frame rate '{}'", raw)))?;
        Self::new(num, 1)
    }

    pub fn num(&self) -> u32 {
        self.num
    }

    pub fn den(&self) -> u32 {
        self.den
    }

    /// Nearest-integer frames per second, the base used for timecode math.
    pub fn rounded(&self) -> u32 {
        ((self.num as u64 + self.den as u64 / 2) / self.den as u64) as u32
    }

    pub fn as_f64(&self) -> f64 {
        self.num as f64 / self.den as f64
    }

    /// Converts a frame count into seconds by rational division, so
    /// 30000 frames at 30000/1001 come out as exactly 1001 seconds.
    pub fn frames_to_seconds(&self, frames: u64) -> f64 {
        (frames as f64 * self.den as f64) / self.num as f64
    }

    pub fn seconds_to_frames(&self, seconds: f64) -> u64 {
        (seconds * self.num as f64 / self.den as f64).round() as u64
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.den == 1 {
            write!(f, "{}", self.num)
        } else {
            write!(f, "{}/{}", self.num, self.den)
        }
    }
}
