use std::fmt;
use std::path::PathBuf;

use tracing::{info, warn};

use crate::config::PairingConfig;
use crate::media::{FrameRate, MediaFile, Side};

/// A matched left/right recording of the same take. Construction guarantees
/// opposite sides, a shared frame rate and a creation-time gap within the
/// configured bound.
#[derive(Debug, Clone)]
pub struct VideoPair {
    left: MediaFile,
    right: MediaFile,
}

impl VideoPair {
    pub fn left(&self) -> &MediaFile {
        &self.left
    }

    pub fn right(&self) -> &MediaFile {
        &self.right
    }

    pub fn frame_rate(&self) -> FrameRate {
        self.left.frame_rate()
    }

    /// The shared frame budget: no start frame or seek may pass the shorter
    /// clip's end.
    pub fn max_frames(&self) -> u64 {
        self.left.duration_frames().min(self.right.duration_frames())
    }

    pub fn label(&self) -> String {
        format!("{} + {}", self.left.display_name(), self.right.display_name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// Filename carries both side markers or neither.
    AmbiguousSide,
    /// Both files of the candidate came from the same camera.
    SameSide(Side),
    /// Creation times are further apart than the configured gap.
    StartGapTooLarge { gap_seconds: f64, max_seconds: f64 },
    /// The two files declare different frame rates.
    RateMismatch { left: String, right: String },
    /// Odd file at the end of the scan with no partner left.
    TrailingUnpaired,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::AmbiguousSide => {
                write!(f, "filename does not identify exactly one side")
            }
            SkipReason::SameSide(side) => {
                write!(f, "both candidate files are {} side", side)
            }
            SkipReason::StartGapTooLarge {
                gap_seconds,
                max_seconds,
            } => write!(
                f,
                "creation times {:.1}s apart (max {:.1}s)",
                gap_seconds, max_seconds
            ),
            SkipReason::RateMismatch { left, right } => {
                write!(f, "frame rates differ: {} vs {}", left, right)
            }
            SkipReason::TrailingUnpaired => write!(f, "no partner file left in the scan"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: SkipReason,
}

#[derive(Debug, Default)]
pub struct MatchOutcome {
    pub pairs: Vec<VideoPair>,
    pub skipped: Vec<SkippedFile>,
}

impl MatchOutcome {
    fn skip(&mut self, file: &MediaFile, reason: SkipReason) {
        warn!("Skipping {}: {}", file.display_name(), reason);
        self.skipped.push(SkippedFile {
            path: file.path().to_path_buf(),
            reason,
        });
    }
}

/// Matches side-classified files into pairs by scanning adjacent entries of
/// the creation-time order. Each file lands in at most one candidate pair;
/// a rejected candidate rejects both of its files rather than re-entering
/// them into the scan.
pub fn match_pairs(files: Vec<MediaFile>, config: &PairingConfig) -> MatchOutcome {
    let mut outcome = MatchOutcome::default();

    let mut sided: Vec<MediaFile> = Vec::with_capacity(files.len());
    for file in files {
        if file.side().is_some() {
            sided.push(file);
        } else {
            outcome.skip(&file, SkipReason::AmbiguousSide);
        }
    }

    sided.sort_by(|a, b| {
        a.creation_time()
            .cmp(&b.creation_time())
            .then_with(|| a.path().cmp(b.path()))
    });

    for candidate in sided.chunks(2) {
        match candidate {
            [a, b] => {
                if let Some(reason) = reject_candidate(a, b, config) {
                    outcome.skip(a, reason.clone());
                    outcome.skip(b, reason);
                    continue;
                }
                let (left, right) = if a.side() == Some(Side::Left) {
                    (a.clone(), b.clone())
                } else {
                    (b.clone(), a.clone())
                };
                info!(
                    "Paired {} + {} (gap {:.1}s)",
                    left.display_name(),
                    right.display_name(),
                    gap_seconds(&left, &right)
                );
                outcome.pairs.push(VideoPair { left, right });
            }
            [last] => outcome.skip(last, SkipReason::TrailingUnpaired),
            _ => unreachable!("chunks(2) yields one or two files"),
        }
    }

    info!(
        "Matched {} pair(s), skipped {} file(s)",
        outcome.pairs.len(),
        outcome.skipped.len()
    );
    outcome
}

fn gap_seconds(a: &MediaFile, b: &MediaFile) -> f64 {
    let gap = a.creation_time() - b.creation_time();
    (gap.num_milliseconds() as f64 / 1000.0).abs()
}

fn reject_candidate(a: &MediaFile, b: &MediaFile, config: &PairingConfig) -> Option<SkipReason> {
    if a.side() == b.side() {
        // side() is Some for every file that reaches the scan
        return a.side().map(SkipReason::SameSide);
    }
    let gap = gap_seconds(a, b);
    if gap > config.max_start_gap_seconds {
        return Some(SkipReason::StartGapTooLarge {
            gap_seconds: gap,
            max_seconds: config.max_start_gap_seconds,
        });
    }
    if a.frame_rate() != b.frame_rate() {
        return Some(SkipReason::RateMismatch {
            left: a.frame_rate().to_string(),
            right: b.frame_rate().to_string(),
        });
    }
    None
}
