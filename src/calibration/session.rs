use tracing::{debug, info, warn};

use crate::calibration::command::Command;
use crate::calibration::state::{AlignmentState, Bounds, CarriedOffsets};
use crate::calibration::store::{self, CalibrationRecord};
use crate::config::Config;
use crate::pairing::VideoPair;
use crate::preview::frames::{extract_preview, FrameSet};
use crate::preview::{CalibrationView, DisplayOptions, SessionView};
use crate::utils::error::{Error, Result};
use crate::utils::ffmpeg::FfmpegWrapper;

/// How one pair's editing loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// Move on to the next pair, persisting first if the state warrants it.
    Advance,
    /// Abort the whole batch without persisting anything.
    QuitAll,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub calibrated: usize,
    pub saved: usize,
    pub skipped_existing: usize,
    pub failed: usize,
    pub aborted: bool,
}

/// Labels shown by the view for one pair.
#[derive(Debug, Clone)]
pub struct PairContext {
    pub left_name: String,
    pub right_name: String,
    pub index: usize,
    pub total: usize,
}

/// Walks the matched pairs, running the interactive loop for each one.
/// Preview frames are scoped to the pair being edited; nothing is retained
/// across pairs except the carried offsets.
pub struct CalibrationSession<'a, V: CalibrationView> {
    ffmpeg: &'a FfmpegWrapper,
    config: &'a Config,
    view: V,
    skip_calibrated: bool,
}

impl<'a, V: CalibrationView> CalibrationSession<'a, V> {
    pub fn new(ffmpeg: &'a FfmpegWrapper, config: &'a Config, view: V, skip_calibrated: bool) -> Self {
        Self {
            ffmpeg,
            config,
            view,
            skip_calibrated,
        }
    }

    pub async fn run(&mut self, pairs: &[VideoPair]) -> Result<SessionReport> {
        let mut report = SessionReport::default();
        let mut carried = CarriedOffsets::default();

        for (index, pair) in pairs.iter().enumerate() {
            info!(
                "Calibrating pair {}/{}: {}",
                index + 1,
                pairs.len(),
                pair.label()
            );

            // A malformed or half-present store aborts the batch; guessing
            // here could overwrite a previously good calibration.
            let existing = load_pair_records(pair)?;
            if self.skip_calibrated && existing.is_some() {
                info!("Skipping {}: calibration already stored", pair.label());
                report.skipped_existing += 1;
                continue;
            }

            let mut state = match existing {
                Some((left, right)) => AlignmentState::loaded(&left, &right),
                None => AlignmentState::seeded(
                    &pair.left().start_timecode(),
                    &pair.right().start_timecode(),
                    carried,
                )?,
            };

            let frames = match self.extract_pair_frames(pair).await {
                Ok(frames) => frames,
                Err(e) => {
                    warn!("Skipping {}: {}", pair.label(), e);
                    report.failed += 1;
                    continue;
                }
            };
            let (left_frames, right_frames) = frames;
            let bounds = Bounds::new(left_frames.len().min(right_frames.len()));
            state.clamp(bounds);

            let context = PairContext {
                left_name: pair.left().display_name(),
                right_name: pair.right().display_name(),
                index: index + 1,
                total: pairs.len(),
            };
            let mut display = DisplayOptions::default();
            let exit = run_edit_loop(
                &mut self.view,
                &mut state,
                &mut display,
                bounds,
                &left_frames,
                &right_frames,
                &context,
            )?;

            match exit {
                LoopExit::QuitAll => {
                    info!("Quit; nothing persisted for {} or later pairs", pair.label());
                    report.aborted = true;
                    return Ok(report);
                }
                LoopExit::Advance => {
                    report.calibrated += 1;
                    if persist_pair(pair, &state)? {
                        report.saved += 1;
                        info!("Saved calibration for {}", pair.label());
                    } else {
                        debug!("No changes to persist for {}", pair.label());
                    }
                    carried = state.carried_offsets();
                }
            }
        }

        Ok(report)
    }

    async fn extract_pair_frames(&self, pair: &VideoPair) -> Result<(FrameSet, FrameSet)> {
        let left = extract_preview(self.ffmpeg, pair.left().path(), &self.config.preview).await?;
        let right = extract_preview(self.ffmpeg, pair.right().path(), &self.config.preview).await?;
        if left.is_empty() || right.is_empty() {
            return Err(Error::ffmpeg(format!(
                "No preview frames decoded for {}",
                pair.label()
            )));
        }
        Ok((left, right))
    }
}

/// Both sidecars or neither; exactly one present means the pair's store is
/// inconsistent and the batch must stop.
fn load_pair_records(
    pair: &VideoPair,
) -> Result<Option<(CalibrationRecord, CalibrationRecord)>> {
    let left = store::load(pair.left().path())?;
    let right = store::load(pair.right().path())?;
    match (left, right) {
        (Some(left), Some(right)) => Ok(Some((left, right))),
        (None, None) => Ok(None),
        (Some(_), None) => Err(Error::store(
            store::sidecar_path(pair.right().path()),
            "Record missing while its partner's record exists",
        )),
        (None, Some(_)) => Err(Error::store(
            store::sidecar_path(pair.left().path()),
            "Record missing while its partner's record exists",
        )),
    }
}

/// Writes both mirrored records if the state calls for persistence.
/// Returns whether anything was written.
pub(crate) fn persist_pair(pair: &VideoPair, state: &AlignmentState) -> Result<bool> {
    if !state.should_persist() {
        return Ok(false);
    }
    let (left_record, right_record) = state.to_records();
    store::save(pair.left().path(), &left_record)?;
    store::save(pair.right().path(), &right_record)?;
    Ok(true)
}

/// The blocking command-at-a-time loop for one pair. Each iteration shows
/// the current state and waits for exactly one command.
pub(crate) fn run_edit_loop<V: CalibrationView>(
    view: &mut V,
    state: &mut AlignmentState,
    display: &mut DisplayOptions,
    bounds: Bounds,
    left_frames: &FrameSet,
    right_frames: &FrameSet,
    context: &PairContext,
) -> Result<LoopExit> {
    loop {
        let session_view = SessionView {
            state,
            display,
            bounds,
            left_frame: left_frames.frame(state.start_frame_left() + state.seek()),
            right_frame: right_frames.frame(state.start_frame_right() + state.seek()),
            frame_edge: left_frames.edge(),
            left_name: &context.left_name,
            right_name: &context.right_name,
            pair_index: context.index,
            pair_count: context.total,
        };
        let command = view.present(&session_view)?;

        match command {
            Command::NextPair => return Ok(LoopExit::Advance),
            Command::Quit => return Ok(LoopExit::QuitAll),
            Command::ToggleAnaglyph => display.anaglyph = !display.anaglyph,
            Command::ToggleGrid => display.show_grid = !display.show_grid,
            edit => state.apply(edit, bounds),
        }
        // Bounds hold after every command, not only the ones that move
        // frame positions.
        state.clamp(bounds);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{FrameRate, MediaFile, ProbedMetadata, Timecode};
    use chrono::{DateTime, Utc};
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    /// Feeds a fixed command script and records what it was shown.
    struct ScriptedView {
        script: Vec<Command>,
        cursor: usize,
        seen_left_first_bytes: Vec<u8>,
        seen_frame_lens: Vec<usize>,
    }

    impl ScriptedView {
        fn new(script: Vec<Command>) -> Self {
            Self {
                script,
                cursor: 0,
                seen_left_first_bytes: Vec::new(),
                seen_frame_lens: Vec::new(),
            }
        }
    }

    impl CalibrationView for ScriptedView {
        fn present(&mut self, view: &SessionView<'_>) -> Result<Command> {
            self.seen_left_first_bytes.push(view.left_frame[0]);
            self.seen_frame_lens.push(view.left_frame.len());
            let command = self.script[self.cursor];
            self.cursor += 1;
            Ok(command)
        }
    }

    fn tc(raw: &str) -> Timecode {
        Timecode::parse(raw, FrameRate::parse("25").unwrap()).unwrap()
    }

    fn fresh_state() -> AlignmentState {
        AlignmentState::seeded(&tc("10:00:00:00"), &tc("10:00:00:00"), CarriedOffsets::default())
            .unwrap()
    }

    /// Four 2x2 frames whose bytes are all 0, 1, 2, 3 respectively.
    fn numbered_frames() -> FrameSet {
        let mut data = Vec::new();
        for frame in 0u8..4 {
            data.extend(std::iter::repeat(frame).take(12));
        }
        FrameSet::from_raw(2, data)
    }

    fn context() -> PairContext {
        PairContext {
            left_name: "a_left.mp4".to_string(),
            right_name: "a_right.mp4".to_string(),
            index: 1,
            total: 1,
        }
    }

    fn run_script(script: Vec<Command>, state: &mut AlignmentState) -> (ScriptedView, DisplayOptions, LoopExit) {
        let mut view = ScriptedView::new(script);
        let mut display = DisplayOptions::default();
        let left = numbered_frames();
        let right = numbered_frames();
        let exit = run_edit_loop(
            &mut view,
            state,
            &mut display,
            Bounds::new(4),
            &left,
            &right,
            &context(),
        )
        .unwrap();
        (view, display, exit)
    }

    #[test]
    fn test_edits_accumulate_until_advance() {
        let mut state = fresh_state();
        let (_, _, exit) = run_script(
            vec![
                Command::ShiftXPos,
                Command::ShiftXPos,
                Command::ShiftYNeg,
                Command::NextPair,
            ],
            &mut state,
        );
        assert_eq!(exit, LoopExit::Advance);
        assert_eq!(state.x_offset(), 2);
        assert_eq!(state.y_offset(), -1);
        assert!(state.is_changed());
    }

    #[test]
    fn test_quit_exits_immediately() {
        let mut state = fresh_state();
        let (view, _, exit) = run_script(vec![Command::Quit], &mut state);
        assert_eq!(exit, LoopExit::QuitAll);
        assert_eq!(view.cursor, 1);
        assert!(!state.is_changed());
    }

    #[test]
    fn test_toggles_flip_display_only() {
        let mut state = fresh_state();
        let (_, display, _) = run_script(
            vec![Command::ToggleAnaglyph, Command::ToggleGrid, Command::NextPair],
            &mut state,
        );
        assert!(!display.anaglyph);
        assert!(display.show_grid);
        assert!(!state.is_changed());
    }

    #[test]
    fn test_view_sees_the_seeked_frame() {
        let mut state = fresh_state();
        let (view, _, _) = run_script(
            vec![Command::SeekForward, Command::SeekForward, Command::NextPair],
            &mut state,
        );
        // Frame index follows start_frame + seek as the script advances.
        assert_eq!(view.seen_left_first_bytes, vec![0, 1, 2]);
        assert_eq!(view.seen_frame_lens, vec![12, 12, 12]);
    }

    #[test]
    fn test_view_sees_start_frame_plus_seek() {
        let mut state = fresh_state();
        let (view, _, _) = run_script(
            vec![
                Command::LeftStartForward,
                Command::SeekForward,
                Command::NextPair,
            ],
            &mut state,
        );
        assert_eq!(view.seen_left_first_bytes, vec![0, 1, 2]);
    }

    fn media(name: &str, tc: &str, dir: &tempfile::TempDir) -> MediaFile {
        let probed = ProbedMetadata {
            creation_time: DateTime::parse_from_rfc3339("2024-03-09T14:23:11Z")
                .unwrap()
                .with_timezone(&Utc),
            start_timecode: tc.to_string(),
            duration_seconds: 60.0,
            frame_rate: FrameRate::parse("25").unwrap(),
        };
        MediaFile::new(dir.path().join(name), probed, "left", "right").unwrap()
    }

    fn pair_in(dir: &tempfile::TempDir) -> VideoPair {
        let files = vec![
            media("a_left.mp4", "10:00:00:00", dir),
            media("a_right.mp4", "10:00:00:00", dir),
        ];
        let config = crate::config::PairingConfig {
            max_start_gap_seconds: 5.0,
            left_marker: "left".to_string(),
            right_marker: "right".to_string(),
        };
        crate::pairing::match_pairs(files, &config).pairs.remove(0)
    }

    #[test]
    fn test_persist_pair_writes_mirrored_records() {
        let dir = tempfile::TempDir::new().unwrap();
        let pair = pair_in(&dir);
        let mut state = fresh_state();
        let bounds = Bounds::new(30);
        for _ in 0..5 {
            state.apply(Command::ShiftXPos, bounds);
        }
        state.apply(Command::ShiftYNeg, bounds);

        assert!(persist_pair(&pair, &state).unwrap());
        let left = store::load(pair.left().path()).unwrap().unwrap();
        let right = store::load(pair.right().path()).unwrap().unwrap();
        assert_eq!(left.x_offset, 5);
        assert_eq!(right.x_offset, -5);
        assert_eq!(left.y_offset, -1);
        assert_eq!(right.y_offset, 1);
    }

    #[test]
    fn test_persist_pair_skips_clean_loaded_state() {
        let dir = tempfile::TempDir::new().unwrap();
        let pair = pair_in(&dir);
        let record = CalibrationRecord {
            start_frame: 3,
            x_offset: 1,
            y_offset: 1,
            rotation_global: 0.0,
            rotation_local: 0.0,
        };
        let state = AlignmentState::loaded(&record, &record);
        assert!(!persist_pair(&pair, &state).unwrap());
        assert_eq!(store::load(pair.left().path()).unwrap(), None);
    }

    #[test]
    fn test_fresh_untouched_state_is_persisted() {
        let dir = tempfile::TempDir::new().unwrap();
        let pair = pair_in(&dir);
        let state = fresh_state();
        assert!(persist_pair(&pair, &state).unwrap());
        assert!(store::load(pair.left().path()).unwrap().is_some());
    }

    #[test]
    fn test_one_sided_store_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let pair = pair_in(&dir);
        store::save(
            pair.left().path(),
            &CalibrationRecord {
                start_frame: 0,
                x_offset: 0,
                y_offset: 0,
                rotation_global: 0.0,
                rotation_local: 0.0,
            },
        )
        .unwrap();
        assert!(matches!(
            load_pair_records(&pair),
            Err(Error::Store { .. })
        ));
    }

    #[test]
    fn test_both_records_load_as_state() {
        let dir = tempfile::TempDir::new().unwrap();
        let pair = pair_in(&dir);
        let left = CalibrationRecord {
            start_frame: 2,
            x_offset: 3,
            y_offset: -1,
            rotation_global: 0.5,
            rotation_local: 0.2,
        };
        let right = CalibrationRecord {
            start_frame: 6,
            x_offset: -3,
            y_offset: 1,
            rotation_global: 0.5,
            rotation_local: -0.2,
        };
        store::save(pair.left().path(), &left).unwrap();
        store::save(pair.right().path(), &right).unwrap();
        let (l, r) = load_pair_records(&pair).unwrap().unwrap();
        let state = AlignmentState::loaded(&l, &r);
        assert_eq!(state.start_frame_left(), 2);
        assert_eq!(state.start_frame_right(), 6);
        assert_eq!(state.x_offset(), 3);
        assert!(!state.should_persist());
    }
}
