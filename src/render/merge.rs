use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::calibration::store::{self, CalibrationRecord};
use crate::config::Config;
use crate::media::MediaFile;
use crate::pairing::VideoPair;
use crate::render::filters::build_filter_graph;
use crate::utils::error::{Error, Result};
use crate::utils::ffmpeg::{tail_lines, FfmpegWrapper};
use crate::utils::filesystem::{ensure_output_dir, unique_output_path};
use crate::utils::progress::ProgressMonitor;

/// Where a pair's alignment came from when the merge was planned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordSource {
    /// Both sidecar records existed and were loaded.
    Calibrated,
    /// No records; alignment synthesized from the start timecodes alone.
    TimecodeOnly,
}

/// A fully resolved merge of one pair: per-eye records and seeks, output
/// length, and the timecode the output gets stamped with.
#[derive(Debug, Clone)]
pub struct MergePlan {
    pub left_record: CalibrationRecord,
    pub right_record: CalibrationRecord,
    pub source: RecordSource,
    pub seek_left_secs: f64,
    pub seek_right_secs: f64,
    pub duration_secs: f64,
    pub output_timecode: String,
    pub file_stem: String,
    pub date_folder: Option<String>,
}

#[derive(Debug, Default)]
pub struct MergeReport {
    pub rendered: Vec<PathBuf>,
    pub skipped: usize,
    pub failed: usize,
}

/// Renders every pair into the egress directory. Missing records fall back
/// to timecode alignment with a warning; a malformed or one-sided record
/// set stops the whole batch.
pub async fn run_merge(
    ffmpeg: &FfmpegWrapper,
    config: &Config,
    pairs: &[VideoPair],
    egress: &Path,
) -> Result<MergeReport> {
    let mut report = MergeReport::default();

    for pair in pairs {
        let (left_record, right_record, source) = resolve_records(pair)?;
        if source == RecordSource::TimecodeOnly {
            warn!(
                "No calibration records for {}; aligning by start timecode only",
                pair.label()
            );
        }

        let plan = match plan_merge(pair, left_record, right_record, source, config) {
            Ok(plan) => plan,
            Err(e) => {
                warn!("Skipping {}: {}", pair.label(), e);
                report.skipped += 1;
                continue;
            }
        };

        match render_pair(ffmpeg, config, pair, &plan, egress).await {
            Ok(output) => {
                info!("Rendered {}", output.display());
                report.rendered.push(output);
            }
            Err(e) => {
                warn!("Merge failed for {}: {}", pair.label(), e);
                report.failed += 1;
            }
        }
    }

    info!(
        "Merge finished: {} rendered, {} skipped, {} failed",
        report.rendered.len(),
        report.skipped,
        report.failed
    );
    Ok(report)
}

/// Loads the pair's sidecar records. Exactly one record existing is refused
/// rather than half-guessed, since rendering with one calibrated eye and one
/// default eye would silently produce a skewed output.
pub fn resolve_records(
    pair: &VideoPair,
) -> Result<(CalibrationRecord, CalibrationRecord, RecordSource)> {
    let left = store::load(pair.left().path())?;
    let right = store::load(pair.right().path())?;

    match (left, right) {
        (Some(left), Some(right)) => Ok((left, right, RecordSource::Calibrated)),
        (None, None) => {
            let (left, right) = synthesized_records(pair)?;
            Ok((left, right, RecordSource::TimecodeOnly))
        }
        (Some(_), None) => Err(one_sided(pair.left(), pair.right())),
        (None, Some(_)) => Err(one_sided(pair.right(), pair.left())),
    }
}

fn one_sided(with_record: &MediaFile, without: &MediaFile) -> Error {
    Error::store(
        store::sidecar_path(with_record.path()),
        format!(
            "{} has a calibration record but {} does not; calibrate the pair or remove the record",
            with_record.display_name(),
            without.display_name()
        ),
    )
}

/// Timecode-only alignment: the merged clip starts at the later of the two
/// start timecodes, so the earlier-starting side skips the frames recorded
/// before its partner was rolling.
fn synthesized_records(pair: &VideoPair) -> Result<(CalibrationRecord, CalibrationRecord)> {
    let left_tc = pair.left().start_timecode();
    let right_tc = pair.right().start_timecode();
    let clip_start = match left_tc.compare(&right_tc)? {
        Ordering::Less => right_tc,
        _ => left_tc,
    };
    Ok((
        timecode_only_record(clip_start.delta(&left_tc)?.frames()),
        timecode_only_record(clip_start.delta(&right_tc)?.frames()),
    ))
}

fn timecode_only_record(start_frame: u64) -> CalibrationRecord {
    CalibrationRecord {
        start_frame,
        x_offset: 0,
        y_offset: 0,
        rotation_global: 0.0,
        rotation_local: 0.0,
    }
}

/// Resolves records into concrete seeks and an output length. The output
/// covers the footage both eyes still have after their seeks; a pair with
/// nothing left in common is refused.
pub fn plan_merge(
    pair: &VideoPair,
    left_record: CalibrationRecord,
    right_record: CalibrationRecord,
    source: RecordSource,
    config: &Config,
) -> Result<MergePlan> {
    let rate = pair.frame_rate();

    let remaining_left = pair
        .left()
        .duration_frames()
        .saturating_sub(left_record.start_frame);
    let remaining_right = pair
        .right()
        .duration_frames()
        .saturating_sub(right_record.start_frame);
    let overlap_frames = remaining_left.min(remaining_right);
    if overlap_frames == 0 {
        return Err(Error::render(format!(
            "no overlapping footage between {} and {} after alignment",
            pair.left().display_name(),
            pair.right().display_name()
        )));
    }

    let output_timecode = pair
        .left()
        .start_timecode()
        .advanced_by(left_record.start_frame)
        .to_string();

    let file_stem = merge_stem(pair.left(), &config.pairing.left_marker);
    let date_folder = if config.render.organize_by_date {
        Some(
            pair.left()
                .creation_time()
                .format("%Y-%m-%d")
                .to_string(),
        )
    } else {
        None
    };

    Ok(MergePlan {
        seek_left_secs: rate.frames_to_seconds(left_record.start_frame),
        seek_right_secs: rate.frames_to_seconds(right_record.start_frame),
        duration_secs: rate.frames_to_seconds(overlap_frames),
        left_record,
        right_record,
        source,
        output_timecode,
        file_stem,
        date_folder,
    })
}

/// Output stem derived from the left file's name with its side marker
/// removed, so "take1_left" renders as "take1_<uuid>.mp4".
fn merge_stem(left: &MediaFile, left_marker: &str) -> String {
    let stem = left
        .path()
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string());

    let cleaned = match find_ignore_ascii_case(&stem, left_marker) {
        Some(at) => {
            let mut out = String::new();
            out.push_str(&stem[..at]);
            out.push_str(&stem[at + left_marker.len()..]);
            out.trim_matches(|c: char| matches!(c, '_' | '-' | '.' | ' '))
                .to_string()
        }
        None => stem,
    };

    if cleaned.is_empty() {
        "output".to_string()
    } else {
        cleaned
    }
}

/// Byte offset of an ASCII-case-insensitive match. An ASCII needle can never
/// match inside a multi-byte character, so the offset is splice-safe.
fn find_ignore_ascii_case(haystack: &str, needle: &str) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack
        .as_bytes()
        .windows(needle.len())
        .position(|window| window.eq_ignore_ascii_case(needle.as_bytes()))
}

pub fn resolve_output_path(egress: &Path, plan: &MergePlan) -> PathBuf {
    let dir = match &plan.date_folder {
        Some(folder) => egress.join(folder),
        None => egress.to_path_buf(),
    };
    unique_output_path(&dir, &plan.file_stem)
}

/// The full argument vector for one merge. Seeks sit before their inputs so
/// ffmpeg seeks by index instead of decoding up to the cut.
pub fn build_merge_args(
    pair: &VideoPair,
    plan: &MergePlan,
    config: &Config,
    output_path: &Path,
) -> Vec<String> {
    let graph = build_filter_graph(&plan.left_record, &plan.right_record, &config.render);

    let mut args = vec![
        "-ss".to_string(),
        format!("{:.6}", plan.seek_left_secs),
        "-i".to_string(),
        pair.left().path().display().to_string(),
        "-ss".to_string(),
        format!("{:.6}", plan.seek_right_secs),
        "-i".to_string(),
        pair.right().path().display().to_string(),
    ];

    args.extend(graph.build_ffmpeg_args());

    // Audio rides along from the left camera when it recorded any.
    args.extend(vec![
        "-map".to_string(),
        "0:a?".to_string(),
        "-c:a".to_string(),
        "copy".to_string(),
    ]);

    args.extend(vec![
        "-c:v".to_string(),
        config.render.encoder.clone(),
        "-crf".to_string(),
        config.render.crf.to_string(),
        "-preset".to_string(),
        config.render.preset.clone(),
        "-t".to_string(),
        format!("{:.6}", plan.duration_secs),
        "-metadata".to_string(),
        format!("timecode={}", plan.output_timecode),
        "-movflags".to_string(),
        "+faststart".to_string(),
        "-progress".to_string(),
        "pipe:1".to_string(),
        "-nostats".to_string(),
        output_path.display().to_string(),
    ]);

    args
}

async fn render_pair(
    ffmpeg: &FfmpegWrapper,
    config: &Config,
    pair: &VideoPair,
    plan: &MergePlan,
    egress: &Path,
) -> Result<PathBuf> {
    let output_path = resolve_output_path(egress, plan);
    ensure_output_dir(&output_path)?;

    let args = build_merge_args(pair, plan, config, &output_path);

    info!(
        "Merging {} ({:.1}s from timecode {})",
        pair.label(),
        plan.duration_secs,
        plan.output_timecode
    );

    let child = ffmpeg.start_render(args).await?;
    let mut monitor = ProgressMonitor::new(
        plan.duration_secs,
        pair.frame_rate().as_f64(),
        &plan.file_stem,
    );
    let outcome = monitor.monitor_render(child).await?;

    if !outcome.status.success() {
        return Err(Error::render(format!(
            "ffmpeg exited with {}: {}",
            outcome.status,
            tail_lines(&outcome.stderr, 12)
        )));
    }

    Ok(output_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PairingConfig;
    use crate::media::{FrameRate, ProbedMetadata};
    use crate::pairing::match_pairs;
    use chrono::{DateTime, Duration, Utc};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn base_time() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-03-09T14:23:11Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn media(dir: &TempDir, name: &str, tc: &str, offset_secs: i64) -> MediaFile {
        let probed = ProbedMetadata {
            creation_time: base_time() + Duration::seconds(offset_secs),
            start_timecode: tc.to_string(),
            duration_seconds: 60.0,
            frame_rate: FrameRate::parse("25").unwrap(),
        };
        MediaFile::new(dir.path().join(name), probed, "left", "right").unwrap()
    }

    fn pair(dir: &TempDir, left_tc: &str, right_tc: &str) -> VideoPair {
        let files = vec![
            media(dir, "take1_left.mp4", left_tc, 0),
            media(dir, "take1_right.mp4", right_tc, 1),
        ];
        let pairing = PairingConfig {
            max_start_gap_seconds: 5.0,
            left_marker: "left".to_string(),
            right_marker: "right".to_string(),
        };
        let mut outcome = match_pairs(files, &pairing);
        outcome.pairs.remove(0)
    }

    fn record(start: u64) -> CalibrationRecord {
        CalibrationRecord {
            start_frame: start,
            x_offset: 0,
            y_offset: 0,
            rotation_global: 0.0,
            rotation_local: 0.0,
        }
    }

    #[test]
    fn test_synthesized_alignment_seeks_the_earlier_side() {
        let dir = TempDir::new().unwrap();
        // Left started one second before right; it skips 25 frames.
        let pair = pair(&dir, "10:00:00:00", "10:00:01:00");
        let (left, right, source) = resolve_records(&pair).unwrap();
        assert_eq!(source, RecordSource::TimecodeOnly);
        assert_eq!(left.start_frame, 25);
        assert_eq!(right.start_frame, 0);
        assert_eq!(left.x_offset, 0);
    }

    #[test]
    fn test_both_records_are_loaded_verbatim() {
        let dir = TempDir::new().unwrap();
        let pair = pair(&dir, "10:00:00:00", "10:00:00:00");
        store::save(pair.left().path(), &record(12)).unwrap();
        store::save(pair.right().path(), &record(3)).unwrap();
        let (left, right, source) = resolve_records(&pair).unwrap();
        assert_eq!(source, RecordSource::Calibrated);
        assert_eq!(left.start_frame, 12);
        assert_eq!(right.start_frame, 3);
    }

    #[test]
    fn test_one_sided_record_refuses_the_pair() {
        let dir = TempDir::new().unwrap();
        let pair = pair(&dir, "10:00:00:00", "10:00:00:00");
        store::save(pair.left().path(), &record(12)).unwrap();
        let err = resolve_records(&pair).unwrap_err();
        assert!(matches!(err, Error::Store { .. }));
        assert!(err.to_string().contains("take1_right.mp4"));
    }

    #[test]
    fn test_plan_covers_the_shared_remainder() {
        let dir = TempDir::new().unwrap();
        let pair = pair(&dir, "10:00:01:00", "10:00:00:00");
        let config = Config::default();
        let plan = plan_merge(&pair, record(25), record(0), RecordSource::Calibrated, &config)
            .unwrap();
        // Left seeks one second in, so only 59s remain in common.
        assert_eq!(plan.seek_left_secs, 1.0);
        assert_eq!(plan.seek_right_secs, 0.0);
        assert_eq!(plan.duration_secs, 59.0);
        assert_eq!(plan.output_timecode, "10:00:02:00");
        assert_eq!(plan.file_stem, "take1");
        assert_eq!(plan.date_folder.as_deref(), Some("2024-03-09"));
    }

    #[test]
    fn test_plan_without_date_folders() {
        let dir = TempDir::new().unwrap();
        let pair = pair(&dir, "10:00:00:00", "10:00:00:00");
        let mut config = Config::default();
        config.render.organize_by_date = false;
        let plan =
            plan_merge(&pair, record(0), record(0), RecordSource::Calibrated, &config).unwrap();
        assert_eq!(plan.date_folder, None);
        let out = resolve_output_path(Path::new("/egress"), &plan);
        assert_eq!(out.parent(), Some(Path::new("/egress")));
    }

    #[test]
    fn test_plan_refuses_disjoint_footage() {
        let dir = TempDir::new().unwrap();
        // A start frame past the end of the 1500-frame clip leaves nothing.
        let pair = pair(&dir, "10:00:00:00", "10:00:00:00");
        let config = Config::default();
        let err = plan_merge(&pair, record(2000), record(0), RecordSource::Calibrated, &config)
            .unwrap_err();
        assert!(matches!(err, Error::Render { .. }));
    }

    #[test]
    fn test_merge_stem_strips_the_side_marker() {
        let dir = TempDir::new().unwrap();
        let p = pair(&dir, "10:00:00:00", "10:00:00:00");
        assert_eq!(merge_stem(p.left(), "left"), "take1");
        // Unknown marker leaves the stem alone.
        assert_eq!(merge_stem(p.left(), "gopro"), "take1_left");
    }

    #[test]
    fn test_output_path_shape() {
        let dir = TempDir::new().unwrap();
        let pair = pair(&dir, "10:00:00:00", "10:00:00:00");
        let config = Config::default();
        let plan =
            plan_merge(&pair, record(0), record(0), RecordSource::Calibrated, &config).unwrap();
        let out = resolve_output_path(Path::new("/egress"), &plan);
        assert_eq!(out.parent(), Some(Path::new("/egress/2024-03-09")));
        let name = out.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("take1_"));
        assert!(name.ends_with(".mp4"));
    }

    #[test]
    fn test_merge_args_layout() {
        let dir = TempDir::new().unwrap();
        let pair = pair(&dir, "10:00:01:00", "10:00:00:00");
        let config = Config::default();
        let plan = plan_merge(&pair, record(25), record(0), RecordSource::Calibrated, &config)
            .unwrap();
        let args = build_merge_args(&pair, &plan, &config, Path::new("/egress/out.mp4"));

        assert_eq!(args[0], "-ss");
        assert_eq!(args[1], "1.000000");
        assert_eq!(args[2], "-i");
        assert!(args[3].ends_with("take1_left.mp4"));
        assert_eq!(args[5], "0.000000");
        assert!(args[7].ends_with("take1_right.mp4"));
        assert!(args.contains(&"-filter_complex".to_string()));
        assert!(args.contains(&"0:a?".to_string()));
        assert!(args.contains(&"libx265".to_string()));
        assert!(args.contains(&"timecode=10:00:02:00".to_string()));
        assert!(args.contains(&"pipe:1".to_string()));
        let t_at = args.iter().position(|a| a == "-t").unwrap();
        assert_eq!(args[t_at + 1], "59.000000");
        assert_eq!(args.last().unwrap(), "/egress/out.mp4");
    }
}
