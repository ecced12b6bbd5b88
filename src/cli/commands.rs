use std::path::Path;

use tracing::{info, warn};

use crate::calibration::CalibrationSession;
use crate::cli::args::{CliArgs, CliCommand};
use crate::config::Config;
use crate::media::{probe_file, MediaFile};
use crate::pairing::{match_pairs, MatchOutcome};
use crate::preview::TerminalView;
use crate::render::run_merge;
use crate::utils::filesystem::get_file_size;
use crate::utils::{find_video_files, format_file_size, Error, FfmpegWrapper, Result};

pub async fn handle_commands(args: &CliArgs, config: &Config) -> Result<()> {
    match &args.command {
        Some(CliCommand::Calibrate {
            ingress,
            skip_calibrated,
        }) => calibrate(config, ingress, *skip_calibrated).await,
        Some(CliCommand::Merge {
            ingress,
            egress,
            flat,
        }) => merge(config, ingress, egress, *flat).await,
        Some(CliCommand::Pairs { ingress }) => list_pairs(config, ingress).await,
        Some(CliCommand::ValidateConfig) => validate_config(&args.config).await,
        None => Ok(()),
    }
}

async fn tooling(config: &Config) -> Result<FfmpegWrapper> {
    let ffmpeg = FfmpegWrapper::new(config.tools.ffmpeg.clone(), config.tools.ffprobe.clone());
    ffmpeg
        .check_availability()
        .await
        .map_err(|e| Error::ffmpeg(format!("FFmpeg tools not available: {}", e)))?;
    Ok(ffmpeg)
}

/// Scans the ingress directory, probes every video file and matches the
/// probeable ones into pairs. A file ffprobe cannot read is skipped with a
/// warning rather than sinking the whole scan.
async fn discover_pairs(
    ffmpeg: &FfmpegWrapper,
    config: &Config,
    ingress: &Path,
) -> Result<MatchOutcome> {
    let files = find_video_files(ingress)?;
    info!(
        "Found {} video file(s) under {}",
        files.len(),
        ingress.display()
    );

    let mut media = Vec::with_capacity(files.len());
    for path in &files {
        match probe_file(ffmpeg, path).await {
            Ok(probed) => match MediaFile::new(
                path.clone(),
                probed,
                &config.pairing.left_marker,
                &config.pairing.right_marker,
            ) {
                Ok(file) => media.push(file),
                Err(e) => warn!("Skipping {}: {}", path.display(), e),
            },
            Err(e) => warn!("Skipping {}: {}", path.display(), e),
        }
    }

    if media.len() < 2 {
        return Err(Error::validation(format!(
            "Need at least two probeable camera files under {} to form a pair",
            ingress.display()
        )));
    }

    let outcome = match_pairs(media, &config.pairing);
    info!("Matched {} pair(s)", outcome.pairs.len());
    Ok(outcome)
}

async fn calibrate(config: &Config, ingress: &Path, skip_calibrated: bool) -> Result<()> {
    let ffmpeg = tooling(config).await?;
    let outcome = discover_pairs(&ffmpeg, config, ingress).await?;
    if outcome.pairs.is_empty() {
        info!("No pairs to calibrate under {}", ingress.display());
        return Ok(());
    }

    let view = TerminalView::new();
    let mut session = CalibrationSession::new(&ffmpeg, config, view, skip_calibrated);
    let report = session.run(&outcome.pairs).await?;

    if report.aborted {
        info!(
            "Calibration aborted: {} of {} pair(s) done before quitting",
            report.calibrated,
            outcome.pairs.len()
        );
    } else {
        info!(
            "Calibration finished: {} calibrated, {} saved, {} skipped, {} failed",
            report.calibrated, report.saved, report.skipped_existing, report.failed
        );
    }

    Ok(())
}

async fn merge(config: &Config, ingress: &Path, egress: &Path, flat: bool) -> Result<()> {
    let ffmpeg = tooling(config).await?;
    let outcome = discover_pairs(&ffmpeg, config, ingress).await?;
    if outcome.pairs.is_empty() {
        info!("No pairs to merge under {}", ingress.display());
        return Ok(());
    }

    let mut config = config.clone();
    if flat {
        config.render.organize_by_date = false;
    }

    let report = run_merge(&ffmpeg, &config, &outcome.pairs, egress).await?;

    if !report.rendered.is_empty() {
        println!();
        println!("Merged files:");
        for path in &report.rendered {
            match get_file_size(path) {
                Ok(size) => println!("  {} ({})", path.display(), format_file_size(size)),
                Err(_) => println!("  {}", path.display()),
            }
        }
    }

    if report.rendered.is_empty() && report.failed > 0 {
        return Err(Error::render("All pairs failed to merge".to_string()));
    }

    Ok(())
}

async fn list_pairs(config: &Config, ingress: &Path) -> Result<()> {
    let ffmpeg = tooling(config).await?;
    let outcome = discover_pairs(&ffmpeg, config, ingress).await?;

    println!();
    println!("Matched pairs:");
    println!("{:-<100}", "");
    println!(
        "{:<4} {:<32} {:<32} {:<12} {:<16}",
        "#", "Left", "Right", "Rate", "Timecode gap"
    );
    println!("{:-<100}", "");

    for (index, pair) in outcome.pairs.iter().enumerate() {
        let gap = pair
            .left()
            .start_timecode()
            .delta(&pair.right().start_timecode())?;
        println!(
            "{:<4} {:<32} {:<32} {:<12} {:<16}",
            index + 1,
            pair.left().display_name(),
            pair.right().display_name(),
            pair.frame_rate().to_string(),
            gap.to_string(),
        );
    }

    println!("{:-<100}", "");

    if !outcome.skipped.is_empty() {
        println!();
        println!("Unpaired files:");
        for skip in &outcome.skipped {
            println!("  {} ({})", skip.path.display(), skip.reason);
        }
    }

    println!();
    println!("Use 'calibrate' to align these pairs interactively.");

    Ok(())
}

async fn validate_config(config_path: &Path) -> Result<()> {
    match Config::load_with_fallback(config_path) {
        Ok(config) => {
            if config_path.exists() {
                println!("✓ Configuration file is valid: {}", config_path.display());
            } else {
                println!("✓ Configuration is valid (using fallback or built-in defaults)");
            }
            println!();

            println!("Configuration Summary:");
            println!("{:-<40}", "");
            println!("ffmpeg: {}", config.tools.ffmpeg);
            println!("ffprobe: {}", config.tools.ffprobe);
            println!(
                "Side markers: '{}' / '{}'",
                config.pairing.left_marker, config.pairing.right_marker
            );
            println!(
                "Max creation gap: {:.1}s",
                config.pairing.max_start_gap_seconds
            );
            println!(
                "Preview: {} frame(s) at {}px",
                config.preview.frame_count, config.preview.edge
            );
            println!(
                "Encoder: {} (crf {}, preset {})",
                config.render.encoder, config.render.crf, config.render.preset
            );
            println!(
                "Eye edge: {}px, dewarp: {}, fov: {}",
                config.render.eye_edge, config.render.dewarp, config.render.fov_degrees
            );
            println!("Organize by date: {}", config.render.organize_by_date);

            Ok(())
        }
        Err(e) => {
            println!("✗ Configuration validation failed: {}", e);
            println!();
            println!("Common issues:");
            println!("  - Check YAML syntax and indentation");
            println!("  - Verify all required sections are present");
            println!("  - Ensure the side markers differ and render values are in range");
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const FULL_CONFIG: &str = r#"
tools:
  ffmpeg: "ffmpeg"
  ffprobe: "ffprobe"

logging:
  level: "info"
  show_timestamps: true
  colored_output: true

pairing:
  max_start_gap_seconds: 5.0
  left_marker: "left"
  right_marker: "right"

preview:
  frame_count: 30
  edge: 512

render:
  encoder: "libx265"
  crf: 18.0
  preset: "medium"
  eye_edge: 2048
  dewarp: true
  fov_degrees: 190.0
  organize_by_date: true
"#;

    #[tokio::test]
    async fn test_validate_config_accepts_complete_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", FULL_CONFIG).unwrap();
        file.flush().unwrap();

        assert!(validate_config(file.path()).await.is_ok());
    }

    #[tokio::test]
    async fn test_validate_config_rejects_malformed_yaml() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "tools: [not, a, mapping]").unwrap();
        file.flush().unwrap();

        assert!(validate_config(file.path()).await.is_err());
    }

    #[tokio::test]
    async fn test_validate_config_rejects_out_of_range_values() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", FULL_CONFIG.replace("crf: 18.0", "crf: 99.0")).unwrap();
        file.flush().unwrap();

        assert!(validate_config(file.path()).await.is_err());
    }

    #[tokio::test]
    async fn test_no_command_is_a_noop() {
        let args = CliArgs::try_parse_from(["vr180-prep"]).unwrap();
        let config = Config::default();
        assert!(handle_commands(&args, &config).await.is_ok());
    }
}
