use indicatif::{ProgressBar, ProgressStyle};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Child;

use crate::utils::ffmpeg::ProgressInfo;
use crate::utils::Result;

/// What a finished render left behind: the exit status and everything
/// ffmpeg printed to stderr, kept for the failure report.
#[derive(Debug)]
pub struct RenderOutcome {
    pub status: std::process::ExitStatus,
    pub stderr: String,
}

pub struct ProgressMonitor {
    progress_bar: ProgressBar,
    start_time: Instant,
    total_duration: f64,
    total_frames: Option<u64>,
}

impl ProgressMonitor {
    pub fn new(total_duration: f64, fps: f64, label: &str) -> Self {
        // 10000 steps gives 0.01% display precision
        let progress_bar = ProgressBar::new(10000);

        let template = format!(
            "{}: {{spinner:.green}} [{{wide_bar:.cyan/blue}}] {{percent:>3}}% | {{msg}}",
            label
        );
        progress_bar.set_style(
            ProgressStyle::with_template(&template)
                .unwrap()
                .progress_chars("█▉▊▋▌▍▎▏ "),
        );

        let total_frames = if fps > 0.0 && total_duration > 0.0 {
            Some((total_duration * fps) as u64)
        } else {
            None
        };

        Self {
            progress_bar,
            start_time: Instant::now(),
            total_duration,
            total_frames,
        }
    }

    /// Follows a render spawned with `-progress pipe:1`, repainting the bar
    /// on every completed report block, and reaps the process.
    pub async fn monitor_render(&mut self, mut child: Child) -> Result<RenderOutcome> {
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        // Drain stderr concurrently so a chatty ffmpeg cannot fill the pipe
        // and deadlock against our stdout reads.
        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            if let Some(mut stderr) = stderr {
                let _ = stderr.read_to_string(&mut buf).await;
            }
            buf
        });

        if let Some(stdout) = stdout {
            let mut lines = BufReader::new(stdout).lines();
            let mut info = ProgressInfo::default();
            while let Some(line) = lines.next_line().await? {
                if apply_progress_line(&mut info, &line) {
                    self.update_progress(&info);
                }
            }
        }

        let status = child.wait().await?;
        let stderr_text = stderr_task.await.unwrap_or_default();

        if status.success() {
            self.finish();
        } else {
            self.abandon();
        }

        Ok(RenderOutcome {
            status,
            stderr: stderr_text,
        })
    }

    fn update_progress(&mut self, info: &ProgressInfo) {
        let mut current_progress = if self.total_duration > 0.0 {
            (info.time / self.total_duration).min(1.0)
        } else {
            0.0
        };

        // Frame counts are exact where the duration is an estimate, so
        // prefer them when both sides are known.
        if let (Some(current_frame), Some(total_frames)) = (info.frame, self.total_frames) {
            if current_frame > 0 && total_frames > 0 {
                let frame_progress = current_frame as f64 / total_frames as f64;
                if frame_progress > 0.0 && frame_progress <= 1.0 {
                    current_progress = frame_progress;
                }
            }
        }

        let position = (current_progress * 10000.0) as u64;
        self.progress_bar.set_position(position);

        let mut message_parts = vec![];

        if let Some(fps) = info.fps {
            message_parts.push(format!("{:.1}fps", fps));
        }

        if let Some(speed) = info.speed {
            message_parts.push(format!("{:.1}x", speed));
        }

        if current_progress > 0.01 {
            if let Some(current_size) = info.total_size {
                let estimated_final_size = (current_size as f64 / current_progress) as u64;
                message_parts.push(format!("~{}", format_size(estimated_final_size)));
            }
        }

        if current_progress > 0.005 {
            let elapsed = self.start_time.elapsed().as_secs_f64();
            let mut eta_seconds = (elapsed / current_progress) - elapsed;

            if let Some(speed) = info.speed {
                if speed > 0.1 {
                    let adjusted = (self.total_duration - info.time) / speed as f64;
                    if adjusted > 0.0 {
                        eta_seconds = adjusted;
                    }
                }
            }

            eta_seconds = eta_seconds.clamp(1.0, 24.0 * 3600.0);
            let eta = Duration::from_secs_f64(eta_seconds);
            message_parts.push(format!("ETA {}", format_duration(eta)));
        }

        if !message_parts.is_empty() {
            self.progress_bar.set_message(message_parts.join(" • "));
        }
    }

    fn finish(&self) {
        let duration = self.start_time.elapsed();
        self.progress_bar.set_position(10000);
        self.progress_bar
            .finish_with_message(format!("Completed in {}", format_duration(duration)));
    }

    fn abandon(&self) {
        let duration = self.start_time.elapsed();
        self.progress_bar
            .abandon_with_message(format!("Failed after {}", format_duration(duration)));
    }
}

/// Folds one `-progress pipe:1` line into the running report. Returns true
/// at the end of a block, which is when the bar should repaint.
pub fn apply_progress_line(info: &mut ProgressInfo, line: &str) -> bool {
    let line = line.trim();
    let Some((key, value)) = line.split_once('=') else {
        return false;
    };
    let key = key.trim();
    let value = value.trim();

    match key {
        "frame" => {
            info.frame = value.parse().ok();
        }
        "fps" => {
            info.fps = value.parse().ok();
        }
        "out_time_us" => {
            if let Ok(time_us) = value.parse::<u64>() {
                info.time = time_us as f64 / 1_000_000.0;
            }
        }
        "total_size" => {
            info.total_size = value.parse().ok();
        }
        "speed" => {
            info.speed = value.trim_end_matches('x').parse().ok();
        }
        // "progress=continue" or "progress=end" closes a report block
        "progress" => return true,
        _ => {}
    }

    false
}

fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_progress_block_parsing() {
        let mut info = ProgressInfo::default();
        assert!(!apply_progress_line(&mut info, "frame=120"));
        assert!(!apply_progress_line(&mut info, "fps=29.9"));
        assert!(!apply_progress_line(&mut info, "out_time_us=4000000"));
        assert!(!apply_progress_line(&mut info, "total_size=1048576"));
        assert!(!apply_progress_line(&mut info, "speed=1.25x"));
        assert!(apply_progress_line(&mut info, "progress=continue"));

        assert_eq!(info.frame, Some(120));
        assert_eq!(info.fps, Some(29.9));
        assert_eq!(info.time, 4.0);
        assert_eq!(info.total_size, Some(1048576));
        assert_eq!(info.speed, Some(1.25));
    }

    #[test]
    fn test_unknown_and_malformed_lines_are_ignored() {
        let mut info = ProgressInfo::default();
        assert!(!apply_progress_line(&mut info, "bitrate=2024.3kbits/s"));
        assert!(!apply_progress_line(&mut info, "not a key value line"));
        assert!(!apply_progress_line(&mut info, ""));
        assert_eq!(info.frame, None);
    }

    #[test]
    fn test_na_values_leave_fields_unset() {
        let mut info = ProgressInfo::default();
        apply_progress_line(&mut info, "speed=N/A");
        apply_progress_line(&mut info, "fps=N/A");
        assert_eq!(info.speed, None);
        assert_eq!(info.fps, None);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(59)), "0:59");
        assert_eq!(format_duration(Duration::from_secs(61)), "1:01");
        assert_eq!(format_duration(Duration::from_secs(3725)), "1:02:05");
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
    }
}
