use std::path::Path;
use std::process::Stdio;
use tokio::process::{Child, Command as TokioCommand};
use tracing::debug;

use crate::utils::{Error, Result};

/// Parsed state of one `-progress` report block from ffmpeg.
#[derive(Debug, Clone, Default)]
pub struct ProgressInfo {
    pub frame: Option<u64>,
    pub fps: Option<f32>,
    pub total_size: Option<u64>,
    pub time: f64,
    pub speed: Option<f32>,
}

#[derive(Debug, Clone)]
pub struct FfmpegWrapper {
    ffmpeg_path: String,
    ffprobe_path: String,
}

impl FfmpegWrapper {
    pub fn new(ffmpeg_path: String, ffprobe_path: String) -> Self {
        Self {
            ffmpeg_path,
            ffprobe_path,
        }
    }

    pub fn get_ffmpeg_path(&self) -> &str {
        &self.ffmpeg_path
    }

    pub async fn check_availability(&self) -> Result<()> {
        let ffmpeg_check = TokioCommand::new(&self.ffmpeg_path)
            .arg("-version")
            .output()
            .await?;

        if !ffmpeg_check.status.success() {
            return Err(Error::ffmpeg("ffmpeg is not available or not executable"));
        }

        let ffprobe_check = TokioCommand::new(&self.ffprobe_path)
            .arg("-version")
            .output()
            .await?;

        if !ffprobe_check.status.success() {
            return Err(Error::ffmpeg("ffprobe is not available or not executable"));
        }

        Ok(())
    }

    /// Probes a file and returns the raw ffprobe JSON document.
    pub async fn probe_json<P: AsRef<Path>>(&self, input_path: P) -> Result<serde_json::Value> {
        let input_path = input_path.as_ref().to_string_lossy();

        let output = TokioCommand::new(&self.ffprobe_path)
            .args([
                "-v",
                "error",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
                &input_path,
            ])
            .output()
            .await?;

        if !output.status.success() {
            let error_msg = String::from_utf8_lossy(&output.stderr);
            return Err(Error::ffmpeg(format!(
                "ffprobe failed: {}",
                tail_lines(&error_msg, 5)
            )));
        }

        let json_output = String::from_utf8_lossy(&output.stdout);
        let probe_data: serde_json::Value = serde_json::from_str(&json_output)?;
        Ok(probe_data)
    }

    /// Runs ffmpeg to completion and returns whatever it wrote to stdout.
    /// Used for raw frame extraction, where stdout is pixel data.
    pub async fn capture_stdout(&self, args: &[String]) -> Result<Vec<u8>> {
        debug!("Running ffmpeg with args: {:?}", args);

        let output = TokioCommand::new(&self.ffmpeg_path)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await?;

        if !output.status.success() {
            let error_msg = String::from_utf8_lossy(&output.stderr);
            return Err(Error::ffmpeg(format!(
                "ffmpeg failed: {}",
                tail_lines(&error_msg, 10)
            )));
        }

        Ok(output.stdout)
    }

    /// Spawns a long-running ffmpeg render. Both pipes stay attached so the
    /// caller can follow `-progress pipe:1` on stdout and keep stderr for
    /// the failure report.
    pub async fn start_render(&self, args: Vec<String>) -> Result<Child> {
        let mut cmd_args = vec!["-y".to_string()];
        cmd_args.extend(args);

        debug!("Starting ffmpeg render: {:?}", cmd_args);

        let mut command = TokioCommand::new(&self.ffmpeg_path);
        command
            .args(&cmd_args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let child = command.spawn()?;
        Ok(child)
    }
}

/// The last `n` non-empty lines of a tool's stderr, for error messages that
/// stay readable when ffmpeg dumps its whole configuration banner.
pub fn tail_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim_end)
        .filter(|l| !l.is_empty())
        .collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_tail_lines_keeps_last_entries() {
        let text = "one\ntwo\nthree\nfour\n";
        assert_eq!(tail_lines(text, 2), "three\nfour");
    }

    #[test]
    fn test_tail_lines_skips_blank_lines() {
        let text = "banner\n\n\nerror: bad input\n\n";
        assert_eq!(tail_lines(text, 1), "error: bad input");
    }

    #[test]
    fn test_tail_lines_shorter_than_limit() {
        assert_eq!(tail_lines("only", 10), "only");
        assert_eq!(tail_lines("", 10), "");
    }
}
