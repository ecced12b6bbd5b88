use std::path::Path;

use tracing::{debug, warn};

use crate::config::PreviewConfig;
use crate::utils::error::Result;
use crate::utils::ffmpeg::FfmpegWrapper;

/// Decoded preview material for one eye: N square rgb24 frames in one
/// contiguous buffer.
#[derive(Debug, Clone)]
pub struct FrameSet {
    edge: u32,
    frame_len: usize,
    data: Vec<u8>,
}

impl FrameSet {
    /// Chops a raw rgb24 byte stream into frames; a trailing partial frame
    /// from a truncated decode is dropped, not exposed.
    pub fn from_raw(edge: u32, mut data: Vec<u8>) -> Self {
        let frame_len = (edge as usize) * (edge as usize) * 3;
        if frame_len > 0 {
            let tail = data.len() % frame_len;
            if tail > 0 {
                warn!("Dropping {} bytes of a partial trailing frame", tail);
                let keep = data.len() - tail;
                data.truncate(keep);
            }
        }
        Self {
            edge,
            frame_len,
            data,
        }
    }

    pub fn edge(&self) -> u32 {
        self.edge
    }

    pub fn len(&self) -> u64 {
        if self.frame_len == 0 {
            0
        } else {
            (self.data.len() / self.frame_len) as u64
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Saturates at the last frame, so a start frame sitting at the budget
    /// boundary still resolves to a drawable frame.
    pub fn frame(&self, index: u64) -> &[u8] {
        if self.is_empty() {
            return &[];
        }
        let index = index.min(self.len() - 1) as usize;
        &self.data[index * self.frame_len..(index + 1) * self.frame_len]
    }
}

/// Decodes the first N frames of a clip as square center-cropped rgb24
/// buffers, piped straight out of ffmpeg.
pub async fn extract_preview(
    ffmpeg: &FfmpegWrapper,
    path: &Path,
    config: &PreviewConfig,
) -> Result<FrameSet> {
    let filter = format!(
        "crop='min(iw,ih)':'min(iw,ih)',scale={}:{}",
        config.edge, config.edge
    );
    let args = vec![
        "-v".to_string(),
        "error".to_string(),
        "-i".to_string(),
        path.display().to_string(),
        "-vf".to_string(),
        filter,
        "-frames:v".to_string(),
        config.frame_count.to_string(),
        "-f".to_string(),
        "rawvideo".to_string(),
        "-pix_fmt".to_string(),
        "rgb24".to_string(),
        "pipe:1".to_string(),
    ];
    let bytes = ffmpeg.capture_stdout(&args).await?;
    let set = FrameSet::from_raw(config.edge, bytes);
    debug!(
        "Extracted {} preview frame(s) of {}px from {}",
        set.len(),
        config.edge,
        path.display()
    );
    Ok(set)
}
