use crate::utils::{Error, Result};
use std::path::{Path, PathBuf};
use uuid::Uuid;
use walkdir::WalkDir;

const VIDEO_EXTENSIONS: &[&str] = &[".mkv", ".mp4", ".mov", ".m4v", ".avi", ".webm"];

/// Collects every video file under the ingress directory, sorted by path so
/// runs are deterministic before creation-time ordering is applied.
pub fn find_video_files<P: AsRef<Path>>(path: P) -> Result<Vec<PathBuf>> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(Error::validation(format!(
            "Ingress path does not exist: {}",
            path.display()
        )));
    }
    if !path.is_dir() {
        return Err(Error::validation(format!(
            "Ingress path is not a directory: {}",
            path.display()
        )));
    }

    let mut video_files = Vec::new();
    for entry in WalkDir::new(path)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let entry_path = entry.path();
        if entry_path.is_file() && is_video_file(entry_path) {
            video_files.push(entry_path.to_path_buf());
        }
    }

    if video_files.is_empty() {
        return Err(Error::validation(format!(
            "No video files found under {}",
            path.display()
        )));
    }

    video_files.sort();
    Ok(video_files)
}

pub fn is_video_file<P: AsRef<Path>>(path: P) -> bool {
    let path = path.as_ref();

    if let Some(extension) = path.extension() {
        if let Some(ext_str) = extension.to_str() {
            let ext_lower = format!(".{}", ext_str.to_lowercase());
            return VIDEO_EXTENSIONS.contains(&ext_lower.as_str());
        }
    }

    false
}

/// A collision-safe output name: the stem plus a fresh uuid, always mp4.
pub fn unique_output_path(dir: &Path, stem: &str) -> PathBuf {
    dir.join(format!("{}_{}.mp4", stem, Uuid::new_v4()))
}

pub fn ensure_output_dir<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        if !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }

    Ok(())
}

pub fn get_file_size<P: AsRef<Path>>(path: P) -> Result<u64> {
    let metadata = std::fs::metadata(path)?;
    Ok(metadata.len())
}

pub fn format_file_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    const THRESHOLD: f64 = 1024.0;

    if bytes == 0 {
        return "0 B".to_string();
    }

    let size = bytes as f64;
    let unit_index = (size.log(THRESHOLD) as usize).min(UNITS.len() - 1);
    let size_in_unit = size / THRESHOLD.powi(unit_index as i32);

    format!("{:.2} {}", size_in_unit, UNITS[unit_index])
}
