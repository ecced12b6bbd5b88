use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::utils::error::{Error, Result};

/// One file's persisted alignment. Rotation fields default to zero when a
/// record predates them; the other three are required.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationRecord {
    pub start_frame: u64,
    pub x_offset: i32,
    pub y_offset: i32,
    pub rotation_global: f32,
    pub rotation_local: f32,
}

/// The record lives next to its footage file, same stem, `.txt` extension.
pub fn sidecar_path(video: &Path) -> PathBuf {
    video.with_extension("txt")
}

/// `Ok(None)` when no record exists; a present but unreadable record is an
/// error, never a silent default.
pub fn load(video: &Path) -> Result<Option<CalibrationRecord>> {
    let path = sidecar_path(video);
    let contents = match std::fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(Error::store(&path, e.to_string())),
    };
    let record = parse_record(&path, &contents)?;
    debug!("Loaded calibration record {}", path.display());
    Ok(Some(record))
}

pub fn save(video: &Path, record: &CalibrationRecord) -> Result<()> {
    let path = sidecar_path(video);
    let contents = format!(
        "start_frame: {}\nx_offset: {}\ny_offset: {}\nrotation_global: {}\nrotation_local: {}\n",
        record.start_frame,
        record.x_offset,
        record.y_offset,
        record.rotation_global,
        record.rotation_local
    );
    std::fs::write(&path, contents).map_err(|e| Error::store(&path, e.to_string()))?;
    debug!("Wrote calibration record {}", path.display());
    Ok(())
}

fn parse_record(path: &Path, contents: &str) -> Result<CalibrationRecord> {
    let mut start_frame = None;
    let mut x_offset = None;
    let mut y_offset = None;
    let mut rotation_global = 0.0f32;
    let mut rotation_local = 0.0f32;

    for (number, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (key, value) = line.split_once(':').ok_or_else(|| {
            Error::store(path, format!("Line {} is not a 'key: value' entry", number + 1))
        })?;
        let key = key.trim();
        let value = value.trim();
        match key {
            "start_frame" => start_frame = Some(parse_value(path, key, value)?),
            "x_offset" => x_offset = Some(parse_value(path, key, value)?),
            "y_offset" => y_offset = Some(parse_value(path, key, value)?),
            "rotation_global" => rotation_global = parse_value(path, key, value)?,
            "rotation_local" => rotation_local = parse_value(path, key, value)?,
            // Keys from newer tool versions are carried past, not rejected.
            _ => {}
        }
    }

    Ok(CalibrationRecord {
        start_frame: require(path, "start_frame", start_frame)?,
        x_offset: require(path, "x_offset", x_offset)?,
        y_offset: require(path, "y_offset", y_offset)?,
        rotation_global,
        rotation_local,
    })
}

fn parse_value<T: std::str::FromStr>(path: &Path, key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| Error::store(path, format!("Invalid value '{}' for {}", value, key)))
}

fn require<T>(path: &Path, key: &str, value: Option<T>) -> Result<T> {
    value.ok_or_else(|| Error::store(path, format!("Missing required key {}", key)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn video_path(dir: &TempDir) -> PathBuf {
        dir.path().join("take1_left.mp4")
    }

    #[test]
    fn test_sidecar_path_swaps_extension() {
        assert_eq!(
            sidecar_path(Path::new("/footage/a_left.mp4")),
            PathBuf::from("/footage/a_left.txt")
        );
    }

    #[test]
    fn test_round_trip() {
        let dir = TempDir::new().unwrap();
        let video = video_path(&dir);
        let record = CalibrationRecord {
            start_frame: 12,
            x_offset: 5,
            y_offset: -3,
            rotation_global: 3.5,
            rotation_local: -1.2,
        };
        save(&video, &record).unwrap();
        let loaded = load(&video).unwrap().unwrap();
        assert_eq!(loaded, record);
    }

    #[test]
    fn test_written_schema_is_stable() {
        let dir = TempDir::new().unwrap();
        let video = video_path(&dir);
        let record = CalibrationRecord {
            start_frame: 12,
            x_offset: 5,
            y_offset: -3,
            rotation_global: 1.0,
            rotation_local: -2.5,
        };
        save(&video, &record).unwrap();
        let raw = std::fs::read_to_string(sidecar_path(&video)).unwrap();
        assert_eq!(
            raw,
            "start_frame: 12\nx_offset: 5\ny_offset: -3\nrotation_global: 1\nrotation_local: -2.5\n"
        );
    }

    #[test]
    fn test_legacy_record_defaults_rotations() {
        let dir = TempDir::new().unwrap();
        let video = video_path(&dir);
        std::fs::write(
            sidecar_path(&video),
            "start_frame: 4\nx_offset: -1\ny_offset: 2\n",
        )
        .unwrap();
        let loaded = load(&video).unwrap().unwrap();
        assert_eq!(loaded.start_frame, 4);
        assert_eq!(loaded.x_offset, -1);
        assert_eq!(loaded.y_offset, 2);
        assert_eq!(loaded.rotation_global, 0.0);
        assert_eq!(loaded.rotation_local, 0.0);
    }

    #[test]
    fn test_missing_file_is_none() {
        let dir = TempDir::new().unwrap();
        assert_eq!(load(&video_path(&dir)).unwrap(), None);
    }

    #[test]
    fn test_malformed_line_is_store_error() {
        let dir = TempDir::new().unwrap();
        let video = video_path(&dir);
        std::fs::write(sidecar_path(&video), "start_frame 4\n").unwrap();
        assert!(matches!(load(&video), Err(Error::Store { .. })));
    }

    #[test]
    fn test_unparseable_value_is_store_error() {
        let dir = TempDir::new().unwrap();
        let video = video_path(&dir);
        std::fs::write(
            sidecar_path(&video),
            "start_frame: twelve\nx_offset: 0\ny_offset: 0\n",
        )
        .unwrap();
        let err = load(&video).unwrap_err();
        assert!(err.to_string().contains("start_frame"));
    }

    #[test]
    fn test_missing_required_key_is_store_error() {
        let dir = TempDir::new().unwrap();
        let video = video_path(&dir);
        std::fs::write(sidecar_path(&video), "start_frame: 4\nx_offset: 0\n").unwrap();
        let err = load(&video).unwrap_err();
        assert!(err.to_string().contains("y_offset"));
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let dir = TempDir::new().unwrap();
        let video = video_path(&dir);
        std::fs::write(
            sidecar_path(&video),
            "start_frame: 4\nx_offset: 0\ny_offset: 0\nlens_profile: wide\n",
        )
        .unwrap();
        assert!(load(&video).unwrap().is_some());
    }

    #[test]
    fn test_whitespace_and_blank_lines_tolerated() {
        let dir = TempDir::new().unwrap();
        let video = video_path(&dir);
        std::fs::write(
            sidecar_path(&video),
            "\n  start_frame:  9 \n\nx_offset: 1\ny_offset: -1\n",
        )
        .unwrap();
        let loaded = load(&video).unwrap().unwrap();
        assert_eq!(loaded.start_frame, 9);
    }
}
