use std::path::Path;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;
use tracing::debug;

use crate::media::rate::FrameRate;
use crate::utils::error::{Error, Result};
use crate::utils::ffmpeg::FfmpegWrapper;

/// Raw per-file facts read from ffprobe. The timecode stays a string here;
/// it is bound to the frame rate when files are matched into pairs.
#[derive(Debug, Clone)]
pub struct ProbedMetadata {
    pub creation_time: DateTime<Utc>,
    pub start_timecode: String,
    pub duration_seconds: f64,
    pub frame_rate: FrameRate,
}

pub async fn probe_file(ffmpeg: &FfmpegWrapper, path: &Path) -> Result<ProbedMetadata> {
    let data = ffmpeg.probe_json(path).await?;
    parse_probe_output(path, &data)
}

pub(crate) fn parse_probe_output(path: &Path, data: &Value) -> Result<ProbedMetadata> {
    let frame_rate = extract_frame_rate(path, data)?;
    let duration_seconds = extract_duration(path, data)?;

    let start_timecode = find_tag(data, "timecode").ok_or_else(|| {
        Error::metadata(path, "No timecode tag in any stream or the container")
    })?;
    let raw_creation = find_tag(data, "creation_time").ok_or_else(|| {
        Error::metadata(path, "No creation_time tag in any stream or the container")
    })?;
    let creation_time = parse_creation_time(path, &raw_creation)?;

    debug!(
        "Probed {}: tc {} rate {} duration {:.3}s",
        path.display(),
        start_timecode,
        frame_rate,
        duration_seconds
    );

    Ok(ProbedMetadata {
        creation_time,
        start_timecode,
        duration_seconds,
        frame_rate,
    })
}

fn video_stream(data: &Value) -> Option<&Value> {
    data["streams"]
        .as_array()?
        .iter()
        .find(|s| s["codec_type"].as_str() == Some("video"))
}

/// Cameras hide tags in three places, so the search widens in turn: the
/// video stream's tags by exact key, then any stream's tags by key
/// fragment, then the container tags by key fragment.
fn find_tag(data: &Value, key: &str) -> Option<String> {
    if let Some(stream) = video_stream(data) {
        if let Some(value) = stream["tags"][key].as_str() {
            return Some(value.to_string());
        }
    }

    if let Some(streams) = data["streams"].as_array() {
        for stream in streams {
            if let Some(tags) = stream["tags"].as_object() {
                for (tag_key, value) in tags {
                    if tag_key.to_lowercase().contains(key) {
                        if let Some(value) = value.as_str() {
                            return Some(value.to_string());
                        }
                    }
                }
            }
        }
    }

    if let Some(tags) = data["format"]["tags"].as_object() {
        for (tag_key, value) in tags {
            if tag_key.to_lowercase().contains(key) {
                if let Some(value) = value.as_str() {
                    return Some(value.to_string());
                }
            }
        }
    }

    None
}

fn extract_frame_rate(path: &Path, data: &Value) -> Result<FrameRate> {
    let stream = video_stream(data)
        .ok_or_else(|| Error::metadata(path, "No video stream found"))?;
    let raw = stream["r_frame_rate"]
        .as_str()
        .ok_or_else(|| Error::metadata(path, "No declared frame rate on the video stream"))?;
    FrameRate::parse(raw)
        .map_err(|e| Error::metadata(path, format!("Unreadable frame rate: {}", e)))
}

fn extract_duration(path: &Path, data: &Value) -> Result<f64> {
    data["format"]["duration"]
        .as_str()
        .and_then(|d| d.parse::<f64>().ok())
        .filter(|d| *d > 0.0)
        .ok_or_else(|| Error::metadata(path, "No usable container duration"))
}

fn parse_creation_time(path: &Path, raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    // Some rigs write a bare wall clock without zone; read it as UTC.
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f") {
        return Ok(naive.and_utc());
    }
    Err(Error::metadata(
        path,
        format!("Unreadable creation_time '{}'", raw),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::path::PathBuf;

    fn probe_path() -> PathBuf {
        PathBuf::from("/footage/cam_left_0001.mp4")
    }

    fn full_fixture() -> Value {
        json!({
            "streams": [
                {
                    "codec_type": "video",
                    "r_frame_rate": "30000/1001",
                    "tags": { "timecode": "14:23:11;04" }
                },
                { "codec_type": "audio", "tags": {} }
            ],
            "format": {
                "duration": "120.500000",
                "tags": { "creation_time": "2024-03-09T14:23:11.000000Z" }
            }
        })
    }

    #[test]
    fn test_parse_full_fixture() {
        let meta = parse_probe_output(&probe_path(), &full_fixture()).unwrap();
        assert_eq!(meta.start_timecode, "14:23:11;04");
        assert_eq!(meta.frame_rate, FrameRate::parse("30000/1001").unwrap());
        assert!((meta.duration_seconds - 120.5).abs() < 1e-9);
        assert_eq!(
            meta.creation_time,
            DateTime::parse_from_rfc3339("2024-03-09T14:23:11Z")
                .unwrap()
                .with_timezone(&Utc)
        );
    }

    #[test]
    fn test_tag_search_widens_to_other_streams() {
        let data = json!({
            "streams": [
                { "codec_type": "video", "r_frame_rate": "25/1", "tags": {} },
                { "codec_type": "data", "tags": { "TIMECODE": "01:00:00:00" } }
            ],
            "format": {
                "duration": "10.0",
                "tags": { "creation_time": "2024-03-09T14:23:11Z" }
            }
        });
        let meta = parse_probe_output(&probe_path(), &data).unwrap();
        assert_eq!(meta.start_timecode, "01:00:00:00");
    }

    #[test]
    fn test_tag_search_widens_to_container() {
        let data = json!({
            "streams": [
                { "codec_type": "video", "r_frame_rate": "25/1" }
            ],
            "format": {
                "duration": "10.0",
                "tags": {
                    "com.vendor.timecode": "02:00:00:00",
                    "creation_time": "2024-03-09 14:23:11"
                }
            }
        });
        let meta = parse_probe_output(&probe_path(), &data).unwrap();
        assert_eq!(meta.start_timecode, "02:00:00:00");
    }

    #[test]
    fn test_video_stream_tag_wins_over_container() {
        let mut data = full_fixture();
        data["format"]["tags"]["timecode"] = json!("09:09:09:09");
        let meta = parse_probe_output(&probe_path(), &data).unwrap();
        assert_eq!(meta.start_timecode, "14:23:11;04");
    }

    #[test]
    fn test_missing_timecode_is_metadata_error() {
        let mut data = full_fixture();
        data["streams"][0]["tags"] = json!({});
        let err = parse_probe_output(&probe_path(), &data).unwrap_err();
        assert!(matches!(err, Error::Metadata { .. }));
        assert!(err.to_string().contains("timecode"));
    }

    #[test]
    fn test_missing_video_stream_is_metadata_error() {
        let data = json!({
            "streams": [{ "codec_type": "audio" }],
            "format": { "duration": "10.0" }
        });
        assert!(matches!(
            parse_probe_output(&probe_path(), &data),
            Err(Error::Metadata { .. })
        ));
    }

    #[test]
    fn test_missing_duration_is_metadata_error() {
        let mut data = full_fixture();
        data["format"]["duration"] = json!(null);
        let err = parse_probe_output(&probe_path(), &data).unwrap_err();
        assert!(err.to_string().contains("duration"));
    }

    #[test]
    fn test_unreadable_creation_time_is_metadata_error() {
        let mut data = full_fixture();
        data["format"]["tags"]["creation_time"] = json!("ninth of march");
        let err = parse_probe_output(&probe_path(), &data).unwrap_err();
        assert!(err.to_string().contains("creation_time"));
    }

    #[test]
    fn test_error_names_the_file() {
        let mut data = full_fixture();
        data["streams"][0]["tags"] = json!({});
        let err = parse_probe_output(&probe_path(), &data).unwrap_err();
        assert!(err.to_string().contains("cam_left_0001.mp4"));
    }
}
