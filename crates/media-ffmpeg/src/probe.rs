use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{MediaFfmpegError, Result};

/// Stream kind discovered by probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Video,
    Audio,
    Other,
}

/// Stream metadata read from `ffprobe`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamInfo {
    pub index: u32,
    pub kind: StreamKind,
    pub codec_name: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u16>,
}

/// Media probe result.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaProbe {
    pub path: PathBuf,
    pub duration_seconds: f64,
    pub streams: Vec<StreamInfo>,
}

impl MediaProbe {
    /// Returns the first video stream.
    pub fn first_video(&self) -> Option<&StreamInfo> {
        self.streams
            .iter()
            .find(|stream| stream.kind == StreamKind::Video)
    }

    /// Returns the first audio stream.
    pub fn first_audio(&self) -> Option<&StreamInfo> {
        self.streams
            .iter()
            .find(|stream| stream.kind == StreamKind::Audio)
    }

    /// Returns true when the media carries at least one audio stream.
    pub fn has_audio(&self) -> bool {
        self.first_audio().is_some()
    }
}

/// Probes a media file via `ffprobe`.
///
/// # Example
/// ```no_run
/// use cutline_media_ffmpeg::probe_media;
///
/// let probe = probe_media("clip.mp4").expect("probe should succeed");
/// assert!(probe.duration_seconds > 0.0);
/// ```
pub fn probe_media(path: impl AsRef<Path>) -> Result<MediaProbe> {
    let path = path.as_ref();

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "stream=index,codec_type,codec_name,width,height,sample_rate,channels",
            "-of",
            "compact=p=0:nk=0",
        ])
        .arg(path)
        .output()
        .map_err(|source| MediaFfmpegError::Io {
            context: "run ffprobe stream probe",
            source,
        })?;

    if !output.status.success() {
        return Err(MediaFfmpegError::CommandFailed {
            command: format!("ffprobe stream probe {}", path.display()),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    let stdout = String::from_utf8(output.stdout)?;
    let mut streams = Vec::new();
    for line in stdout.lines().filter(|line| !line.trim().is_empty()) {
        streams.push(parse_stream_line(line)?);
    }

    if streams.is_empty() {
        return Err(MediaFfmpegError::Parse {
            context: "streams",
            value: "no streams found".to_string(),
        });
    }

    let duration_seconds = probe_duration_seconds(path)?
        .ok_or_else(|| MediaFfmpegError::MissingDuration(path.to_path_buf()))?;

    Ok(MediaProbe {
        path: path.to_path_buf(),
        duration_seconds,
        streams,
    })
}

pub(crate) fn parse_stream_line(line: &str) -> Result<StreamInfo> {
    let mut map = HashMap::<&str, &str>::new();
    for field in line.split('|') {
        let (key, value) = field
            .split_once('=')
            .ok_or_else(|| MediaFfmpegError::Parse {
                context: "stream field",
                value: field.to_string(),
            })?;
        map.insert(key.trim(), value.trim().trim_matches('"'));
    }

    let codec_type = map
        .get("codec_type")
        .copied()
        .ok_or_else(|| MediaFfmpegError::Parse {
            context: "codec_type",
            value: line.to_string(),
        })?;
    let kind = match codec_type {
        "video" => StreamKind::Video,
        "audio" => StreamKind::Audio,
        _ => StreamKind::Other,
    };

    let index =
        parse_optional_u32(map.get("index").copied(), "stream index")?.ok_or_else(|| {
            MediaFfmpegError::Parse {
                context: "stream index",
                value: line.to_string(),
            }
        })?;

    Ok(StreamInfo {
        index,
        kind,
        codec_name: map.get("codec_name").map(|value| value.to_string()),
        width: parse_optional_u32(map.get("width").copied(), "width")?,
        height: parse_optional_u32(map.get("height").copied(), "height")?,
        sample_rate: parse_optional_u32(map.get("sample_rate").copied(), "sample_rate")?,
        channels: parse_optional_u16(map.get("channels").copied(), "channels")?,
    })
}

fn probe_duration_seconds(path: &Path) -> Result<Option<f64>> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=nokey=1:noprint_wrappers=1",
        ])
        .arg(path)
        .output()
        .map_err(|source| MediaFfmpegError::Io {
            context: "run ffprobe duration probe",
            source,
        })?;

    if !output.status.success() {
        return Err(MediaFfmpegError::CommandFailed {
            command: format!("ffprobe duration probe {}", path.display()),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    let stdout = String::from_utf8(output.stdout)?;
    let value = stdout.trim();
    if value.is_empty() || value == "N/A" {
        return Ok(None);
    }
    let duration = value.parse::<f64>().map_err(|_| MediaFfmpegError::Parse {
        context: "format duration seconds",
        value: value.to_string(),
    })?;
    Ok(Some(duration))
}

fn parse_optional_u32(value: Option<&str>, context: &'static str) -> Result<Option<u32>> {
    parse_optional(value, context, str::parse::<u32>)
}

fn parse_optional_u16(value: Option<&str>, context: &'static str) -> Result<Option<u16>> {
    parse_optional(value, context, str::parse::<u16>)
}

fn parse_optional<T, F>(value: Option<&str>, context: &'static str, parse: F) -> Result<Option<T>>
where
    F: Fn(&str) -> std::result::Result<T, std::num::ParseIntError>,
{
    let Some(raw) = value else {
        return Ok(None);
    };
    if raw.is_empty() || raw == "N/A" {
        return Ok(None);
    }

    parse(raw).map(Some).map_err(|_| MediaFfmpegError::Parse {
        context,
        value: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::{StreamKind, parse_stream_line};

    #[test]
    fn parse_video_stream_line() {
        let line = "index=0|codec_type=video|codec_name=h264|width=1920|height=1080|sample_rate=N/A|channels=N/A";
        let stream = parse_stream_line(line).expect("line should parse");
        assert_eq!(stream.index, 0);
        assert_eq!(stream.kind, StreamKind::Video);
        assert_eq!(stream.codec_name.as_deref(), Some("h264"));
        assert_eq!(stream.width, Some(1920));
        assert_eq!(stream.height, Some(1080));
        assert_eq!(stream.sample_rate, None);
        assert_eq!(stream.channels, None);
    }

    #[test]
    fn parse_audio_stream_line() {
        let line = "index=1|codec_type=audio|codec_name=aac|sample_rate=48000|channels=2";
        let stream = parse_stream_line(line).expect("line should parse");
        assert_eq!(stream.kind, StreamKind::Audio);
        assert_eq!(stream.sample_rate, Some(48_000));
        assert_eq!(stream.channels, Some(2));
    }

    #[test]
    fn parse_line_without_codec_type_is_rejected() {
        let line = "index=0|codec_name=h264";
        assert!(parse_stream_line(line).is_err());
    }
}
