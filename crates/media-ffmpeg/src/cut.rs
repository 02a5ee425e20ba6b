use std::path::{Path, PathBuf};
use std::process::Command;

use crate::decode::format_seconds;
use crate::error::{MediaFfmpegError, Result};

/// Splits a media file into two parts at `at_seconds` without re-encoding.
///
/// Writes the range `[0, at_seconds)` to `part_one` and the remainder to
/// `part_two` in a single ffmpeg invocation with stream copy.
///
/// # Example
/// ```no_run
/// use cutline_media_ffmpeg::split_media_at;
///
/// split_media_at("clip.mp4", 4.0, "clip_a.mp4", "clip_b.mp4")
///     .expect("split should succeed");
/// ```
pub fn split_media_at(
    path: impl AsRef<Path>,
    at_seconds: f64,
    part_one: impl AsRef<Path>,
    part_two: impl AsRef<Path>,
) -> Result<()> {
    if !at_seconds.is_finite() || at_seconds <= 0.0 {
        return Err(MediaFfmpegError::InvalidTimestampSeconds(at_seconds));
    }

    let path = path.as_ref();
    let cut_time = format_seconds(at_seconds);
    let output = Command::new("ffmpeg")
        .args(["-hide_banner", "-v", "error", "-y"])
        .arg("-i")
        .arg(path)
        .arg("-t")
        .arg(&cut_time)
        .args(["-c", "copy"])
        .arg(part_one.as_ref())
        .arg("-ss")
        .arg(&cut_time)
        .args(["-c", "copy"])
        .arg(part_two.as_ref())
        .output()
        .map_err(|source| MediaFfmpegError::Io {
            context: "run ffmpeg split",
            source,
        })?;

    if !output.status.success() {
        return Err(MediaFfmpegError::CommandFailed {
            command: format!("ffmpeg split {}", path.display()),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }
    Ok(())
}

/// Extracts the audio track of a media file into a standalone audio file.
///
/// # Example
/// ```no_run
/// use cutline_media_ffmpeg::extract_audio_track;
///
/// extract_audio_track("clip.mp4", "clip.mp3").expect("extract should succeed");
/// ```
pub fn extract_audio_track(path: impl AsRef<Path>, output_path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let output = Command::new("ffmpeg")
        .args(["-hide_banner", "-v", "error", "-y"])
        .arg("-i")
        .arg(path)
        .args(["-q:a", "0", "-map", "a"])
        .arg(output_path.as_ref())
        .output()
        .map_err(|source| MediaFfmpegError::Io {
            context: "run ffmpeg extract audio",
            source,
        })?;

    if !output.status.success() {
        return Err(MediaFfmpegError::CommandFailed {
            command: format!("ffmpeg extract audio {}", path.display()),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }
    Ok(())
}

/// Generates one thumbnail every five seconds into `thumbnail_dir`.
///
/// Returns the generated image paths in filename order.
pub fn generate_thumbnails(
    path: impl AsRef<Path>,
    thumbnail_dir: impl AsRef<Path>,
) -> Result<Vec<PathBuf>> {
    let path = path.as_ref();
    let thumbnail_dir = thumbnail_dir.as_ref();
    std::fs::create_dir_all(thumbnail_dir).map_err(|source| MediaFfmpegError::Io {
        context: "create thumbnail directory",
        source,
    })?;

    let pattern = thumbnail_dir.join("%04d.png");
    let output = Command::new("ffmpeg")
        .args(["-hide_banner", "-v", "error", "-y"])
        .arg("-i")
        .arg(path)
        .args(["-vf", "fps=1/5", "-q:v", "2"])
        .arg(&pattern)
        .output()
        .map_err(|source| MediaFfmpegError::Io {
            context: "run ffmpeg thumbnails",
            source,
        })?;

    if !output.status.success() {
        return Err(MediaFfmpegError::CommandFailed {
            command: format!("ffmpeg thumbnails {}", path.display()),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    let mut thumbnails = Vec::new();
    let entries = std::fs::read_dir(thumbnail_dir).map_err(|source| MediaFfmpegError::Io {
        context: "list thumbnail directory",
        source,
    })?;
    for entry in entries {
        let entry = entry.map_err(|source| MediaFfmpegError::Io {
            context: "list thumbnail directory",
            source,
        })?;
        let entry_path = entry.path();
        if entry_path.extension().is_some_and(|ext| ext == "png") {
            thumbnails.push(entry_path);
        }
    }
    thumbnails.sort();
    Ok(thumbnails)
}
