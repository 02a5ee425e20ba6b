use std::path::Path;
use std::process::Command;

use crate::error::{MediaFfmpegError, Result};
use crate::probe::probe_media;

/// A decoded video frame in RGBA format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedVideoFrame {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

/// A fully decoded audio track as interleaved f32 samples.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<f32>,
}

impl DecodedAudio {
    /// Returns the decoded duration in seconds.
    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0.0;
        }
        let frames = self.samples.len() / self.channels as usize;
        frames as f64 / self.sample_rate as f64
    }
}

/// Decodes the video frame at-or-after the requested timestamp.
///
/// # Example
/// ```no_run
/// use cutline_media_ffmpeg::decode_video_frame_near_seconds;
///
/// let frame = decode_video_frame_near_seconds("clip.mp4", 0.5)
///     .expect("decode should succeed");
/// assert!(!frame.rgba.is_empty());
/// ```
pub fn decode_video_frame_near_seconds(
    path: impl AsRef<Path>,
    at_seconds: f64,
) -> Result<DecodedVideoFrame> {
    if !at_seconds.is_finite() || at_seconds < 0.0 {
        return Err(MediaFfmpegError::InvalidTimestampSeconds(at_seconds));
    }

    let path = path.as_ref();
    let probe = probe_media(path)?;
    let video = probe
        .first_video()
        .ok_or_else(|| MediaFfmpegError::MissingVideoStream(path.to_path_buf()))?;
    let width = video
        .width
        .ok_or_else(|| MediaFfmpegError::MissingVideoDimensions(path.to_path_buf()))?;
    let height = video
        .height
        .ok_or_else(|| MediaFfmpegError::MissingVideoDimensions(path.to_path_buf()))?;

    let output = Command::new("ffmpeg")
        .args(["-hide_banner", "-v", "error"])
        .arg("-ss")
        .arg(format_seconds(at_seconds))
        .arg("-i")
        .arg(path)
        .args(["-frames:v", "1", "-f", "rawvideo", "-pix_fmt", "rgba", "-"])
        .output()
        .map_err(|source| MediaFfmpegError::Io {
            context: "run ffmpeg decode frame",
            source,
        })?;

    if !output.status.success() {
        return Err(MediaFfmpegError::CommandFailed {
            command: format!("ffmpeg decode frame {}", path.display()),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    let rgba = output.stdout;
    let expected_size = width as usize * height as usize * 4;
    if rgba.len() != expected_size {
        return Err(MediaFfmpegError::Parse {
            context: "decoded rgba size",
            value: format!("expected {expected_size} bytes, got {}", rgba.len()),
        });
    }

    Ok(DecodedVideoFrame {
        width,
        height,
        rgba,
    })
}

/// Decodes the whole audio track of a media file into interleaved f32 PCM.
///
/// # Example
/// ```no_run
/// use cutline_media_ffmpeg::decode_audio_samples;
///
/// let audio = decode_audio_samples("clip.mp4").expect("decode should succeed");
/// assert!(audio.sample_rate > 0);
/// ```
pub fn decode_audio_samples(path: impl AsRef<Path>) -> Result<DecodedAudio> {
    let path = path.as_ref();
    let probe = probe_media(path)?;
    let audio = probe
        .first_audio()
        .ok_or_else(|| MediaFfmpegError::MissingAudioStream(path.to_path_buf()))?;
    let sample_rate = audio
        .sample_rate
        .ok_or_else(|| MediaFfmpegError::MissingAudioStream(path.to_path_buf()))?;
    let channels = audio
        .channels
        .ok_or_else(|| MediaFfmpegError::MissingAudioStream(path.to_path_buf()))?;

    let output = Command::new("ffmpeg")
        .args(["-hide_banner", "-v", "error"])
        .arg("-i")
        .arg(path)
        .args(["-vn", "-f", "f32le", "-acodec", "pcm_f32le", "-"])
        .output()
        .map_err(|source| MediaFfmpegError::Io {
            context: "run ffmpeg decode audio",
            source,
        })?;

    if !output.status.success() {
        return Err(MediaFfmpegError::CommandFailed {
            command: format!("ffmpeg decode audio {}", path.display()),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    Ok(DecodedAudio {
        sample_rate,
        channels,
        samples: samples_from_f32le(&output.stdout),
    })
}

pub(crate) fn samples_from_f32le(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

pub(crate) fn format_seconds(seconds: f64) -> String {
    format!("{seconds:.6}")
}

#[cfg(test)]
mod tests {
    use super::{DecodedAudio, format_seconds, samples_from_f32le};

    #[test]
    fn samples_from_f32le_converts_little_endian_chunks() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&0.5f32.to_le_bytes());
        bytes.extend_from_slice(&(-1.0f32).to_le_bytes());

        let samples = samples_from_f32le(&bytes);
        assert_eq!(samples, vec![0.5, -1.0]);
    }

    #[test]
    fn samples_from_f32le_ignores_trailing_partial_chunk() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&1.0f32.to_le_bytes());
        bytes.extend_from_slice(&[0x00, 0x01]);

        let samples = samples_from_f32le(&bytes);
        assert_eq!(samples, vec![1.0]);
    }

    #[test]
    fn decoded_audio_duration_counts_interleaved_frames() {
        let audio = DecodedAudio {
            sample_rate: 48_000,
            channels: 2,
            samples: vec![0.0; 96_000],
        };
        assert!((audio.duration_seconds() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn format_seconds_produces_fractional_timestamp() {
        assert_eq!(format_seconds(4.0), "4.000000");
        assert_eq!(format_seconds(0.5), "0.500000");
    }
}
