//! Media backend boundary.
//!
//! The engine never decodes media itself: probing, physical cuts, audio
//! extraction, decoding, and final synthesis are delegated through
//! [`MediaBackend`]. The production implementation resolves source names
//! inside a workspace directory and shells out to FFmpeg through the
//! `cutline-media-ffmpeg` crate.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::warn;

use crate::error::Result;
use crate::mixer::AudioBuffer;
use crate::render::{MediaObject, PixelFormat, VideoFrame};
use crate::timeline::ticks_from_seconds;

/// Result of probing one media source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbedSource {
    pub source_name: String,
    pub duration_tl: i64,
    pub has_audio: bool,
}

/// Media operations required by the engine.
pub trait MediaBackend {
    /// Probes a source's duration and audio presence for import.
    fn probe_source(&self, source_name: &str) -> Result<ProbedSource>;

    /// Physically splits a source into two new sources at `at_seconds`.
    ///
    /// Timeline splits are metadata-only; this call exists to materialize
    /// independent files when synthesis needs them.
    fn cut_media(&self, source_name: &str, at_seconds: f64) -> Result<(String, String)>;

    /// Extracts a source's audio track into a new audio source, returning
    /// its name.
    fn extract_audio(&self, source_name: &str) -> Result<String>;

    /// Generates preview thumbnails for a source.
    fn extract_thumbnails(&self, source_name: &str) -> Result<Vec<PathBuf>>;

    /// Resolves a source name to a URL/path a platform media object can
    /// consume.
    fn resolve_playable_url(&self, source_name: &str) -> Result<String>;

    /// Decodes a source's audio track into a shareable buffer.
    fn decode_audio(&self, source_name: &str) -> Result<AudioBuffer>;

    /// Creates the platform media object for a source.
    fn open_media(&self, source_name: &str) -> Result<Box<dyn MediaObject>>;

    /// Concatenates the ordered sources into the final output file.
    fn synthesize_final(&self, ordered_source_names: &[String]) -> Result<PathBuf>;
}

/// FFmpeg CLI-backed implementation used by production wiring.
///
/// Source names are file names inside the workspace directory.
#[derive(Debug, Clone)]
pub struct FfmpegMediaBackend {
    workspace: PathBuf,
}

const FINAL_OUTPUT_NAME: &str = "cutline_export.mp4";

impl FfmpegMediaBackend {
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        Self {
            workspace: workspace.into(),
        }
    }

    fn resolve(&self, source_name: &str) -> PathBuf {
        self.workspace.join(source_name)
    }
}

impl MediaBackend for FfmpegMediaBackend {
    fn probe_source(&self, source_name: &str) -> Result<ProbedSource> {
        let probe = cutline_media_ffmpeg::probe_media(self.resolve(source_name))?;
        Ok(ProbedSource {
            source_name: source_name.to_string(),
            duration_tl: ticks_from_seconds(probe.duration_seconds),
            has_audio: probe.has_audio(),
        })
    }

    fn cut_media(&self, source_name: &str, at_seconds: f64) -> Result<(String, String)> {
        let (part_one, part_two) = derived_cut_names(source_name);
        cutline_media_ffmpeg::split_media_at(
            self.resolve(source_name),
            at_seconds,
            self.resolve(&part_one),
            self.resolve(&part_two),
        )?;
        Ok((part_one, part_two))
    }

    fn extract_audio(&self, source_name: &str) -> Result<String> {
        let audio_name = derived_audio_name(source_name);
        cutline_media_ffmpeg::extract_audio_track(
            self.resolve(source_name),
            self.resolve(&audio_name),
        )?;
        Ok(audio_name)
    }

    fn extract_thumbnails(&self, source_name: &str) -> Result<Vec<PathBuf>> {
        let thumbnail_dir = self
            .workspace
            .join(format!("{}_thumbs", source_stem(source_name)));
        let thumbnails =
            cutline_media_ffmpeg::generate_thumbnails(self.resolve(source_name), thumbnail_dir)?;
        Ok(thumbnails)
    }

    fn resolve_playable_url(&self, source_name: &str) -> Result<String> {
        Ok(self.resolve(source_name).display().to_string())
    }

    fn decode_audio(&self, source_name: &str) -> Result<AudioBuffer> {
        let decoded = cutline_media_ffmpeg::decode_audio_samples(self.resolve(source_name))?;
        Ok(AudioBuffer {
            sample_rate: decoded.sample_rate,
            channels: decoded.channels,
            samples: Arc::from(decoded.samples),
        })
    }

    fn open_media(&self, source_name: &str) -> Result<Box<dyn MediaObject>> {
        let url = self.resolve_playable_url(source_name)?;
        Ok(Box::new(FfmpegMediaObject::new(PathBuf::from(url))))
    }

    fn synthesize_final(&self, ordered_source_names: &[String]) -> Result<PathBuf> {
        let inputs: Vec<PathBuf> = ordered_source_names
            .iter()
            .map(|name| self.resolve(name))
            .collect();
        let output_path = self.workspace.join(FINAL_OUTPUT_NAME);
        cutline_media_ffmpeg::concat_media(&inputs, &output_path)?;
        Ok(output_path)
    }
}

/// Media object decoding frames through the FFmpeg CLI.
///
/// Frames are decoded on demand when the read head moves far enough from
/// the previously decoded position; in between, the cached frame is the
/// "most recently decoded" one the renderer presents.
struct FfmpegMediaObject {
    path: PathBuf,
    loaded: bool,
    read_head_seconds: f64,
    decoded_at_seconds: Option<f64>,
    frame: Option<VideoFrame>,
}

/// Decode step under which the cached frame is reused, roughly one frame
/// period at 30 fps.
const FRAME_REUSE_WINDOW_SECONDS: f64 = 1.0 / 30.0;

impl FfmpegMediaObject {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            loaded: false,
            read_head_seconds: 0.0,
            decoded_at_seconds: None,
            frame: None,
        }
    }
}

impl MediaObject for FfmpegMediaObject {
    fn begin_load(&mut self) {
        match cutline_media_ffmpeg::probe_media(&self.path) {
            Ok(_) => self.loaded = true,
            Err(error) => {
                warn!(path = %self.path.display(), %error, "media metadata load failed");
            }
        }
    }

    fn is_loaded(&self) -> bool {
        self.loaded
    }

    fn seek_to(&mut self, source_seconds: f64) {
        self.read_head_seconds = source_seconds.max(0.0);
    }

    fn current_frame(&mut self) -> Option<VideoFrame> {
        let needs_decode = match self.decoded_at_seconds {
            Some(at) => (self.read_head_seconds - at).abs() >= FRAME_REUSE_WINDOW_SECONDS,
            None => true,
        };
        if needs_decode {
            match cutline_media_ffmpeg::decode_video_frame_near_seconds(
                &self.path,
                self.read_head_seconds,
            ) {
                Ok(decoded) => {
                    self.frame = Some(VideoFrame {
                        width: decoded.width,
                        height: decoded.height,
                        format: PixelFormat::Rgba8,
                        bytes: Arc::from(decoded.rgba),
                    });
                    self.decoded_at_seconds = Some(self.read_head_seconds);
                }
                Err(error) => {
                    warn!(path = %self.path.display(), %error, "frame decode failed");
                }
            }
        }
        self.frame.clone()
    }
}

fn source_stem(source_name: &str) -> &str {
    Path::new(source_name)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(source_name)
}

fn source_extension(source_name: &str) -> Option<&str> {
    Path::new(source_name)
        .extension()
        .and_then(|ext| ext.to_str())
}

fn derived_cut_names(source_name: &str) -> (String, String) {
    let stem = source_stem(source_name);
    match source_extension(source_name) {
        Some(ext) => (format!("{stem}_a.{ext}"), format!("{stem}_b.{ext}")),
        None => (format!("{stem}_a"), format!("{stem}_b")),
    }
}

fn derived_audio_name(source_name: &str) -> String {
    format!("{}.mp3", source_stem(source_name))
}
