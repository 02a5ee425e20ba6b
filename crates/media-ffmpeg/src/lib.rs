//! FFmpeg CLI backend for the Cutline editing engine.
//!
//! Every operation shells out to `ffmpeg`/`ffprobe` and parses their
//! output; nothing in this crate decodes media in-process.

mod concat;
mod cut;
mod decode;
mod error;
mod probe;

pub use concat::concat_media;
pub use cut::{extract_audio_track, generate_thumbnails, split_media_at};
pub use decode::{
    DecodedAudio, DecodedVideoFrame, decode_audio_samples, decode_video_frame_near_seconds,
};
pub use error::{MediaFfmpegError, Result};
pub use probe::{MediaProbe, StreamInfo, StreamKind, probe_media};
