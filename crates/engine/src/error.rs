use std::fmt::{Display, Formatter};

/// Result type used by the engine crate.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors produced by timeline edits and playback control.
#[derive(Debug)]
pub enum EngineError {
    /// Cut lands on a segment boundary or would produce a half shorter
    /// than the minimum clip length. Rejected before any mutation.
    InvalidCutPoint {
        at_tl: i64,
    },
    /// The segment has no embedded audio left to detach.
    NoAudioToDetach {
        segment_id: u64,
    },
    SegmentNotFound {
        at_tl: i64,
    },
    SegmentIdNotFound {
        segment_id: u64,
    },
    FragmentIdNotFound {
        fragment_id: u64,
    },
    SourceNotFound {
        source_name: String,
    },
    EmptyTimeline,
    /// The audio output refused to start (device busy, autoplay policy).
    PlaybackStartRejected {
        reason: String,
    },
    Media(cutline_media_ffmpeg::MediaFfmpegError),
}

impl Display for EngineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidCutPoint { at_tl } => {
                write!(f, "invalid cut point at timeline tick {at_tl}")
            }
            Self::NoAudioToDetach { segment_id } => {
                write!(f, "segment {segment_id} has no audio to detach")
            }
            Self::SegmentNotFound { at_tl } => {
                write!(f, "no segment at timeline tick {at_tl}")
            }
            Self::SegmentIdNotFound { segment_id } => {
                write!(f, "segment not found: {segment_id}")
            }
            Self::FragmentIdNotFound { fragment_id } => {
                write!(f, "audio fragment not found: {fragment_id}")
            }
            Self::SourceNotFound { source_name } => {
                write!(f, "media source not registered: {source_name}")
            }
            Self::EmptyTimeline => write!(f, "timeline is empty"),
            Self::PlaybackStartRejected { reason } => {
                write!(f, "playback start rejected: {reason}")
            }
            Self::Media(err) => write!(f, "media backend error: {err}"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Media(err) => Some(err),
            _ => None,
        }
    }
}

impl From<cutline_media_ffmpeg::MediaFfmpegError> for EngineError {
    fn from(value: cutline_media_ffmpeg::MediaFfmpegError) -> Self {
        Self::Media(value)
    }
}
