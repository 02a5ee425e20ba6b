//! UI-agnostic timeline playback and mixing engine for Cutline.
//!
//! The timeline is a gapless sequence of trimmed video segments plus an
//! audio fragment lane. A single playback clock drives the frame
//! renderer and the audio mixer from one position sample per tick; edit
//! operations mutate the timeline non-destructively and notify the
//! application layer through a change listener.

pub mod api;
pub mod cache;
pub mod clock;
pub mod edit;
pub mod error;
pub mod export;
pub mod media;
pub mod mixer;
pub mod project;
pub mod render;
pub mod timeline;

pub use api::{Engine, Event, EventListener, PlaybackErrorEvent, PlaybackErrorKind};
pub use clock::{PlaybackClock, Tick, TransportState};
pub use error::{EngineError, Result};
pub use media::{FfmpegMediaBackend, MediaBackend, ProbedSource};
pub use mixer::{AudioBuffer, AudioMixingEngine, AudioSink, SourceHandle};
pub use project::{FragmentView, Project, SegmentView, SourceInfo, TimelineSnapshot};
pub use render::{MediaObject, PixelFormat, VideoFrame, VideoRenderer, VideoSurface};
pub use timeline::{
    AudioFragment, FragmentId, SegmentId, TICKS_PER_SECOND, Timeline, VideoSegment,
    seconds_from_ticks, ticks_from_seconds,
};
