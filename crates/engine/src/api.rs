use std::path::PathBuf;

use tracing::info;

use crate::clock::{PlaybackClock, TransportState};
use crate::error::{EngineError, Result};
use crate::export::{SynthesisItem, build_synthesis_plan};
use crate::media::{FfmpegMediaBackend, MediaBackend};
use crate::mixer::{AudioMixingEngine, AudioSink};
use crate::project::{Project, SourceInfo, TimelineSnapshot};
use crate::render::{VideoRenderer, VideoSurface};
use crate::timeline::{
    FragmentId, SegmentId, Timeline, seconds_from_ticks, ticks_from_seconds,
};

/// Events delivered to the registered change listener.
///
/// Structural errors are returned synchronously from the mutating call;
/// transient playback errors arrive here and never cross a tick boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A timeline mutation was committed; carries the new lists.
    TimelineChanged(TimelineSnapshot),
    PositionChanged { seconds: f64 },
    PlaybackFinished,
    Error(PlaybackErrorEvent),
}

/// User-facing error payload emitted as an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackErrorKind {
    InvalidCutPoint,
    NoAudioToDetach,
    MediaLoad,
    PlaybackStartRejected,
    Other,
}

impl From<&EngineError> for PlaybackErrorKind {
    fn from(value: &EngineError) -> Self {
        match value {
            EngineError::InvalidCutPoint { .. } => Self::InvalidCutPoint,
            EngineError::NoAudioToDetach { .. } => Self::NoAudioToDetach,
            EngineError::Media(_) => Self::MediaLoad,
            EngineError::PlaybackStartRejected { .. } => Self::PlaybackStartRejected,
            _ => Self::Other,
        }
    }
}

/// User-facing error payload emitted as an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackErrorEvent {
    pub kind: PlaybackErrorKind,
    pub message: String,
}

impl PlaybackErrorEvent {
    pub fn from_error(error: &EngineError) -> Self {
        Self {
            kind: PlaybackErrorKind::from(error),
            message: error.to_string(),
        }
    }
}

/// Change listener invoked after committed mutations and transport moves.
pub type EventListener = Box<dyn FnMut(&Event)>;

/// The editing engine: timeline, transport, renderer, and mixer behind
/// one facade.
///
/// The platform frame driver calls [`Engine::tick`] once per display
/// refresh with the wall-clock delta; everything else is command-style
/// and synchronous.
pub struct Engine<M> {
    media: M,
    project: Project,
    clock: PlaybackClock,
    renderer: VideoRenderer,
    mixer: AudioMixingEngine,
    next_segment_id: u64,
    next_fragment_id: u64,
    listener: Option<EventListener>,
}

impl<M> Engine<M>
where
    M: MediaBackend,
{
    /// Creates a new engine with the provided media backend.
    pub fn new(media: M) -> Self {
        Self {
            media,
            project: Project::new(),
            clock: PlaybackClock::new(),
            renderer: VideoRenderer::new(),
            mixer: AudioMixingEngine::new(),
            next_segment_id: 1,
            next_fragment_id: 1,
            listener: None,
        }
    }

    /// Registers the change listener. Replaces any previous listener.
    pub fn set_listener(&mut self, listener: EventListener) {
        self.listener = Some(listener);
    }

    /// Binds the surface frames are drawn to.
    pub fn bind_video_surface(&mut self, surface: Box<dyn VideoSurface>) {
        self.renderer.bind_surface(surface);
    }

    /// Binds the audio output sources are scheduled against.
    pub fn bind_audio_sink(&mut self, sink: Box<dyn AudioSink>) {
        self.mixer.bind_sink(sink);
    }

    /// Read-only view of the timeline.
    pub fn timeline(&self) -> &Timeline {
        &self.project.timeline
    }

    /// Creates an immutable snapshot of the current project state.
    pub fn snapshot(&self) -> TimelineSnapshot {
        self.project.snapshot()
    }

    /// Current playback position in seconds.
    pub fn current_position(&self) -> f64 {
        seconds_from_ticks(self.clock.position_tl())
    }

    /// Total timeline duration in seconds.
    pub fn total_duration(&self) -> f64 {
        seconds_from_ticks(self.project.timeline.total_duration())
    }

    pub fn is_playing(&self) -> bool {
        self.clock.is_playing()
    }

    pub fn transport_state(&self) -> TransportState {
        self.clock.state()
    }

    /// Imports a video source and appends it to the end of the timeline.
    pub fn import_video(&mut self, source_name: &str) -> Result<SegmentId> {
        let probed = self.media.probe_source(source_name)?;
        let duration_tl = probed.duration_tl;
        let has_audio = probed.has_audio;
        self.project.register_source(SourceInfo::from(probed));

        let segment_id = self.allocate_segment_id();
        self.project.timeline.append_imported_segment(
            segment_id,
            source_name.to_string(),
            duration_tl,
            has_audio,
        );

        info!(source_name, segment_id, duration_tl, has_audio, "video imported");
        self.commit_timeline_change();
        Ok(segment_id)
    }

    /// Imports an audio source and appends it to the end of the audio
    /// lane.
    pub fn import_audio(&mut self, source_name: &str) -> Result<FragmentId> {
        let probed = self.media.probe_source(source_name)?;
        let duration_tl = probed.duration_tl;
        self.project.register_source(SourceInfo::from(probed));

        let fragment_id = self.allocate_fragment_id();
        self.project.timeline.append_imported_fragment(
            fragment_id,
            source_name.to_string(),
            duration_tl,
        );

        info!(source_name, fragment_id, duration_tl, "audio imported");
        self.commit_timeline_change();
        Ok(fragment_id)
    }

    /// Splits the segment at `at_seconds` into two segments sharing its
    /// source.
    pub fn split_at(&mut self, at_seconds: f64) -> Result<(SegmentId, SegmentId)> {
        let at_tl = ticks_from_seconds(at_seconds);
        let right_id = self.next_segment_id;
        let (left, right) = self.project.timeline.split_at(at_tl, right_id)?;
        let allocated = self.allocate_segment_id();
        debug_assert_eq!(
            allocated, right_id,
            "allocated segment id diverged from the split request id"
        );

        info!(
            at_tl,
            left_id = left,
            right_id = right,
            segment_count = self.project.timeline.segments().len(),
            "split applied"
        );
        self.commit_timeline_change();
        Ok((left, right))
    }

    /// Detaches a segment's embedded audio into a new lane fragment.
    ///
    /// The backend extraction runs first; the in-memory fragment is
    /// appended only after that call succeeds, so a failed extraction
    /// leaves the timeline untouched.
    pub fn detach_audio(&mut self, segment_id: SegmentId) -> Result<FragmentId> {
        let segment = self
            .project
            .timeline
            .segment_by_id(segment_id)
            .ok_or(EngineError::SegmentIdNotFound { segment_id })?;
        if !segment.has_audio {
            return Err(EngineError::NoAudioToDetach { segment_id });
        }
        let source_name = segment.source_name.clone();

        let audio_source = self.media.extract_audio(&source_name)?;

        let fragment_id = self.next_fragment_id;
        self.project
            .timeline
            .detach_audio(segment_id, fragment_id, audio_source.clone())?;
        let allocated = self.allocate_fragment_id();
        debug_assert_eq!(
            allocated, fragment_id,
            "allocated fragment id diverged from the detach request id"
        );

        info!(segment_id, fragment_id, audio_source = %audio_source, "audio detached");
        self.commit_timeline_change();
        Ok(fragment_id)
    }

    /// Drags a lane fragment toward `desired_start_seconds`; returns the
    /// clamped position it actually landed on.
    pub fn reposition_fragment(
        &mut self,
        fragment_id: FragmentId,
        desired_start_seconds: f64,
    ) -> Result<f64> {
        let desired_tl = ticks_from_seconds(desired_start_seconds);
        let actual_tl = self
            .project
            .timeline
            .reposition_fragment(fragment_id, desired_tl)?;
        self.commit_timeline_change();
        Ok(seconds_from_ticks(actual_tl))
    }

    /// Removes a segment; following segments shift left to close the gap.
    pub fn remove_segment(&mut self, segment_id: SegmentId) -> Result<()> {
        self.project.timeline.remove_segment(segment_id)?;
        info!(
            segment_id,
            segment_count = self.project.timeline.segments().len(),
            "segment removed"
        );
        self.commit_timeline_change();
        Ok(())
    }

    /// Starts playback.
    ///
    /// A start on an empty timeline is a silent no-op. A refusal from the
    /// audio output reverts the clock to `Stopped` and the rejection is
    /// returned to the caller.
    pub fn play(&mut self) -> Result<()> {
        if !self.clock.play(&self.project.timeline) {
            return Ok(());
        }
        if let Err(error) = self.mixer.resume() {
            self.clock.pause();
            self.emit(Event::Error(PlaybackErrorEvent::from_error(&error)));
            return Err(error);
        }

        let position_tl = self.clock.position_tl();
        self.renderer
            .render_at(position_tl, &self.project.timeline, &self.media);
        self.mixer.tick(position_tl, &self.media);
        self.emit_transient_errors();
        Ok(())
    }

    /// Stops playback at the current position and releases all scheduled
    /// audio sources. The frame driver observes `is_playing()` and
    /// cancels its pending callback.
    pub fn pause(&mut self) {
        self.clock.pause();
        self.mixer.stop_all();
    }

    /// Seeks to `seconds` (clamped into the timeline), renders the frame
    /// at the target, and restarts audio there when playing. Returns the
    /// clamped position in seconds.
    pub fn seek(&mut self, seconds: f64) -> f64 {
        let target_tl = ticks_from_seconds(seconds);
        let position_tl = self.clock.seek(target_tl, &self.project.timeline);

        self.mixer.stop_all();
        self.renderer
            .render_at(position_tl, &self.project.timeline, &self.media);
        if self.clock.is_playing() {
            self.mixer.tick(position_tl, &self.media);
        }
        self.emit_transient_errors();

        let position_seconds = seconds_from_ticks(position_tl);
        self.emit(Event::PositionChanged {
            seconds: position_seconds,
        });
        position_seconds
    }

    /// Advances the clock by one frame-driver delta and drives the
    /// renderer and the mixer from the same position sample.
    pub fn tick(&mut self, delta_seconds: f64) {
        let Some(tick) = self.clock.tick(delta_seconds, &self.project.timeline) else {
            return;
        };

        self.renderer
            .render_at(tick.position_tl, &self.project.timeline, &self.media);
        self.mixer.tick(tick.position_tl, &self.media);
        self.emit_transient_errors();

        if tick.finished {
            self.mixer.stop_all();
            self.emit(Event::PlaybackFinished);
        }
        self.emit(Event::PositionChanged {
            seconds: seconds_from_ticks(tick.position_tl),
        });
    }

    /// Sets the master gain without touching scheduled sources.
    pub fn set_volume(&mut self, gain: f32) {
        self.mixer.set_volume(gain);
    }

    /// Mutes output; scheduled sources keep running at zero gain.
    pub fn mute(&mut self) {
        self.mixer.mute();
    }

    /// Generates preview thumbnails for an imported source.
    pub fn extract_thumbnails(&self, source_name: &str) -> Result<Vec<PathBuf>> {
        self.media.extract_thumbnails(source_name)
    }

    /// Synthesizes the final file from the current timeline.
    ///
    /// Segments trimmed by metadata-only splits are first materialized
    /// into independent files through the backend's physical cut.
    pub fn render_final(&mut self) -> Result<PathBuf> {
        let plan = build_synthesis_plan(&self.project)?;
        let mut ordered = Vec::with_capacity(plan.items.len());
        for item in plan.items {
            ordered.push(self.materialize_item(item)?);
        }
        let output = self.media.synthesize_final(&ordered)?;
        info!(output = %output.display(), "final synthesis complete");
        Ok(output)
    }

    fn materialize_item(&self, item: SynthesisItem) -> Result<String> {
        let Some(trim) = item.trim else {
            return Ok(item.source_name);
        };

        let mut name = item.source_name;
        let mut end_tl = trim.end_tl;
        let mut duration_tl = trim.source_duration_tl;
        if trim.start_tl > 0 {
            let (_, tail) = self
                .media
                .cut_media(&name, seconds_from_ticks(trim.start_tl))?;
            name = tail;
            end_tl -= trim.start_tl;
            duration_tl -= trim.start_tl;
        }
        if end_tl < duration_tl {
            let (head, _) = self.media.cut_media(&name, seconds_from_ticks(end_tl))?;
            name = head;
        }
        Ok(name)
    }

    /// Applied after every committed mutation: re-resolve the clock's
    /// active segment, rebuild and preload the mixer's play list, restart
    /// audio at the play head when playing, and notify the listener.
    fn commit_timeline_change(&mut self) {
        self.clock.resync(&self.project.timeline);
        self.mixer.rebuild_play_list(&self.project.timeline);
        self.mixer.prepare(&self.media);
        if self.clock.is_playing() {
            self.mixer.tick(self.clock.position_tl(), &self.media);
        }
        self.emit_transient_errors();
        self.emit(Event::TimelineChanged(self.project.snapshot()));
    }

    fn emit_transient_errors(&mut self) {
        for message in self.renderer.take_errors() {
            self.emit(Event::Error(PlaybackErrorEvent {
                kind: PlaybackErrorKind::MediaLoad,
                message,
            }));
        }
        for message in self.mixer.take_errors() {
            self.emit(Event::Error(PlaybackErrorEvent {
                kind: PlaybackErrorKind::MediaLoad,
                message,
            }));
        }
    }

    fn emit(&mut self, event: Event) {
        if let Some(listener) = self.listener.as_mut() {
            listener(&event);
        }
    }

    fn allocate_segment_id(&mut self) -> u64 {
        let id = self.next_segment_id;
        self.next_segment_id += 1;
        id
    }

    fn allocate_fragment_id(&mut self) -> u64 {
        let id = self.next_fragment_id;
        self.next_fragment_id += 1;
        id
    }
}

impl Engine<FfmpegMediaBackend> {
    /// Creates an engine wired to the FFmpeg backend with sources
    /// resolved inside `workspace`.
    pub fn with_ffmpeg(workspace: impl Into<PathBuf>) -> Self {
        Self::new(FfmpegMediaBackend::new(workspace))
    }
}
