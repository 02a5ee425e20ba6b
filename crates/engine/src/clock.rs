//! Authoritative transport state machine.
//!
//! The clock owns the single playback position; the renderer and the
//! mixer are read-only observers that receive the same position sample
//! each tick. Ticks are driven externally by a platform frame driver
//! reporting wall-clock deltas.

use tracing::debug;

use crate::timeline::{SegmentId, Timeline, ticks_from_seconds};

/// Transport state. `Seeking` is transient: a seek resolves the new
/// active segment and re-enters the previous play/pause state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransportState {
    #[default]
    Stopped,
    Playing,
    Seeking,
}

/// Result of one clock tick while playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    /// Position after the advance, in timeline ticks.
    pub position_tl: i64,
    /// Set when the advance crossed into a different segment.
    pub entered_segment: Option<SegmentId>,
    /// Set when the position reached the timeline end; the clock has
    /// stopped.
    pub finished: bool,
}

/// Playback clock: position, play/pause/seek, and tick advancement.
#[derive(Debug, Default)]
pub struct PlaybackClock {
    state: TransportState,
    position_tl: i64,
    active_segment: Option<SegmentId>,
}

impl PlaybackClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == TransportState::Playing
    }

    /// Current position in timeline ticks.
    pub fn position_tl(&self) -> i64 {
        self.position_tl
    }

    /// Starts playback. A start on an empty timeline is a silent no-op;
    /// a start at the timeline end rewinds to zero first. Returns true
    /// when the clock entered `Playing`.
    pub fn play(&mut self, timeline: &Timeline) -> bool {
        if timeline.segments().is_empty() {
            debug!("play ignored: timeline is empty");
            return false;
        }
        if self.position_tl >= timeline.total_duration() {
            self.position_tl = 0;
        }
        self.active_segment = timeline.segment_at(self.position_tl).map(|s| s.id);
        self.state = TransportState::Playing;
        debug!(position_tl = self.position_tl, "playback started");
        true
    }

    /// Stops playback at the current position.
    pub fn pause(&mut self) {
        self.state = TransportState::Stopped;
        debug!(position_tl = self.position_tl, "playback paused");
    }

    /// Seeks to `t_tl`, clamped into `[0, total_duration]`, resolving the
    /// active segment at the target. The previous play/pause state is
    /// restored after the transient `Seeking` state.
    pub fn seek(&mut self, t_tl: i64, timeline: &Timeline) -> i64 {
        let resume = self.state == TransportState::Playing;
        self.state = TransportState::Seeking;

        let clamped = t_tl.clamp(0, timeline.total_duration());
        self.position_tl = clamped;
        self.active_segment = timeline.segment_at(clamped).map(|s| s.id);

        self.state = if resume {
            TransportState::Playing
        } else {
            TransportState::Stopped
        };
        debug!(position_tl = clamped, resume, "seek resolved");
        clamped
    }

    /// Re-resolves the active segment after a timeline mutation without
    /// moving the position.
    pub fn resync(&mut self, timeline: &Timeline) {
        self.position_tl = self.position_tl.clamp(0, timeline.total_duration());
        self.active_segment = timeline.segment_at(self.position_tl).map(|s| s.id);
    }

    /// Advances the position by a wall-clock delta. Returns `None` unless
    /// the clock is playing.
    pub fn tick(&mut self, delta_seconds: f64, timeline: &Timeline) -> Option<Tick> {
        if self.state != TransportState::Playing {
            return None;
        }

        let total = timeline.total_duration();
        let advanced = self.position_tl + ticks_from_seconds(delta_seconds.max(0.0));
        self.position_tl = advanced.min(total);

        let current = timeline.segment_at(self.position_tl).map(|s| s.id);
        let entered_segment = if current != self.active_segment {
            self.active_segment = current;
            debug!(
                position_tl = self.position_tl,
                segment_id = ?current,
                "segment advance"
            );
            current
        } else {
            None
        };

        let finished = self.position_tl >= total;
        if finished {
            self.state = TransportState::Stopped;
            debug!(position_tl = self.position_tl, "playback finished");
        }

        Some(Tick {
            position_tl: self.position_tl,
            entered_segment,
            finished,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{PlaybackClock, TransportState};
    use crate::timeline::Timeline;

    const SECOND: i64 = 1_000_000;

    fn two_segment_timeline() -> Timeline {
        let mut timeline = Timeline::default();
        timeline.append_imported_segment(1, "a.mp4".to_string(), 4 * SECOND, true);
        timeline.append_imported_segment(2, "b.mp4".to_string(), 6 * SECOND, true);
        timeline
    }

    #[test]
    fn play_on_empty_timeline_is_silent_no_op() {
        let mut clock = PlaybackClock::new();
        assert!(!clock.play(&Timeline::default()));
        assert_eq!(clock.state(), TransportState::Stopped);
    }

    #[test]
    fn tick_advances_position_while_playing() {
        let timeline = two_segment_timeline();
        let mut clock = PlaybackClock::new();
        assert!(clock.play(&timeline));

        let tick = clock.tick(0.5, &timeline).expect("tick while playing");
        assert_eq!(tick.position_tl, SECOND / 2);
        assert!(tick.entered_segment.is_none());
        assert!(!tick.finished);
    }

    #[test]
    fn tick_when_stopped_returns_none() {
        let timeline = two_segment_timeline();
        let mut clock = PlaybackClock::new();
        assert!(clock.tick(0.5, &timeline).is_none());
    }

    #[test]
    fn tick_reports_segment_advance_at_trim_boundary() {
        let timeline = two_segment_timeline();
        let mut clock = PlaybackClock::new();
        clock.play(&timeline);
        clock.tick(3.9, &timeline).expect("tick");

        let tick = clock.tick(0.2, &timeline).expect("tick");
        assert_eq!(tick.entered_segment, Some(2));
        assert!(!tick.finished);
    }

    #[test]
    fn tick_clamps_at_total_duration_and_stops() {
        let timeline = two_segment_timeline();
        let mut clock = PlaybackClock::new();
        clock.play(&timeline);

        let tick = clock.tick(60.0, &timeline).expect("tick");
        assert_eq!(tick.position_tl, 10 * SECOND);
        assert!(tick.finished);
        assert_eq!(clock.state(), TransportState::Stopped);
    }

    #[test]
    fn play_after_finish_rewinds_to_start() {
        let timeline = two_segment_timeline();
        let mut clock = PlaybackClock::new();
        clock.play(&timeline);
        clock.tick(60.0, &timeline).expect("tick");

        assert!(clock.play(&timeline));
        assert_eq!(clock.position_tl(), 0);
    }

    #[test]
    fn seek_clamps_and_preserves_stopped_state() {
        let timeline = two_segment_timeline();
        let mut clock = PlaybackClock::new();

        assert_eq!(clock.seek(99 * SECOND, &timeline), 10 * SECOND);
        assert_eq!(clock.state(), TransportState::Stopped);

        assert_eq!(clock.seek(-5 * SECOND, &timeline), 0);
    }

    #[test]
    fn seek_while_playing_stays_playing() {
        let timeline = two_segment_timeline();
        let mut clock = PlaybackClock::new();
        clock.play(&timeline);

        clock.seek(5 * SECOND, &timeline);
        assert_eq!(clock.state(), TransportState::Playing);

        // No advance is reported for the segment the seek resolved.
        let tick = clock.tick(0.1, &timeline).expect("tick");
        assert!(tick.entered_segment.is_none());
    }

    #[test]
    fn pause_keeps_position() {
        let timeline = two_segment_timeline();
        let mut clock = PlaybackClock::new();
        clock.play(&timeline);
        clock.tick(2.0, &timeline).expect("tick");

        clock.pause();
        assert_eq!(clock.state(), TransportState::Stopped);
        assert_eq!(clock.position_tl(), 2 * SECOND);
    }

    #[test]
    fn large_delta_skips_across_multiple_segments() {
        let mut timeline = Timeline::default();
        timeline.append_imported_segment(1, "a.mp4".to_string(), 2 * SECOND, true);
        timeline.append_imported_segment(2, "b.mp4".to_string(), 2 * SECOND, true);
        timeline.append_imported_segment(3, "c.mp4".to_string(), 6 * SECOND, true);

        let mut clock = PlaybackClock::new();
        clock.play(&timeline);
        let tick = clock.tick(5.0, &timeline).expect("tick");
        assert_eq!(tick.entered_segment, Some(3));
    }
}
