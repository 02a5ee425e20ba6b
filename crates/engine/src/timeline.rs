use serde::{Deserialize, Serialize};

/// Opaque identifier for video segments.
pub type SegmentId = u64;
/// Opaque identifier for audio fragments.
pub type FragmentId = u64;

/// Timeline tick resolution: microseconds.
pub const TICKS_PER_SECOND: i64 = 1_000_000;

/// Converts seconds to timeline ticks with nearest rounding.
pub fn ticks_from_seconds(seconds: f64) -> i64 {
    (seconds * TICKS_PER_SECOND as f64).round() as i64
}

/// Converts timeline ticks to seconds.
pub fn seconds_from_ticks(ticks: i64) -> f64 {
    ticks as f64 / TICKS_PER_SECOND as f64
}

/// A placed, trimmed reference to a source video file.
///
/// Multiple segments may reference the same source after a split; the
/// trim window `[source_start, source_end)` selects the part each one
/// plays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoSegment {
    pub id: SegmentId,
    pub source_name: String,
    pub source_start: i64,
    pub source_end: i64,
    pub timeline_start: i64,
    pub timeline_duration: i64,
    /// Whether the segment still owns its embedded audio.
    pub has_audio: bool,
    pub order: u32,
}

impl VideoSegment {
    /// Exclusive timeline end of this segment.
    pub fn timeline_end(&self) -> i64 {
        self.timeline_start + self.timeline_duration
    }

    /// Maps a timeline position inside this segment to a source position.
    pub fn source_position_at(&self, t_tl: i64) -> i64 {
        self.source_start + (t_tl - self.timeline_start)
    }
}

/// An audio clip positioned on the audio lane.
///
/// Either detached from a video segment's embedded audio or imported as a
/// standalone audio file. `origin_segment_id` is a lookup-only
/// back-reference; deleting the segment does not invalidate the fragment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFragment {
    pub id: FragmentId,
    pub source_name: String,
    pub source_start: i64,
    pub source_end: i64,
    pub track_start: i64,
    pub track_end: i64,
    pub origin_segment_id: Option<SegmentId>,
}

impl AudioFragment {
    /// Fragment duration in timeline ticks.
    pub fn duration(&self) -> i64 {
        self.source_end - self.source_start
    }

    /// True while the play head visits `[track_start, track_end]`,
    /// inclusive on both ends.
    pub fn is_active_at(&self, t_tl: i64) -> bool {
        self.track_start <= t_tl && t_tl <= self.track_end
    }
}

/// The editable timeline: an ordered, gapless video segment list plus an
/// audio fragment lane sorted by `track_start`.
///
/// Fields are private; queries are methods and mutations live in the edit
/// operations module so the tiling and lane invariants cannot be broken
/// from outside.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    pub(crate) segments: Vec<VideoSegment>,
    pub(crate) fragments: Vec<AudioFragment>,
}

impl Timeline {
    /// Returns the ordered video segments.
    pub fn segments(&self) -> &[VideoSegment] {
        &self.segments
    }

    /// Returns the audio lane fragments, sorted by `track_start`.
    pub fn fragments(&self) -> &[AudioFragment] {
        &self.fragments
    }

    /// Returns total timeline duration in ticks.
    pub fn total_duration(&self) -> i64 {
        self.segments
            .last()
            .map(|segment| segment.timeline_end())
            .unwrap_or(0)
    }

    /// Finds the index of the segment whose half-open timeline window
    /// contains `t_tl`.
    ///
    /// A time exactly on a segment's end belongs to the next segment,
    /// except `total_duration()` which resolves to the last segment.
    pub fn segment_index_at(&self, t_tl: i64) -> Option<usize> {
        if self.segments.is_empty() || t_tl < 0 {
            return None;
        }
        if t_tl >= self.total_duration() {
            if t_tl == self.total_duration() {
                return Some(self.segments.len() - 1);
            }
            return None;
        }
        self.segments.iter().position(|segment| {
            segment.timeline_start <= t_tl && t_tl < segment.timeline_end()
        })
    }

    /// Returns the segment active at `t_tl`, if any.
    pub fn segment_at(&self, t_tl: i64) -> Option<&VideoSegment> {
        self.segment_index_at(t_tl).map(|index| &self.segments[index])
    }

    /// Returns the segment with the given id.
    pub fn segment_by_id(&self, segment_id: SegmentId) -> Option<&VideoSegment> {
        self.segments.iter().find(|segment| segment.id == segment_id)
    }

    /// Returns the fragment with the given id.
    pub fn fragment_by_id(&self, fragment_id: FragmentId) -> Option<&AudioFragment> {
        self.fragments
            .iter()
            .find(|fragment| fragment.id == fragment_id)
    }

    /// Returns all lane fragments active at `t_tl`, inclusive on both
    /// track bounds.
    pub fn fragments_active_at(&self, t_tl: i64) -> impl Iterator<Item = &AudioFragment> {
        self.fragments
            .iter()
            .filter(move |fragment| fragment.is_active_at(t_tl))
    }

    /// Returns true when `t_tl` is exactly a segment boundary (including
    /// timeline start and end).
    pub fn is_segment_boundary(&self, t_tl: i64) -> bool {
        self.segments.iter().any(|segment| {
            t_tl == segment.timeline_start || t_tl == segment.timeline_end()
        })
    }
}
