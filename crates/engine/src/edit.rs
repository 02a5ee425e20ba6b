//! Edit operations: the only code allowed to mutate a [`Timeline`].
//!
//! Every operation validates before it mutates, so a rejected edit leaves
//! the timeline exactly as it was.

use tracing::{debug, warn};

use crate::error::{EngineError, Result};
use crate::timeline::{
    AudioFragment, FragmentId, SegmentId, TICKS_PER_SECOND, Timeline, VideoSegment,
};

/// Shortest clip half a split may produce: one second.
pub const MIN_CLIP_TICKS: i64 = TICKS_PER_SECOND;

impl Timeline {
    /// Splits the segment containing `at_tl` into two segments sharing the
    /// same source.
    ///
    /// Fails with [`EngineError::InvalidCutPoint`] when `at_tl` lands
    /// exactly on a segment boundary or when either resulting half would
    /// be shorter than [`MIN_CLIP_TICKS`]. The left half keeps the
    /// original segment id; the right half takes `right_id`.
    pub fn split_at(&mut self, at_tl: i64, right_id: SegmentId) -> Result<(SegmentId, SegmentId)> {
        if self.is_segment_boundary(at_tl) {
            warn!(at_tl, "split rejected: boundary point");
            return Err(EngineError::InvalidCutPoint { at_tl });
        }
        let Some(index) = self.segment_index_at(at_tl) else {
            warn!(at_tl, "split rejected: no segment at offset");
            return Err(EngineError::SegmentNotFound { at_tl });
        };

        let current = self.segments[index].clone();
        let left_duration = at_tl - current.timeline_start;
        let right_duration = current.timeline_duration - left_duration;
        if left_duration < MIN_CLIP_TICKS || right_duration < MIN_CLIP_TICKS {
            warn!(
                at_tl,
                segment_id = current.id,
                left_duration,
                right_duration,
                "split rejected: half below minimum clip length"
            );
            return Err(EngineError::InvalidCutPoint { at_tl });
        }

        let source_split = current.source_start + left_duration;
        let left = VideoSegment {
            source_end: source_split,
            timeline_duration: left_duration,
            ..current.clone()
        };
        let right = VideoSegment {
            id: right_id,
            source_start: source_split,
            timeline_start: at_tl,
            timeline_duration: right_duration,
            ..current
        };

        debug!(
            at_tl,
            segment_id = left.id,
            right_id,
            source_name = %left.source_name,
            source_split,
            left_duration,
            right_duration,
            "split applied"
        );

        let left_id = left.id;
        self.segments[index] = left;
        self.segments.insert(index + 1, right);
        self.renumber_orders();
        Ok((left_id, right_id))
    }

    /// Detaches a segment's embedded audio into a new lane fragment.
    ///
    /// The fragment mirrors the segment's trim window, plays the extracted
    /// audio source `audio_source_name`, and is placed at the end of the
    /// audio lane. Fails with [`EngineError::NoAudioToDetach`] when the
    /// segment no longer owns audio.
    pub fn detach_audio(
        &mut self,
        segment_id: SegmentId,
        fragment_id: FragmentId,
        audio_source_name: String,
    ) -> Result<FragmentId> {
        let Some(segment) = self
            .segments
            .iter_mut()
            .find(|segment| segment.id == segment_id)
        else {
            return Err(EngineError::SegmentIdNotFound { segment_id });
        };
        if !segment.has_audio {
            warn!(segment_id, "detach rejected: no embedded audio");
            return Err(EngineError::NoAudioToDetach { segment_id });
        }

        segment.has_audio = false;
        let source_start = segment.source_start;
        let source_end = segment.source_end;
        let track_start = self
            .fragments
            .last()
            .map(|fragment| fragment.track_end)
            .unwrap_or(0);

        debug!(
            segment_id,
            fragment_id,
            audio_source_name = %audio_source_name,
            track_start,
            "audio detached"
        );

        self.fragments.push(AudioFragment {
            id: fragment_id,
            source_name: audio_source_name,
            source_start,
            source_end,
            track_start,
            track_end: track_start + (source_end - source_start),
            origin_segment_id: Some(segment_id),
        });
        Ok(fragment_id)
    }

    /// Moves a lane fragment toward `desired_track_start`, clamped between
    /// its sorted neighbors.
    ///
    /// A drag never fails for overlap: the fragment lands on the closest
    /// legal position and that position is returned. Lane order never
    /// changes.
    pub fn reposition_fragment(
        &mut self,
        fragment_id: FragmentId,
        desired_track_start: i64,
    ) -> Result<i64> {
        let Some(index) = self
            .fragments
            .iter()
            .position(|fragment| fragment.id == fragment_id)
        else {
            return Err(EngineError::FragmentIdNotFound { fragment_id });
        };

        let duration = self.fragments[index].duration();
        let lower_bound = if index > 0 {
            self.fragments[index - 1].track_end
        } else {
            0
        };
        let upper_bound = self
            .fragments
            .get(index + 1)
            .map(|next| next.track_start - duration)
            .unwrap_or(i64::MAX);
        let clamped = desired_track_start.clamp(lower_bound, upper_bound);

        let fragment = &mut self.fragments[index];
        fragment.track_start = clamped;
        fragment.track_end = clamped + duration;

        debug!(
            fragment_id,
            desired_track_start,
            lower_bound,
            actual_track_start = clamped,
            "fragment repositioned"
        );
        Ok(clamped)
    }

    /// Removes a segment and shifts all following segments left so the
    /// timeline stays gapless.
    ///
    /// Audio fragments that reference the segment through
    /// `origin_segment_id` are left untouched; the back-reference is not
    /// an ownership relation.
    pub fn remove_segment(&mut self, segment_id: SegmentId) -> Result<VideoSegment> {
        let Some(index) = self
            .segments
            .iter()
            .position(|segment| segment.id == segment_id)
        else {
            return Err(EngineError::SegmentIdNotFound { segment_id });
        };

        let removed = self.segments.remove(index);
        for segment in self.segments.iter_mut().skip(index) {
            segment.timeline_start -= removed.timeline_duration;
        }
        self.renumber_orders();

        debug!(
            segment_id,
            removed_duration = removed.timeline_duration,
            segment_count = self.segments.len(),
            "segment removed"
        );
        Ok(removed)
    }

    /// Appends an imported video source as a new segment covering its full
    /// duration at the end of the timeline.
    pub(crate) fn append_imported_segment(
        &mut self,
        segment_id: SegmentId,
        source_name: String,
        duration: i64,
        has_audio: bool,
    ) -> SegmentId {
        let timeline_start = self.total_duration();
        self.segments.push(VideoSegment {
            id: segment_id,
            source_name,
            source_start: 0,
            source_end: duration,
            timeline_start,
            timeline_duration: duration,
            has_audio,
            order: 0,
        });
        self.renumber_orders();
        segment_id
    }

    /// Appends an imported audio source as a new fragment at the end of
    /// the audio lane.
    pub(crate) fn append_imported_fragment(
        &mut self,
        fragment_id: FragmentId,
        source_name: String,
        duration: i64,
    ) -> FragmentId {
        let track_start = self
            .fragments
            .last()
            .map(|fragment| fragment.track_end)
            .unwrap_or(0);
        self.fragments.push(AudioFragment {
            id: fragment_id,
            source_name,
            source_start: 0,
            source_end: duration,
            track_start,
            track_end: track_start + duration,
            origin_segment_id: None,
        });
        fragment_id
    }

    fn renumber_orders(&mut self) {
        for (index, segment) in self.segments.iter_mut().enumerate() {
            segment.order = index as u32;
        }
    }
}
