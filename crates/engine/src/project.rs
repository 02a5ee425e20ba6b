use serde::{Deserialize, Serialize};

use crate::media::ProbedSource;
use crate::timeline::Timeline;

/// A probed media source registered with the project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
    pub name: String,
    pub duration_tl: i64,
    pub has_audio: bool,
}

impl From<ProbedSource> for SourceInfo {
    fn from(value: ProbedSource) -> Self {
        Self {
            name: value.source_name,
            duration_tl: value.duration_tl,
            has_audio: value.has_audio,
        }
    }
}

/// Project state: the source registry plus the editable timeline.
///
/// The project owns no media bytes; sources are names the backend
/// resolves.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub sources: Vec<SourceInfo>,
    pub timeline: Timeline,
}

impl Project {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or refreshes) a probed source.
    pub fn register_source(&mut self, info: SourceInfo) {
        if let Some(existing) = self
            .sources
            .iter_mut()
            .find(|source| source.name == info.name)
        {
            *existing = info;
        } else {
            self.sources.push(info);
        }
    }

    /// Returns the registered source with the given name.
    pub fn source(&self, name: &str) -> Option<&SourceInfo> {
        self.sources.iter().find(|source| source.name == name)
    }

    /// Creates an immutable snapshot for the application layer.
    pub fn snapshot(&self) -> TimelineSnapshot {
        TimelineSnapshot {
            sources: self.sources.clone(),
            segments: self
                .timeline
                .segments()
                .iter()
                .map(|segment| SegmentView {
                    id: segment.id,
                    source_name: segment.source_name.clone(),
                    source_start: segment.source_start,
                    source_end: segment.source_end,
                    timeline_start: segment.timeline_start,
                    timeline_duration: segment.timeline_duration,
                    has_audio: segment.has_audio,
                    order: segment.order,
                })
                .collect(),
            fragments: self
                .timeline
                .fragments()
                .iter()
                .map(|fragment| FragmentView {
                    id: fragment.id,
                    source_name: fragment.source_name.clone(),
                    source_start: fragment.source_start,
                    source_end: fragment.source_end,
                    track_start: fragment.track_start,
                    track_end: fragment.track_end,
                    origin_segment_id: fragment.origin_segment_id,
                })
                .collect(),
            duration_tl: self.timeline.total_duration(),
        }
    }
}

/// Immutable timeline snapshot delivered through change notifications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineSnapshot {
    pub sources: Vec<SourceInfo>,
    pub segments: Vec<SegmentView>,
    pub fragments: Vec<FragmentView>,
    pub duration_tl: i64,
}

/// Snapshot representation of one video segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentView {
    pub id: u64,
    pub source_name: String,
    pub source_start: i64,
    pub source_end: i64,
    pub timeline_start: i64,
    pub timeline_duration: i64,
    pub has_audio: bool,
    pub order: u32,
}

/// Snapshot representation of one audio fragment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentView {
    pub id: u64,
    pub source_name: String,
    pub source_start: i64,
    pub source_end: i64,
    pub track_start: i64,
    pub track_end: i64,
    pub origin_segment_id: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::{Project, SourceInfo};

    const SECOND: i64 = 1_000_000;

    #[test]
    fn register_source_refreshes_existing_entry() {
        let mut project = Project::new();
        project.register_source(SourceInfo {
            name: "a.mp4".to_string(),
            duration_tl: 10 * SECOND,
            has_audio: true,
        });
        project.register_source(SourceInfo {
            name: "a.mp4".to_string(),
            duration_tl: 12 * SECOND,
            has_audio: false,
        });

        assert_eq!(project.sources.len(), 1);
        let source = project.source("a.mp4").expect("source exists");
        assert_eq!(source.duration_tl, 12 * SECOND);
        assert!(!source.has_audio);
    }

    #[test]
    fn snapshot_mirrors_timeline_state() {
        let mut project = Project::new();
        project.register_source(SourceInfo {
            name: "a.mp4".to_string(),
            duration_tl: 10 * SECOND,
            has_audio: true,
        });
        project
            .timeline
            .append_imported_segment(1, "a.mp4".to_string(), 10 * SECOND, true);
        project.timeline.split_at(4 * SECOND, 2).expect("split");
        project
            .timeline
            .detach_audio(1, 7, "a.mp3".to_string())
            .expect("detach");

        let snapshot = project.snapshot();
        assert_eq!(snapshot.duration_tl, 10 * SECOND);
        assert_eq!(snapshot.segments.len(), 2);
        assert_eq!(snapshot.fragments.len(), 1);
        assert!(!snapshot.segments[0].has_audio);
        assert_eq!(snapshot.fragments[0].origin_segment_id, Some(1));
    }

    #[test]
    fn snapshot_serializes_for_external_persistence() {
        let mut project = Project::new();
        project
            .timeline
            .append_imported_segment(1, "a.mp4".to_string(), 10 * SECOND, true);

        let snapshot = project.snapshot();
        let json = serde_json::to_string(&snapshot).expect("serialize snapshot");
        let restored: super::TimelineSnapshot =
            serde_json::from_str(&json).expect("deserialize snapshot");
        assert_eq!(restored, snapshot);
    }
}
