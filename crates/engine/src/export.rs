//! Synthesis planning for the final output file.
//!
//! Timeline splits are metadata-only, so at synthesis time a segment may
//! reference a sub-range of its source. The plan walks the segments in
//! timeline order and marks which ones must first be materialized into
//! independent files; executing the plan (cutting and concatenating) is
//! the backend's job.

use crate::error::{EngineError, Result};
use crate::project::Project;

/// Ordered synthesis input derived from the timeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisPlan {
    pub items: Vec<SynthesisItem>,
}

/// One segment's contribution to the final file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisItem {
    pub source_name: String,
    /// `None` when the segment plays its source in full; otherwise the
    /// trim window that must be materialized before concatenation.
    pub trim: Option<TrimWindow>,
}

/// A strict sub-range of a source, in timeline ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrimWindow {
    pub start_tl: i64,
    pub end_tl: i64,
    pub source_duration_tl: i64,
}

/// Builds the synthesis plan from the current timeline.
pub fn build_synthesis_plan(project: &Project) -> Result<SynthesisPlan> {
    if project.timeline.segments().is_empty() {
        return Err(EngineError::EmptyTimeline);
    }

    let mut items = Vec::with_capacity(project.timeline.segments().len());
    for segment in project.timeline.segments() {
        let source =
            project
                .source(&segment.source_name)
                .ok_or_else(|| EngineError::SourceNotFound {
                    source_name: segment.source_name.clone(),
                })?;

        let whole = segment.source_start == 0 && segment.source_end == source.duration_tl;
        items.push(SynthesisItem {
            source_name: segment.source_name.clone(),
            trim: if whole {
                None
            } else {
                Some(TrimWindow {
                    start_tl: segment.source_start,
                    end_tl: segment.source_end,
                    source_duration_tl: source.duration_tl,
                })
            },
        });
    }

    Ok(SynthesisPlan { items })
}

#[cfg(test)]
mod tests {
    use super::{TrimWindow, build_synthesis_plan};
    use crate::error::EngineError;
    use crate::project::{Project, SourceInfo};

    const SECOND: i64 = 1_000_000;

    fn project_with_source(name: &str, duration: i64) -> Project {
        let mut project = Project::new();
        project.register_source(SourceInfo {
            name: name.to_string(),
            duration_tl: duration,
            has_audio: true,
        });
        project
    }

    #[test]
    fn whole_source_segments_pass_through_by_name() {
        let mut project = project_with_source("a.mp4", 10 * SECOND);
        project
            .timeline
            .append_imported_segment(1, "a.mp4".to_string(), 10 * SECOND, true);

        let plan = build_synthesis_plan(&project).expect("plan should build");
        assert_eq!(plan.items.len(), 1);
        assert_eq!(plan.items[0].source_name, "a.mp4");
        assert!(plan.items[0].trim.is_none());
    }

    #[test]
    fn split_segments_are_marked_for_materialization() {
        let mut project = project_with_source("a.mp4", 10 * SECOND);
        project
            .timeline
            .append_imported_segment(1, "a.mp4".to_string(), 10 * SECOND, true);
        project.timeline.split_at(4 * SECOND, 2).expect("split");

        let plan = build_synthesis_plan(&project).expect("plan should build");
        assert_eq!(plan.items.len(), 2);
        assert_eq!(
            plan.items[0].trim,
            Some(TrimWindow {
                start_tl: 0,
                end_tl: 4 * SECOND,
                source_duration_tl: 10 * SECOND,
            })
        );
        assert_eq!(
            plan.items[1].trim,
            Some(TrimWindow {
                start_tl: 4 * SECOND,
                end_tl: 10 * SECOND,
                source_duration_tl: 10 * SECOND,
            })
        );
    }

    #[test]
    fn empty_timeline_cannot_be_synthesized() {
        let project = Project::new();
        let result = build_synthesis_plan(&project);
        assert!(matches!(result, Err(EngineError::EmptyTimeline)));
    }

    #[test]
    fn unregistered_source_is_rejected() {
        let mut project = Project::new();
        project
            .timeline
            .append_imported_segment(1, "ghost.mp4".to_string(), 10 * SECOND, true);

        let result = build_synthesis_plan(&project);
        assert!(matches!(result, Err(EngineError::SourceNotFound { .. })));
    }
}
