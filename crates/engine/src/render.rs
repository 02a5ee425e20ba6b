//! Frame renderer driven by the playback clock.
//!
//! One platform media object is created lazily per distinct source name
//! and reused by every segment referencing that source. Each tick the
//! renderer positions the active object's read head inside the segment's
//! trim window and presents the most recently decoded frame. The next
//! segment's object is preloaded ahead of the handoff unless it shares
//! the active source.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::media::MediaBackend;
use crate::timeline::{Timeline, seconds_from_ticks};

/// Pixel format for frames passed to the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Rgba8,
}

/// Raw frame payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub bytes: Arc<[u8]>,
}

/// A platform media object bound to one source.
///
/// Loading is asynchronous from the engine's point of view: `begin_load`
/// starts it, and the object is skipped until `is_loaded` reports true.
pub trait MediaObject {
    /// Kicks off metadata/decoder loading.
    fn begin_load(&mut self);

    /// True once the object can decode frames.
    fn is_loaded(&self) -> bool;

    /// Positions the internal read head, in source-relative seconds.
    fn seek_to(&mut self, source_seconds: f64);

    /// Returns the most recently decoded frame, if any.
    fn current_frame(&mut self) -> Option<VideoFrame>;
}

/// Output surface the renderer draws to.
pub trait VideoSurface {
    fn present(&mut self, frame: &VideoFrame);
    fn clear(&mut self);
}

/// Renders the active segment's frames and preloads the upcoming source.
pub struct VideoRenderer {
    objects: HashMap<String, Box<dyn MediaObject>>,
    failed: HashSet<String>,
    surface: Option<Box<dyn VideoSurface>>,
    active_source: Option<String>,
    pending_errors: Vec<String>,
}

impl Default for VideoRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoRenderer {
    pub fn new() -> Self {
        Self {
            objects: HashMap::new(),
            failed: HashSet::new(),
            surface: None,
            active_source: None,
            pending_errors: Vec::new(),
        }
    }

    /// Drains transient load errors for the change-notification channel.
    pub fn take_errors(&mut self) -> Vec<String> {
        std::mem::take(&mut self.pending_errors)
    }

    /// Binds the output surface frames are presented to.
    pub fn bind_surface(&mut self, surface: Box<dyn VideoSurface>) {
        self.surface = Some(surface);
    }

    /// Draws the frame for `position_tl` and preloads the next segment's
    /// source.
    ///
    /// A source that fails to open is skipped (the previous frame stays
    /// on the surface) and retried the next time it becomes the active
    /// source.
    pub fn render_at(&mut self, position_tl: i64, timeline: &Timeline, media: &dyn MediaBackend) {
        let Some(segment) = timeline.segment_at(position_tl) else {
            if let Some(surface) = self.surface.as_mut() {
                surface.clear();
            }
            self.active_source = None;
            return;
        };

        if self.active_source.as_deref() != Some(segment.source_name.as_str()) {
            // Newly active source: give a previously failed open another try.
            self.failed.remove(&segment.source_name);
            self.active_source = Some(segment.source_name.clone());
            debug!(source_name = %segment.source_name, "renderer bound to source");
        }
        self.ensure_object(&segment.source_name, media);

        if let Some(object) = self.objects.get_mut(&segment.source_name) {
            if object.is_loaded() {
                let source_seconds = seconds_from_ticks(segment.source_position_at(position_tl));
                object.seek_to(source_seconds);
                if let Some(frame) = object.current_frame() {
                    if let Some(surface) = self.surface.as_mut() {
                        surface.present(&frame);
                    }
                }
            }
        }

        self.preload_next(position_tl, timeline, media);
    }

    fn ensure_object(&mut self, source_name: &str, media: &dyn MediaBackend) {
        if self.objects.contains_key(source_name) || self.failed.contains(source_name) {
            return;
        }
        match media.open_media(source_name) {
            Ok(mut object) => {
                object.begin_load();
                self.objects.insert(source_name.to_string(), object);
            }
            Err(error) => {
                warn!(source_name, %error, "media open failed");
                self.pending_errors.push(format!("{source_name}: {error}"));
                self.failed.insert(source_name.to_string());
            }
        }
    }

    /// Starts loading the next segment's media object, skipping the load
    /// when it shares the active segment's source.
    fn preload_next(&mut self, position_tl: i64, timeline: &Timeline, media: &dyn MediaBackend) {
        let Some(index) = timeline.segment_index_at(position_tl) else {
            return;
        };
        let Some(next) = timeline.segments().get(index + 1) else {
            return;
        };
        let Some(current) = timeline.segments().get(index) else {
            return;
        };
        if next.source_name == current.source_name {
            return;
        }
        self.ensure_object(&next.source_name, media);
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    use super::{MediaObject, PixelFormat, VideoFrame, VideoRenderer, VideoSurface};
    use crate::error::{EngineError, Result};
    use crate::media::{MediaBackend, ProbedSource};
    use crate::mixer::AudioBuffer;
    use crate::timeline::Timeline;

    const SECOND: i64 = 1_000_000;

    #[derive(Debug, Clone, Default)]
    struct BackendLog {
        opened: Arc<Mutex<Vec<String>>>,
        seeks: Arc<Mutex<Vec<(String, f64)>>>,
    }

    struct MockObject {
        source_name: String,
        loaded: bool,
        never_loads: bool,
        log: BackendLog,
    }

    impl MediaObject for MockObject {
        fn begin_load(&mut self) {
            if !self.never_loads {
                self.loaded = true;
            }
        }

        fn is_loaded(&self) -> bool {
            self.loaded
        }

        fn seek_to(&mut self, source_seconds: f64) {
            self.log
                .seeks
                .lock()
                .expect("lock seeks")
                .push((self.source_name.clone(), source_seconds));
        }

        fn current_frame(&mut self) -> Option<VideoFrame> {
            Some(VideoFrame {
                width: 2,
                height: 2,
                format: PixelFormat::Rgba8,
                bytes: Arc::from(vec![0u8; 16]),
            })
        }
    }

    struct MockBackend {
        log: BackendLog,
        fail_sources: Vec<String>,
        slow_sources: Vec<String>,
    }

    impl MockBackend {
        fn new(log: BackendLog) -> Self {
            Self {
                log,
                fail_sources: Vec::new(),
                slow_sources: Vec::new(),
            }
        }
    }

    impl MediaBackend for MockBackend {
        fn probe_source(&self, source_name: &str) -> Result<ProbedSource> {
            Ok(ProbedSource {
                source_name: source_name.to_string(),
                duration_tl: 10 * SECOND,
                has_audio: true,
            })
        }

        fn cut_media(&self, _source_name: &str, _at_seconds: f64) -> Result<(String, String)> {
            unimplemented!("not used by renderer tests")
        }

        fn extract_audio(&self, _source_name: &str) -> Result<String> {
            unimplemented!("not used by renderer tests")
        }

        fn extract_thumbnails(&self, _source_name: &str) -> Result<Vec<PathBuf>> {
            unimplemented!("not used by renderer tests")
        }

        fn resolve_playable_url(&self, source_name: &str) -> Result<String> {
            Ok(source_name.to_string())
        }

        fn decode_audio(&self, _source_name: &str) -> Result<AudioBuffer> {
            unimplemented!("not used by renderer tests")
        }

        fn open_media(&self, source_name: &str) -> Result<Box<dyn MediaObject>> {
            if self.fail_sources.iter().any(|name| name == source_name) {
                return Err(EngineError::SourceNotFound {
                    source_name: source_name.to_string(),
                });
            }
            self.log
                .opened
                .lock()
                .expect("lock opened")
                .push(source_name.to_string());
            Ok(Box::new(MockObject {
                source_name: source_name.to_string(),
                loaded: false,
                never_loads: self.slow_sources.iter().any(|name| name == source_name),
                log: self.log.clone(),
            }))
        }

        fn synthesize_final(&self, _ordered_source_names: &[String]) -> Result<PathBuf> {
            unimplemented!("not used by renderer tests")
        }
    }

    #[derive(Default)]
    struct SurfaceLog {
        presented: usize,
        cleared: usize,
    }

    struct MockSurface(Arc<Mutex<SurfaceLog>>);

    impl VideoSurface for MockSurface {
        fn present(&mut self, _frame: &VideoFrame) {
            self.0.lock().expect("lock surface").presented += 1;
        }

        fn clear(&mut self) {
            self.0.lock().expect("lock surface").cleared += 1;
        }
    }

    fn split_shared_source_timeline() -> Timeline {
        // One imported clip split in half: both segments share a source.
        let mut timeline = Timeline::default();
        timeline.append_imported_segment(1, "a.mp4".to_string(), 10 * SECOND, true);
        timeline.split_at(4 * SECOND, 2).expect("split");
        timeline.append_imported_segment(3, "b.mp4".to_string(), 5 * SECOND, true);
        timeline
    }

    #[test]
    fn one_media_object_per_distinct_source() {
        let log = BackendLog::default();
        let backend = MockBackend::new(log.clone());
        let timeline = split_shared_source_timeline();
        let mut renderer = VideoRenderer::new();

        renderer.render_at(SECOND, &timeline, &backend);
        renderer.render_at(5 * SECOND, &timeline, &backend);

        // Both segments resolve to the one "a.mp4" object; "b.mp4" was
        // preloaded when segment 2 became active.
        let opened = log.opened.lock().expect("lock opened").clone();
        assert_eq!(opened, vec!["a.mp4".to_string(), "b.mp4".to_string()]);
    }

    #[test]
    fn preload_skips_next_segment_sharing_active_source() {
        let log = BackendLog::default();
        let backend = MockBackend::new(log.clone());
        let timeline = split_shared_source_timeline();
        let mut renderer = VideoRenderer::new();

        // Inside segment 1; next segment shares "a.mp4", so nothing else
        // is opened.
        renderer.render_at(SECOND, &timeline, &backend);
        let opened = log.opened.lock().expect("lock opened").clone();
        assert_eq!(opened, vec!["a.mp4".to_string()]);
    }

    #[test]
    fn read_head_maps_timeline_position_into_trim_window() {
        let log = BackendLog::default();
        let backend = MockBackend::new(log.clone());
        let timeline = split_shared_source_timeline();
        let mut renderer = VideoRenderer::new();

        // Segment 2 spans timeline [4s, 10s) with trim window [4s, 10s);
        // position 5s maps to source second 5.0.
        renderer.render_at(5 * SECOND, &timeline, &backend);
        let seeks = log.seeks.lock().expect("lock seeks").clone();
        assert_eq!(seeks, vec![("a.mp4".to_string(), 5.0)]);
    }

    #[test]
    fn frame_is_presented_once_object_is_loaded() {
        let log = BackendLog::default();
        let backend = MockBackend::new(log.clone());
        let timeline = split_shared_source_timeline();
        let surface_log = Arc::new(Mutex::new(SurfaceLog::default()));
        let mut renderer = VideoRenderer::new();
        renderer.bind_surface(Box::new(MockSurface(Arc::clone(&surface_log))));

        renderer.render_at(SECOND, &timeline, &backend);
        assert_eq!(surface_log.lock().expect("lock").presented, 1);
    }

    #[test]
    fn pending_load_skips_presentation_without_stalling() {
        let log = BackendLog::default();
        let mut backend = MockBackend::new(log.clone());
        backend.slow_sources.push("a.mp4".to_string());
        let timeline = split_shared_source_timeline();
        let surface_log = Arc::new(Mutex::new(SurfaceLog::default()));
        let mut renderer = VideoRenderer::new();
        renderer.bind_surface(Box::new(MockSurface(Arc::clone(&surface_log))));

        renderer.render_at(SECOND, &timeline, &backend);
        renderer.render_at(2 * SECOND, &timeline, &backend);

        let surface = surface_log.lock().expect("lock");
        assert_eq!(surface.presented, 0);
        assert_eq!(surface.cleared, 0);
        assert!(log.seeks.lock().expect("lock seeks").is_empty());
    }

    #[test]
    fn open_failure_leaves_previous_frame_and_does_not_retry_every_tick() {
        let log = BackendLog::default();
        let mut backend = MockBackend::new(log.clone());
        backend.fail_sources.push("a.mp4".to_string());
        let timeline = split_shared_source_timeline();
        let surface_log = Arc::new(Mutex::new(SurfaceLog::default()));
        let mut renderer = VideoRenderer::new();
        renderer.bind_surface(Box::new(MockSurface(Arc::clone(&surface_log))));

        renderer.render_at(SECOND, &timeline, &backend);
        renderer.render_at(SECOND + 100, &timeline, &backend);
        renderer.render_at(SECOND + 200, &timeline, &backend);

        let surface = surface_log.lock().expect("lock");
        assert_eq!(surface.presented, 0);
        assert_eq!(surface.cleared, 0);
        assert!(log.opened.lock().expect("lock opened").is_empty());
    }

    #[test]
    fn empty_timeline_clears_surface() {
        let log = BackendLog::default();
        let backend = MockBackend::new(log);
        let surface_log = Arc::new(Mutex::new(SurfaceLog::default()));
        let mut renderer = VideoRenderer::new();
        renderer.bind_surface(Box::new(MockSurface(Arc::clone(&surface_log))));

        renderer.render_at(0, &Timeline::default(), &backend);
        assert_eq!(surface_log.lock().expect("lock").cleared, 1);
    }
}
