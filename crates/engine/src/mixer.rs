//! Multi-source audio mixing driven by the playback clock.
//!
//! The mixer keeps a play list covering every audible piece of the
//! timeline: the embedded audio of video segments that still own it, and
//! the fragments of the audio lane. Each tick it activates sources whose
//! track window the play head entered (with the trimmed start offset) and
//! stops sources whose window it left. A single master gain sits between
//! every scheduled source and the sink, so muting never stops sources.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::cache::AudioBufferCache;
use crate::error::Result;
use crate::media::MediaBackend;
use crate::timeline::{FragmentId, SegmentId, Timeline, seconds_from_ticks};

/// Master gain applied when no volume has been set.
pub const DEFAULT_MASTER_GAIN: f32 = 0.5;

/// A fully decoded audio track shared between fragments of one source.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Arc<[f32]>,
}

impl AudioBuffer {
    /// Decoded duration in seconds.
    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0.0;
        }
        let frames = self.samples.len() / self.channels as usize;
        frames as f64 / self.sample_rate as f64
    }
}

/// Handle to a scheduled source inside the sink.
pub type SourceHandle = u64;

/// Audio output the mixer schedules sources against.
///
/// `output_time` is the backend's own hardware clock; it timestamps when
/// sources start and never advances the logical playback position.
pub trait AudioSink {
    fn output_time(&self) -> f64;

    /// Prepares the output for playback. Fails when the device or policy
    /// refuses to start.
    fn resume(&mut self) -> Result<()>;

    /// Schedules `buffer` to start at `when`, reading from
    /// `offset_seconds` within the buffer for `duration_seconds`.
    fn start_source(
        &mut self,
        buffer: &AudioBuffer,
        when: f64,
        offset_seconds: f64,
        duration_seconds: f64,
    ) -> Result<SourceHandle>;

    fn stop_source(&mut self, handle: SourceHandle);

    /// Sets the master gain applied to every scheduled source.
    fn set_gain(&mut self, gain: f32);
}

/// Identity of one audible piece on the timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayKey {
    /// Embedded audio of a video segment that still owns it.
    Segment(SegmentId),
    /// An audio lane fragment.
    Fragment(FragmentId),
}

/// One audible piece: a trim window placed on the track.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PlayEntry {
    key: PlayKey,
    source_name: String,
    source_start: i64,
    source_end: i64,
    track_start: i64,
    track_end: i64,
}

impl PlayEntry {
    fn is_active_at(&self, t_tl: i64) -> bool {
        self.track_start <= t_tl && t_tl <= self.track_end
    }
}

#[derive(Debug)]
struct ActiveSource {
    key: PlayKey,
    handle: SourceHandle,
}

/// Decodes, schedules, and releases audio sources for the current tick.
pub struct AudioMixingEngine {
    play_list: Vec<PlayEntry>,
    cache: AudioBufferCache,
    active: Vec<ActiveSource>,
    sink: Option<Box<dyn AudioSink>>,
    gain: f32,
    pending_errors: Vec<String>,
}

impl Default for AudioMixingEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioMixingEngine {
    pub fn new() -> Self {
        Self {
            play_list: Vec::new(),
            cache: AudioBufferCache::new(),
            active: Vec::new(),
            sink: None,
            gain: DEFAULT_MASTER_GAIN,
            pending_errors: Vec::new(),
        }
    }

    /// Drains transient decode/start errors for the change-notification
    /// channel.
    pub fn take_errors(&mut self) -> Vec<String> {
        std::mem::take(&mut self.pending_errors)
    }

    /// Binds the audio output and applies the current master gain.
    pub fn bind_sink(&mut self, mut sink: Box<dyn AudioSink>) {
        sink.set_gain(self.gain);
        self.sink = Some(sink);
    }

    /// Prepares the output for playback (autoplay/device policy check).
    pub fn resume(&mut self) -> Result<()> {
        match self.sink.as_mut() {
            Some(sink) => sink.resume(),
            None => Ok(()),
        }
    }

    /// Rebuilds the play list from the timeline after a committed
    /// mutation. All scheduled sources are released; the next tick
    /// restarts whatever is audible at the play head.
    pub fn rebuild_play_list(&mut self, timeline: &Timeline) {
        self.stop_all();
        self.play_list.clear();

        for segment in timeline.segments() {
            if !segment.has_audio {
                continue;
            }
            self.play_list.push(PlayEntry {
                key: PlayKey::Segment(segment.id),
                source_name: segment.source_name.clone(),
                source_start: segment.source_start,
                source_end: segment.source_end,
                track_start: segment.timeline_start,
                track_end: segment.timeline_end(),
            });
        }
        for fragment in timeline.fragments() {
            self.play_list.push(PlayEntry {
                key: PlayKey::Fragment(fragment.id),
                source_name: fragment.source_name.clone(),
                source_start: fragment.source_start,
                source_end: fragment.source_end,
                track_start: fragment.track_start,
                track_end: fragment.track_end,
            });
        }

        debug!(entries = self.play_list.len(), "play list rebuilt");
    }

    /// Decodes every source referenced by the play list into the cache.
    pub fn prepare(&mut self, media: &dyn MediaBackend) {
        for entry in &self.play_list {
            self.cache
                .ensure_with(&entry.source_name, || media.decode_audio(&entry.source_name));
        }
    }

    /// Activates and deactivates scheduled sources for `position_tl`.
    ///
    /// An already-active entry is never restarted: a fragment cannot be
    /// double-activated across consecutive ticks without an intervening
    /// deactivation.
    pub fn tick(&mut self, position_tl: i64, media: &dyn MediaBackend) {
        let Some(sink) = self.sink.as_mut() else {
            return;
        };

        // Stop and release sources whose track window the play head left.
        let play_list = &self.play_list;
        self.active.retain(|source| {
            let still_active = play_list
                .iter()
                .any(|entry| entry.key == source.key && entry.is_active_at(position_tl));
            if !still_active {
                sink.stop_source(source.handle);
                debug!(key = ?source.key, "audio source released");
            }
            still_active
        });

        // Start newly active entries at their trimmed offsets.
        for entry in &self.play_list {
            if !entry.is_active_at(position_tl) {
                continue;
            }
            if self.active.iter().any(|source| source.key == entry.key) {
                continue;
            }

            let Some(buffer) = self
                .cache
                .ensure_with(&entry.source_name, || media.decode_audio(&entry.source_name))
            else {
                // Undecodable source: this entry stays silent until a
                // later activation retries it.
                self.pending_errors
                    .push(format!("{}: audio decode failed", entry.source_name));
                continue;
            };

            let window = entry.track_end - entry.track_start;
            let offset_tl = entry.source_start + (position_tl - entry.track_start).clamp(0, window);
            let offset_seconds = seconds_from_ticks(offset_tl);
            let remaining_seconds = seconds_from_ticks(entry.track_end - position_tl);

            match sink.start_source(&buffer, sink.output_time(), offset_seconds, remaining_seconds)
            {
                Ok(handle) => {
                    debug!(
                        key = ?entry.key,
                        source_name = %entry.source_name,
                        offset_seconds,
                        remaining_seconds,
                        "audio source scheduled"
                    );
                    self.active.push(ActiveSource {
                        key: entry.key,
                        handle,
                    });
                }
                Err(error) => {
                    warn!(key = ?entry.key, %error, "audio source start failed");
                    self.pending_errors
                        .push(format!("{}: {error}", entry.source_name));
                }
            }
        }
    }

    /// Stops and releases every scheduled source unconditionally.
    pub fn stop_all(&mut self) {
        if let Some(sink) = self.sink.as_mut() {
            for source in &self.active {
                sink.stop_source(source.handle);
            }
        }
        self.active.clear();
    }

    /// Sets the master gain without touching scheduled sources.
    pub fn set_volume(&mut self, gain: f32) {
        self.gain = gain;
        if let Some(sink) = self.sink.as_mut() {
            sink.set_gain(gain);
        }
    }

    /// Mutes output; sources keep running at zero gain.
    pub fn mute(&mut self) {
        self.set_volume(0.0);
    }

    #[cfg(test)]
    fn active_keys(&self) -> Vec<PlayKey> {
        self.active.iter().map(|source| source.key).collect()
    }
}
