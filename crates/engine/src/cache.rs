use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::Result;
use crate::mixer::AudioBuffer;

/// Decoded audio buffer cache keyed by source name.
///
/// Each source is decoded at most once and the buffer is shared by every
/// fragment referencing it. The cache is read on every tick but written
/// only by the first-load path for a key, so a second request for an
/// in-cache source never triggers decode work.
//
// TODO: decode in bounded chunks instead of whole buffers so multi-hour
// sources do not stay pinned in memory for the whole session.
#[derive(Default)]
pub struct AudioBufferCache {
    buffers: HashMap<String, Arc<AudioBuffer>>,
    failed: HashSet<String>,
}

impl AudioBufferCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached buffer for `source_name`, decoding it through
    /// `load` on first use.
    ///
    /// A failed decode returns `None` and is remembered; the next call
    /// retries, logging quietly for known-bad sources.
    pub fn ensure_with(
        &mut self,
        source_name: &str,
        load: impl FnOnce() -> Result<AudioBuffer>,
    ) -> Option<Arc<AudioBuffer>> {
        if let Some(buffer) = self.buffers.get(source_name) {
            debug!(source_name, "audio cache hit");
            return Some(Arc::clone(buffer));
        }

        debug!(source_name, "audio cache miss");
        match load() {
            Ok(buffer) => {
                self.failed.remove(source_name);
                let buffer = Arc::new(buffer);
                self.buffers
                    .insert(source_name.to_string(), Arc::clone(&buffer));
                Some(buffer)
            }
            Err(error) => {
                if self.failed.insert(source_name.to_string()) {
                    warn!(source_name, %error, "audio decode failed");
                } else {
                    debug!(source_name, %error, "audio decode failed again");
                }
                None
            }
        }
    }

    /// Returns an already-decoded buffer without loading.
    pub fn get(&self, source_name: &str) -> Option<Arc<AudioBuffer>> {
        self.buffers.get(source_name).map(Arc::clone)
    }

    pub fn contains(&self, source_name: &str) -> bool {
        self.buffers.contains_key(source_name)
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::AudioBufferCache;
    use crate::error::EngineError;
    use crate::mixer::AudioBuffer;

    fn sample_buffer(value: f32) -> AudioBuffer {
        AudioBuffer {
            sample_rate: 48_000,
            channels: 2,
            samples: Arc::from(vec![value; 8]),
        }
    }

    #[test]
    fn second_request_is_served_from_cache() {
        let mut cache = AudioBufferCache::new();
        let mut loads = 0;

        for _ in 0..3 {
            let buffer = cache
                .ensure_with("a.mp3", || {
                    loads += 1;
                    Ok(sample_buffer(0.25))
                })
                .expect("buffer should load");
            assert_eq!(buffer.samples[0], 0.25);
        }

        assert_eq!(loads, 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn failed_load_is_remembered_and_retried() {
        let mut cache = AudioBufferCache::new();

        let missing = cache.ensure_with("bad.mp3", || {
            Err(EngineError::SourceNotFound {
                source_name: "bad.mp3".to_string(),
            })
        });
        assert!(missing.is_none());
        assert!(!cache.contains("bad.mp3"));

        // Retry succeeds and clears the failure marker.
        let recovered = cache.ensure_with("bad.mp3", || Ok(sample_buffer(1.0)));
        assert!(recovered.is_some());
        assert!(cache.contains("bad.mp3"));
    }

    #[test]
    fn get_does_not_load() {
        let cache = AudioBufferCache::new();
        assert!(cache.get("a.mp3").is_none());
        assert!(cache.is_empty());
    }
}
