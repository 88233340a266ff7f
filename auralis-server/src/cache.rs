/// Process-wide singleton chunk cache. Keyed on `(track_id, preset,
/// quantized_intensity, chunk_index)`; bounded by both entry count and total
/// bytes, LRU eviction on either limit. A per-request cache would silently
/// disable both the cap and cross-session reuse, so this is constructed
/// once in `main` and shared via `Arc`.
use crate::constants::{CACHE_MAX_BYTES, CACHE_MAX_ENTRIES};
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChunkCacheKey {
    pub track_id: u32,
    pub preset: String,
    pub quantized_intensity: i32,
    pub chunk_index: u64,
}

#[derive(Clone)]
pub struct CachedChunk {
    pub pcm: Arc<Vec<u8>>,
    pub actual_length_samples: usize,
}

struct Inner {
    entries: LruCache<ChunkCacheKey, CachedChunk>,
    total_bytes: usize,
}

/// Read and write both happen under the same lock — never a double-checked
/// read outside it, since that would race a concurrent eviction.
pub struct ChunkCache {
    inner: Mutex<Inner>,
}

impl ChunkCache {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: LruCache::new(NonZeroUsize::new(CACHE_MAX_ENTRIES).unwrap()),
                total_bytes: 0,
            }),
        }
    }

    pub fn get(&self, key: &ChunkCacheKey) -> Option<CachedChunk> {
        self.inner.lock().entries.get(key).cloned()
    }

    pub fn put(&self, key: ChunkCacheKey, value: CachedChunk) {
        let mut inner = self.inner.lock();
        let incoming_bytes = value.pcm.len();
        inner.total_bytes += incoming_bytes;
        if let Some(evicted) = inner.entries.push(key, value).map(|(_, v)| v) {
            inner.total_bytes -= evicted.pcm.len();
        }
        while inner.total_bytes > CACHE_MAX_BYTES {
            match inner.entries.pop_lru() {
                Some((_, evicted)) => inner.total_bytes -= evicted.pcm.len(),
                None => break,
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ChunkCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(i: u64) -> ChunkCacheKey {
        ChunkCacheKey {
            track_id: 1,
            preset: "adaptive".to_string(),
            quantized_intensity: 100,
            chunk_index: i,
        }
    }

    fn chunk(bytes: usize) -> CachedChunk {
        CachedChunk {
            pcm: Arc::new(vec![0u8; bytes]),
            actual_length_samples: bytes / 2,
        }
    }

    #[test]
    fn put_then_get_returns_the_same_value() {
        let cache = ChunkCache::new();
        cache.put(key(0), chunk(128));
        assert!(cache.get(&key(0)).is_some());
    }

    #[test]
    fn exceeding_max_entries_evicts_the_least_recently_used() {
        let cache = ChunkCache::new();
        for i in 0..(CACHE_MAX_ENTRIES as u64 + 1) {
            cache.put(key(i), chunk(16));
        }
        assert!(cache.get(&key(0)).is_none());
        assert!(cache.get(&key(CACHE_MAX_ENTRIES as u64)).is_some());
    }

    #[test]
    fn exceeding_byte_budget_evicts_even_under_the_entry_cap() {
        let cache = ChunkCache::new();
        let big = CACHE_MAX_BYTES / 2 + 1;
        cache.put(key(0), chunk(big));
        cache.put(key(1), chunk(big));
        assert!(cache.get(&key(0)).is_none());
        assert!(cache.get(&key(1)).is_some());
    }
}
