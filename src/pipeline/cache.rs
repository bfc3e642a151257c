//! LRU cache of decode pipelines keyed by folder fingerprint.

use std::num::NonZeroUsize;

use lru::LruCache;

use super::{DecodePipeline, PipelineFingerprint};
use crate::format::streams::Folder;
use crate::{Error, Result};

/// Default number of cached pipelines.
pub const DEFAULT_CACHE_CAPACITY: usize = 4;

/// Cache hit and build counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups served by an existing pipeline.
    pub hits: u64,
    /// Pipelines built because no cached one matched.
    pub builds: u64,
}

impl CacheStats {
    /// Fraction of lookups served from the cache, 0.0 when nothing was
    /// looked up.
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.builds;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Keeps recently used pipelines so folders with the same coder graph skip
/// decoder instantiation.
///
/// Failed builds are not cached: the next folder with the same shape tries
/// again and fails the same way.
pub struct PipelineCache {
    entries: LruCache<PipelineFingerprint, DecodePipeline>,
    stats: CacheStats,
}

impl std::fmt::Debug for PipelineCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineCache")
            .field("len", &self.entries.len())
            .field("capacity", &self.entries.cap())
            .field("stats", &self.stats)
            .finish()
    }
}

impl Default for PipelineCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl PipelineCache {
    /// Creates a cache holding up to `capacity` pipelines (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
            stats: CacheStats::default(),
        }
    }

    /// Counters since creation.
    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Number of cached pipelines.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of cached pipelines.
    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }

    /// Drops every cached pipeline. Counters are kept.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Returns the pipeline for `folder`, building and caching it on a miss.
    pub fn get_or_build(&mut self, folder: &Folder) -> Result<&mut DecodePipeline> {
        let fingerprint = PipelineFingerprint::of(folder);
        // `get_mut` promotes a hit to most recently used.
        if self.entries.get_mut(&fingerprint).is_some() {
            self.stats.hits += 1;
            log::trace!("pipeline cache hit ({} coders)", fingerprint.coders.len());
        } else {
            let pipeline = DecodePipeline::build(folder)?;
            self.stats.builds += 1;
            log::debug!("built pipeline {pipeline:?}");
            self.entries.put(fingerprint.clone(), pipeline);
        }
        self.entries
            .get_mut(&fingerprint)
            .ok_or_else(|| Error::ResourceLimitExceeded("pipeline cache has no capacity".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::streams::Coder;

    fn folder(method_id: &[u8]) -> Folder {
        Folder {
            coders: vec![Coder {
                method_id: method_id.to_vec(),
                num_in_streams: 1,
                num_out_streams: 1,
                properties: None,
            }],
            bind_pairs: Vec::new(),
            packed_streams: vec![0],
            unpack_sizes: vec![1],
            unpack_crc: None,
            header_offset: 0,
        }
    }

    #[test]
    fn test_hits_and_builds() {
        let mut cache = PipelineCache::new(4);
        let copy = folder(&[0x00]);
        for _ in 0..3 {
            cache.get_or_build(&copy).unwrap();
        }
        assert_eq!(cache.stats(), CacheStats { hits: 2, builds: 1 });
        assert_eq!(cache.len(), 1);
        assert!((cache.stats().hit_ratio() - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_capacity_is_one() {
        let cache = PipelineCache::new(0);
        assert_eq!(cache.capacity(), 1);
    }

    #[cfg(feature = "lzma")]
    #[test]
    fn test_eviction_rebuilds() {
        let mut cache = PipelineCache::new(1);
        let copy = folder(&[0x00]);
        let delta = folder(&[0x03]);
        cache.get_or_build(&copy).unwrap();
        cache.get_or_build(&delta).unwrap();
        cache.get_or_build(&copy).unwrap();
        assert_eq!(cache.stats().builds, 3);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_failed_build_not_cached() {
        let mut cache = PipelineCache::new(4);
        let unknown = folder(&[0x7F]);
        assert!(cache.get_or_build(&unknown).is_err());
        assert!(cache.get_or_build(&unknown).is_err());
        assert!(cache.is_empty());
        assert_eq!(cache.stats(), CacheStats::default());
    }

    #[test]
    fn test_empty_stats_ratio() {
        assert_eq!(CacheStats::default().hit_ratio(), 0.0);
    }
}
