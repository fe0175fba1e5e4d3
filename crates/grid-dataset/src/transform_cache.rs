//! Shared cache of derived grid geometries.
//!
//! Deriving a [`GridGeometry`] sorts longitudes and averages coordinate
//! spacing. Sources of the same product at the same resolution share one
//! grid, so a caller that builds many sources (one per model run, say) keeps
//! a single `TransformCache` and passes it to each of them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::error::Result;
use crate::geometry::GridGeometry;

/// Cache key: product name and resolution label.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransformKey {
    pub source: String,
    pub resolution: String,
}

impl TransformKey {
    pub fn new(source: impl Into<String>, resolution: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            resolution: resolution.into(),
        }
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

impl CacheStats {
    /// Calculate the cache hit rate (0.0 - 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Cheaply cloneable handle to a shared geometry cache.
#[derive(Debug, Clone, Default)]
pub struct TransformCache {
    entries: Arc<RwLock<HashMap<TransformKey, Arc<GridGeometry>>>>,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
}

impl TransformCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached geometry for `key`, or the result of `derive` stored under it.
    ///
    /// A failed derivation is returned and nothing is cached.
    pub fn get_or_insert_with<F>(&self, key: &TransformKey, derive: F) -> Result<Arc<GridGeometry>>
    where
        F: FnOnce() -> Result<GridGeometry>,
    {
        {
            let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
            if let Some(geometry) = entries.get(key) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(Arc::clone(geometry));
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let geometry = Arc::new(derive()?);

        debug!(
            source = %key.source,
            resolution = %key.resolution,
            width = geometry.width(),
            height = geometry.height(),
            "Cached grid geometry"
        );

        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        // Another caller may have derived the same key meanwhile; keep the first
        Ok(Arc::clone(entries.entry(key.clone()).or_insert(geometry)))
    }

    pub fn get(&self, key: &TransformKey) -> Option<Arc<GridGeometry>> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(key).cloned()
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: entries.len(),
        }
    }

    pub fn clear(&self) {
        self.entries.write().unwrap_or_else(|e| e.into_inner()).clear();
    }
}
