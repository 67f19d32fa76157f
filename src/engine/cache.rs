//! Process-lifetime dependency-value cache.
//!
//! Keys are SHA-256 content hashes of (measure key, filters, context), so
//! the same request always lands on the same entry. Writes are idempotent
//! — a key maps to the value deterministically computed from it — which is
//! what makes concurrent read/write safe without external locking. Entries
//! never expire implicitly; only [`ValueCache::clear`] removes them.

use dashmap::DashMap;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::model::context::{ExecutionContext, ExecutionFilters};

#[derive(Serialize)]
struct KeyMaterial<'a> {
    measure: &'a str,
    filters: &'a ExecutionFilters,
    context: &'a ExecutionContext,
}

/// Content hash identifying one (measure, filters, context) computation.
///
/// Returns `None` when the material cannot be serialized; callers then
/// skip the cache for that request.
pub(crate) fn content_key(
    measure: &str,
    filters: &ExecutionFilters,
    context: &ExecutionContext,
) -> Option<String> {
    let material = KeyMaterial {
        measure,
        filters,
        context,
    };
    let json = serde_json::to_string(&material).ok()?;
    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    Some(format!("{:x}", hasher.finalize()))
}

/// Concurrent map of computed measure values.
#[derive(Debug, Default)]
pub struct ValueCache {
    entries: DashMap<String, f64>,
}

impl ValueCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.entries.get(key).map(|entry| *entry)
    }

    pub fn insert(&self, key: String, value: f64) {
        self.entries.insert(key, value);
    }

    /// Drop every entry. The only way values leave the cache.
    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
