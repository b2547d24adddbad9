// Copyright 2024-2025 Tree xie.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use super::CertificateEntry;
use dashmap::DashMap;
use snigate_config::MAX_CACHE_TTL;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Option<Arc<CertificateEntry>>,
    expired_at: Instant,
    // generation of the dynamic certificates the value was computed from
    generation: u64,
}

impl CacheEntry {
    #[inline]
    fn is_fresh(&self, generation: u64, now: Instant) -> bool {
        self.generation == generation && self.expired_at > now
    }
}

/// Time bounded memo of `server name -> certificate`, absence included.
///
/// Entries are tagged with the generation of the dynamic certificates they
/// were resolved against; a lookup with another generation is a miss, so a
/// value computed before a replacement is never served after it.
#[derive(Debug)]
pub struct ResultCache {
    ttl: Duration,
    entries: DashMap<String, CacheEntry>,
}

impl ResultCache {
    /// Creates a cache, the ttl is capped at [`MAX_CACHE_TTL`].
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl: ttl.min(MAX_CACHE_TTL),
            entries: DashMap::new(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Looks up a server name. The outer `None` is a miss, `Some(None)` is
    /// a cached absence. Stale entries are removed on the way.
    pub fn get(
        &self,
        key: &str,
        generation: u64,
    ) -> Option<Option<Arc<CertificateEntry>>> {
        let now = Instant::now();
        {
            let entry = self.entries.get(key)?;
            if entry.is_fresh(generation, now) {
                return Some(entry.value.clone());
            }
        }
        // the read guard must be released before removing
        self.entries
            .remove_if(key, |_, entry| !entry.is_fresh(generation, now));
        None
    }

    /// Inserts or overwrites a value, last write wins.
    pub fn insert(
        &self,
        key: String,
        value: Option<Arc<CertificateEntry>>,
        generation: u64,
    ) {
        let now = Instant::now();
        // an instant out of range is stored as already expired
        let expired_at = now.checked_add(self.ttl).unwrap_or(now);
        self.entries.insert(
            key,
            CacheEntry {
                value,
                expired_at,
                generation,
            },
        );
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Removes expired entries and returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expired_at > now);
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn new_entry(name: &str) -> Arc<CertificateEntry> {
        Arc::new(CertificateEntry::default().with_name(name))
    }

    #[test]
    fn test_result_cache() {
        let cache = ResultCache::new(Duration::from_secs(60));
        assert_eq!(Duration::from_secs(60), cache.ttl());
        assert_eq!(None, cache.get("example.com", 0));

        let entry = new_entry("example");
        cache.insert("example.com".to_string(), Some(entry.clone()), 0);
        cache.insert("missing.com".to_string(), None, 0);
        assert_eq!(2, cache.len());

        let hit = cache.get("example.com", 0).unwrap().unwrap();
        assert_eq!(true, Arc::ptr_eq(&entry, &hit));
        // cached absence
        assert_eq!(Some(None), cache.get("missing.com", 0));

        // last write wins
        let other = new_entry("other");
        cache.insert("example.com".to_string(), Some(other.clone()), 0);
        let hit = cache.get("example.com", 0).unwrap().unwrap();
        assert_eq!(true, Arc::ptr_eq(&other, &hit));

        cache.clear();
        assert_eq!(true, cache.is_empty());
        assert_eq!(None, cache.get("missing.com", 0));
    }

    #[test]
    fn test_result_cache_max_ttl() {
        let cache = ResultCache::new(Duration::MAX);
        assert_eq!(MAX_CACHE_TTL, cache.ttl());

        let entry = new_entry("example");
        cache.insert("example.com".to_string(), Some(entry.clone()), 0);
        let hit = cache.get("example.com", 0).unwrap().unwrap();
        assert_eq!(true, Arc::ptr_eq(&entry, &hit));
        assert_eq!(0, cache.sweep());
    }

    #[test]
    fn test_result_cache_generation() {
        let cache = ResultCache::new(Duration::from_secs(60));
        cache.insert("example.com".to_string(), None, 1);
        assert_eq!(None, cache.get("example.com", 2));
        // the stale entry is dropped by the lookup
        assert_eq!(0, cache.len());
    }

    #[test]
    fn test_result_cache_expired() {
        let cache = ResultCache::new(Duration::from_millis(20));
        cache.insert("a.com".to_string(), None, 0);
        cache.insert("b.com".to_string(), None, 0);
        assert_eq!(0, cache.sweep());
        std::thread::sleep(Duration::from_millis(40));

        assert_eq!(None, cache.get("a.com", 0));
        assert_eq!(1, cache.len());
        assert_eq!(1, cache.sweep());
        assert_eq!(true, cache.is_empty());
    }
}
