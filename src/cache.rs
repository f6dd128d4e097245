//! In-memory expiring cache for git query results.
//!
//! Each `ExpiringCache` is a map guarded by a single mutex; hit/miss/eviction
//! counters live under the same lock so `stats()` is always consistent with
//! the map contents. Entries carry their own TTL and are dropped lazily on
//! `get`, or eagerly through `cleanup_expired` / `evict_to`.
//!
//! `GitCache` bundles one typed cache per kind of git data so that a mutation
//! (creating or removing a worktree) can invalidate exactly what it affects.

use crate::constants::{
    BRANCHES_TTL, COMMIT_INFO_TTL, CURRENT_BRANCH_TTL, DIFF_SUMMARY_TTL,
    MAX_COMMIT_INFO_ENTRIES, MAX_DIFF_SUMMARY_ENTRIES, WORKTREE_LIST_TTL,
};
use crate::models::{CommitInfo, DiffSummary, WorktreeInfo};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub(crate) struct CacheEntry<V> {
    pub(crate) value: V,
    pub(crate) inserted_at: Instant,
    pub(crate) ttl: Duration,
}

impl<V> CacheEntry<V> {
    pub(crate) fn new(value: V, ttl: Duration) -> Self {
        Self {
            value,
            inserted_at: Instant::now(),
            ttl,
        }
    }

    pub(crate) fn is_expired(&self) -> bool {
        self.inserted_at.elapsed() > self.ttl
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub(crate) struct CacheStats {
    pub(crate) hits: u64,
    pub(crate) misses: u64,
    pub(crate) evictions: u64,
    pub(crate) hit_rate: f64,
    pub(crate) size: usize,
    pub(crate) total_requests: u64,
}

#[derive(Debug, Default)]
struct Counters {
    hits: u64,
    misses: u64,
    evictions: u64,
}

#[derive(Debug)]
struct Inner<V> {
    entries: HashMap<String, CacheEntry<V>>,
    counters: Counters,
}

#[derive(Debug)]
pub(crate) struct ExpiringCache<V> {
    default_ttl: Duration,
    inner: Mutex<Inner<V>>,
}

impl<V: Clone> ExpiringCache<V> {
    pub(crate) fn new(default_ttl: Duration) -> Self {
        Self {
            default_ttl,
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                counters: Counters::default(),
            }),
        }
    }

    // Entries are never left half-written, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, Inner<V>> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn get(&self, key: &str) -> Option<V> {
        let mut inner = self.lock();
        let expired = match inner.entries.get(key) {
            None => {
                inner.counters.misses += 1;
                return None;
            }
            Some(entry) => entry.is_expired(),
        };

        if expired {
            inner.entries.remove(key);
            inner.counters.evictions += 1;
            inner.counters.misses += 1;
            return None;
        }

        inner.counters.hits += 1;
        inner.entries.get(key).map(|entry| entry.value.clone())
    }

    pub(crate) fn set(&self, key: impl Into<String>, value: V) {
        self.set_with_ttl(key, value, self.default_ttl);
    }

    pub(crate) fn set_with_ttl(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let key = key.into();
        let mut inner = self.lock();
        inner.entries.insert(key, CacheEntry::new(value, ttl));
    }

    pub(crate) fn invalidate(&self, key: &str) -> bool {
        self.lock().entries.remove(key).is_some()
    }

    /// Remove every entry whose key contains `pattern`.
    pub(crate) fn invalidate_pattern(&self, pattern: &str) -> usize {
        let mut inner = self.lock();
        let before = inner.entries.len();
        inner.entries.retain(|key, _| !key.contains(pattern));
        before - inner.entries.len()
    }

    /// Drop all entries and reset the counters.
    pub(crate) fn clear(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.counters = Counters::default();
    }

    pub(crate) fn cleanup_expired(&self) -> usize {
        let mut inner = self.lock();
        let removed = remove_expired(&mut inner.entries);
        inner.counters.evictions += removed as u64;
        removed
    }

    /// Shrink the cache to at most `max_entries`, dropping expired entries
    /// first and then the oldest ones.
    pub(crate) fn evict_to(&self, max_entries: usize) -> usize {
        let mut inner = self.lock();
        let mut removed = remove_expired(&mut inner.entries);

        if inner.entries.len() > max_entries {
            let overflow = inner.entries.len() - max_entries;
            let mut by_age: Vec<(Instant, String)> = inner
                .entries
                .iter()
                .map(|(key, entry)| (entry.inserted_at, key.clone()))
                .collect();
            by_age.sort();
            for (_, key) in by_age.into_iter().take(overflow) {
                inner.entries.remove(&key);
                removed += 1;
            }
        }

        if removed > 0 {
            tracing::debug!(removed, max_entries, "evicted cache entries");
        }
        inner.counters.evictions += removed as u64;
        removed
    }

    pub(crate) fn stats(&self) -> CacheStats {
        let inner = self.lock();
        let total_requests = inner.counters.hits + inner.counters.misses;
        let hit_rate = if total_requests > 0 {
            inner.counters.hits as f64 / total_requests as f64
        } else {
            0.0
        };
        CacheStats {
            hits: inner.counters.hits,
            misses: inner.counters.misses,
            evictions: inner.counters.evictions,
            hit_rate,
            size: inner.entries.len(),
            total_requests,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().entries.len()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return the cached value for `key`, or compute, store and return it.
    ///
    /// The lock is not held while `compute` runs, so two callers racing on
    /// the same cold key may both compute; the later `set` wins. Errors are
    /// passed through and never cached.
    pub(crate) fn get_or_try_insert_with<E>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        compute: impl FnOnce() -> Result<V, E>,
    ) -> Result<V, E> {
        if let Some(value) = self.get(key) {
            tracing::trace!(key, "cache hit");
            return Ok(value);
        }

        tracing::trace!(key, "cache miss");
        let value = compute()?;
        self.set_with_ttl(key, value.clone(), ttl.unwrap_or(self.default_ttl));
        Ok(value)
    }
}

fn remove_expired<V>(entries: &mut HashMap<String, CacheEntry<V>>) -> usize {
    let before = entries.len();
    entries.retain(|_, entry| !entry.is_expired());
    before - entries.len()
}

/// Build a readable cache key such as `diff:feature:main`.
///
/// Keys are kept human-readable (not hashed) so `invalidate_pattern` can
/// target everything that mentions a branch.
pub(crate) fn cache_key(namespace: &str, parts: &[&str]) -> String {
    let mut key = String::from(namespace);
    for part in parts {
        key.push(':');
        key.push_str(part);
    }
    key
}

pub(crate) const BRANCHES_KEY: &str = "branches";
pub(crate) const CURRENT_BRANCH_KEY: &str = "current_branch";
pub(crate) const WORKTREE_LIST_KEY: &str = "worktrees";

/// One typed cache per kind of git data held by the manager.
#[derive(Debug)]
pub(crate) struct GitCache {
    pub(crate) branches: ExpiringCache<Vec<String>>,
    pub(crate) current_branch: ExpiringCache<String>,
    pub(crate) worktrees: ExpiringCache<Vec<WorktreeInfo>>,
    pub(crate) commit_info: ExpiringCache<CommitInfo>,
    pub(crate) diff_summary: ExpiringCache<DiffSummary>,
}

impl GitCache {
    /// Build the cache set; `cache_timeout` bounds every per-kind TTL so a
    /// user can shorten all of them from config (0 disables caching).
    pub(crate) fn new(cache_timeout: Duration) -> Self {
        Self {
            branches: ExpiringCache::new(BRANCHES_TTL.min(cache_timeout)),
            current_branch: ExpiringCache::new(CURRENT_BRANCH_TTL.min(cache_timeout)),
            worktrees: ExpiringCache::new(WORKTREE_LIST_TTL.min(cache_timeout)),
            commit_info: ExpiringCache::new(COMMIT_INFO_TTL.min(cache_timeout)),
            diff_summary: ExpiringCache::new(DIFF_SUMMARY_TTL.min(cache_timeout)),
        }
    }

    /// Bound the per-commit and per-diff caches; `max_cached_items` from
    /// config can only lower the built-in limits.
    pub(crate) fn enforce_limits(&self, max_cached_items: usize) {
        let commit_limit = MAX_COMMIT_INFO_ENTRIES.min(max_cached_items);
        if self.commit_info.len() > commit_limit {
            self.commit_info.evict_to(commit_limit);
        }
        let diff_limit = MAX_DIFF_SUMMARY_ENTRIES.min(max_cached_items);
        if self.diff_summary.len() > diff_limit {
            self.diff_summary.evict_to(diff_limit);
        }
    }

    /// Forget everything a worktree mutation touching `branch` can change.
    pub(crate) fn invalidate_after_mutation(&self, branch: &str) {
        self.branches.invalidate(BRANCHES_KEY);
        self.current_branch.invalidate(CURRENT_BRANCH_KEY);
        self.worktrees.invalidate(WORKTREE_LIST_KEY);
        let diffs = self.diff_summary.invalidate_pattern(&format!(":{branch}"));
        let commits = self.commit_info.invalidate_pattern(&format!(":{branch}"));
        tracing::debug!(branch, diffs, commits, "invalidated caches after mutation");
    }

    pub(crate) fn stats(&self) -> Vec<(&'static str, CacheStats)> {
        vec![
            ("branches", self.branches.stats()),
            ("current_branch", self.current_branch.stats()),
            ("worktrees", self.worktrees.stats()),
            ("commit_info", self.commit_info.stats()),
            ("diff_summary", self.diff_summary.stats()),
        ]
    }
}
