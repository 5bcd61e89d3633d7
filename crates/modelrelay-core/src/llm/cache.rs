//! Content-addressed cache of non-streaming completion results.
//!
//! Entries expire after their TTL and the cache is size-bounded: once
//! `max_entries` is exceeded the oldest insertions are evicted first.
//!
//! The cache is safe to share between concurrent requests. It does not
//! deduplicate in-flight work: two identical requests that both miss may
//! both reach a provider, and the later `put` simply replaces the earlier.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use modelrelay_types::config::CacheConfig;
use modelrelay_types::llm::CompletionResult;

use super::fingerprint::RequestFingerprint;

#[derive(Debug, Clone)]
struct CacheEntry {
    result: CompletionResult,
    inserted_at: Instant,
    ttl: Duration,
    seq: u64,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.inserted_at) >= self.ttl
    }
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<RequestFingerprint, CacheEntry>,
    /// Insertion order; may hold stale `(key, seq)` pairs for overwritten keys.
    order: VecDeque<(RequestFingerprint, u64)>,
    next_seq: u64,
}

impl CacheState {
    fn evict_oldest(&mut self) -> bool {
        while let Some((key, seq)) = self.order.pop_front() {
            if self.entries.get(&key).is_some_and(|e| e.seq == seq) {
                self.entries.remove(&key);
                return true;
            }
        }
        false
    }

    fn compact_order(&mut self) {
        let entries = &self.entries;
        self.order
            .retain(|(key, seq)| entries.get(key).is_some_and(|e| e.seq == *seq));
    }
}

/// TTL- and size-bounded response cache.
#[derive(Debug)]
pub struct ResponseCache {
    max_entries: usize,
    default_ttl: Duration,
    state: Mutex<CacheState>,
}

impl ResponseCache {
    pub fn new(max_entries: usize, default_ttl: Duration) -> Self {
        Self {
            max_entries: max_entries.max(1),
            default_ttl,
            state: Mutex::new(CacheState::default()),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.max_entries, config.ttl())
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up a live entry. Expired entries are dropped on sight.
    pub fn get(&self, fingerprint: &RequestFingerprint) -> Option<CompletionResult> {
        let mut state = self.lock();
        let now = Instant::now();
        let expired = match state.entries.get(fingerprint) {
            Some(entry) if !entry.is_expired(now) => return Some(entry.result.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            state.entries.remove(fingerprint);
        }
        None
    }

    /// Store a result for `ttl`, evicting the oldest entries past capacity.
    pub fn put(&self, fingerprint: RequestFingerprint, result: CompletionResult, ttl: Duration) {
        let mut state = self.lock();
        let seq = state.next_seq;
        state.next_seq += 1;

        state.order.push_back((fingerprint.clone(), seq));
        state.entries.insert(
            fingerprint,
            CacheEntry {
                result,
                inserted_at: Instant::now(),
                ttl,
                seq,
            },
        );

        while state.entries.len() > self.max_entries {
            if !state.evict_oldest() {
                break;
            }
        }
        if state.order.len() > self.max_entries * 2 {
            state.compact_order();
        }
    }

    /// Store a result with the default TTL.
    pub fn insert(&self, fingerprint: RequestFingerprint, result: CompletionResult) {
        self.put(fingerprint, result, self.default_ttl);
    }

    /// Remove one entry. Returns whether it was present.
    pub fn invalidate(&self, fingerprint: &RequestFingerprint) -> bool {
        self.lock().entries.remove(fingerprint).is_some()
    }

    pub fn clear(&self) {
        let mut state = self.lock();
        state.entries.clear();
        state.order.clear();
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let mut state = self.lock();
        let now = Instant::now();
        let before = state.entries.len();
        state.entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before - state.entries.len();
        if removed > 0 {
            state.compact_order();
        }
        removed
    }

    /// Number of stored entries, including ones that expired but were not
    /// yet purged.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelrelay_types::llm::{CompletionRequest, Message, ProviderId, Usage};

    fn fp(text: &str) -> RequestFingerprint {
        RequestFingerprint::of(&CompletionRequest::new(vec![Message::user(text)]))
    }

    fn result(content: &str) -> CompletionResult {
        CompletionResult {
            content: content.to_string(),
            provider_id: ProviderId::from("a"),
            model_used: "m".to_string(),
            usage: Usage::default(),
            latency: Duration::from_millis(5),
            cached: false,
        }
    }

    #[test]
    fn test_put_then_get() {
        let cache = ResponseCache::new(10, Duration::from_secs(60));
        cache.insert(fp("q"), result("answer"));
        assert_eq!(cache.get(&fp("q")).unwrap().content, "answer");
        assert!(cache.get(&fp("other")).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_never_returned_past_ttl() {
        let cache = ResponseCache::new(10, Duration::from_secs(60));
        cache.put(fp("q"), result("answer"), Duration::from_secs(5));

        tokio::time::advance(Duration::from_millis(4_999)).await;
        assert!(cache.get(&fp("q")).is_some());

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(cache.get(&fp("q")).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_oldest_evicted_first() {
        let cache = ResponseCache::new(2, Duration::from_secs(60));
        cache.insert(fp("1"), result("one"));
        cache.insert(fp("2"), result("two"));
        cache.insert(fp("3"), result("three"));

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&fp("1")).is_none());
        assert!(cache.get(&fp("2")).is_some());
        assert!(cache.get(&fp("3")).is_some());
    }

    #[test]
    fn test_overwrite_refreshes_insertion_order() {
        let cache = ResponseCache::new(2, Duration::from_secs(60));
        cache.insert(fp("1"), result("one"));
        cache.insert(fp("2"), result("two"));
        cache.insert(fp("1"), result("one again"));
        cache.insert(fp("3"), result("three"));

        assert!(cache.get(&fp("2")).is_none());
        assert_eq!(cache.get(&fp("1")).unwrap().content, "one again");
        assert!(cache.get(&fp("3")).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let cache = ResponseCache::new(10, Duration::from_secs(60));
        cache.put(fp("short"), result("s"), Duration::from_secs(1));
        cache.put(fp("long"), result("l"), Duration::from_secs(100));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_invalidate_and_clear() {
        let cache = ResponseCache::new(10, Duration::from_secs(60));
        cache.insert(fp("a"), result("a"));
        cache.insert(fp("b"), result("b"));
        assert!(cache.invalidate(&fp("a")));
        assert!(!cache.invalidate(&fp("a")));
        cache.clear();
        assert!(cache.is_empty());
    }
}
