//! In-memory query cache with per-entry TTL and bounded size
//!
//! `CacheManager` stores values under string keys. Entries expire lazily: an
//! expired entry is only removed when it is read (or by `purge_expired`).
//! When the cache is full and a new key is inserted, exactly one entry is
//! evicted according to the configured [`EvictionStrategy`].
//!
//! Recency and insertion order share one index: every entry carries a
//! sequence number and `order` maps sequence numbers back to keys, so the
//! eviction victim is always the first entry of `order`. Under LRU a touch
//! re-sequences the entry; under FIFO the sequence is fixed at insertion.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use regex::Regex;
use serde::Serialize;

/// Default time-to-live for cached entries
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Default maximum number of cached entries
pub const DEFAULT_MAX_ITEMS: usize = 100;

/// Which entry is evicted when a full cache receives a new key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictionStrategy {
    /// Evict the least recently touched key (get or set)
    #[default]
    Lru,
    /// Evict the oldest inserted key, ignoring access
    Fifo,
}

impl EvictionStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            EvictionStrategy::Lru => "lru",
            EvictionStrategy::Fifo => "fifo",
        }
    }
}

impl std::fmt::Display for EvictionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for EvictionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lru" => Ok(EvictionStrategy::Lru),
            "fifo" => Ok(EvictionStrategy::Fifo),
            _ => Err(format!("Invalid eviction strategy: {}", s)),
        }
    }
}

/// Cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// TTL applied by `set` and `fetch` when no explicit TTL is given
    pub ttl: Duration,
    /// Maximum number of entries (values below 1 are treated as 1)
    pub max_items: usize,
    /// Eviction strategy used when the cache is full
    pub strategy: EvictionStrategy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            max_items: DEFAULT_MAX_ITEMS,
            strategy: EvictionStrategy::Lru,
        }
    }
}

/// Counters describing cache behaviour since creation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct Entry<V> {
    value: V,
    stored_at: Instant,
    ttl: Duration,
    seq: u64,
}

impl<V> Entry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) > self.ttl
    }
}

struct Inner<V> {
    entries: HashMap<String, Entry<V>>,
    order: BTreeMap<u64, String>,
    next_seq: u64,
    stats: CacheStats,
}

impl<V> Inner<V> {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            order: BTreeMap::new(),
            next_seq: 0,
            stats: CacheStats::default(),
        }
    }

    fn bump(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    fn touch(&mut self, key: &str) {
        let seq = self.bump();
        if let Some(entry) = self.entries.get_mut(key) {
            self.order.remove(&entry.seq);
            entry.seq = seq;
            self.order.insert(seq, key.to_string());
        }
    }

    fn remove(&mut self, key: &str) -> bool {
        match self.entries.remove(key) {
            Some(entry) => {
                self.order.remove(&entry.seq);
                true
            }
            None => false,
        }
    }

    fn evict_one(&mut self) -> Option<String> {
        let (_, key) = self.order.pop_first()?;
        self.entries.remove(&key);
        self.stats.evictions += 1;
        Some(key)
    }
}

/// TTL + LRU/FIFO cache shared across request handlers
pub struct CacheManager<V> {
    config: CacheConfig,
    inner: Mutex<Inner<V>>,
}

impl<V> std::fmt::Debug for CacheManager<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheManager")
            .field("config", &self.config)
            .field("len", &self.len())
            .finish()
    }
}

impl<V> Default for CacheManager<V> {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl<V> CacheManager<V> {
    pub fn new(mut config: CacheConfig) -> Self {
        config.max_items = config.max_items.max(1);
        Self {
            config,
            inner: Mutex::new(Inner::new()),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Store a value with the default TTL
    pub fn set(&self, key: impl Into<String>, value: V) {
        self.set_with_ttl(key, value, self.config.ttl);
    }

    /// Store a value with an explicit TTL.
    ///
    /// Overwriting an existing key never evicts. A new key inserted into a
    /// full cache evicts exactly one entry first.
    pub fn set_with_ttl(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let key = key.into();
        let now = Instant::now();
        let mut inner = self.inner.lock();

        if let Some(entry) = inner.entries.get_mut(&key) {
            entry.value = value;
            entry.stored_at = now;
            entry.ttl = ttl;
            if self.config.strategy == EvictionStrategy::Lru {
                inner.touch(&key);
            }
            return;
        }

        if inner.entries.len() >= self.config.max_items {
            inner.evict_one();
        }

        let seq = inner.bump();
        inner.order.insert(seq, key.clone());
        inner.entries.insert(
            key,
            Entry {
                value,
                stored_at: now,
                ttl,
                seq,
            },
        );
    }

    /// Remove a single key, returning whether it was present
    pub fn invalidate(&self, key: &str) -> bool {
        self.inner.lock().remove(key)
    }

    /// Remove every key matching `pattern`, returning how many were removed
    pub fn invalidate_pattern(&self, pattern: &Regex) -> usize {
        let mut inner = self.inner.lock();
        let matched: Vec<String> = inner
            .entries
            .keys()
            .filter(|key| pattern.is_match(key))
            .cloned()
            .collect();

        for key in &matched {
            inner.remove(key);
        }
        matched.len()
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.order.clear();
    }

    /// Drop every expired entry, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        let expired: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            inner.remove(key);
        }
        inner.stats.expirations += expired.len() as u64;
        expired.len()
    }

    /// Whether a key is stored, without touching recency or expiring it
    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.lock().entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys ordered from next eviction victim to most protected
    pub fn keys(&self) -> Vec<String> {
        self.inner.lock().order.values().cloned().collect()
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.lock().stats
    }
}

impl<V: Clone> CacheManager<V> {
    /// Read a value; expired entries are removed and reported as a miss
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let mut inner = self.inner.lock();

        let expired = match inner.entries.get(key) {
            Some(entry) => entry.is_expired(now),
            None => {
                inner.stats.misses += 1;
                return None;
            }
        };

        if expired {
            inner.remove(key);
            inner.stats.expirations += 1;
            inner.stats.misses += 1;
            return None;
        }

        if self.config.strategy == EvictionStrategy::Lru {
            inner.touch(key);
        }
        inner.stats.hits += 1;
        inner.entries.get(key).map(|entry| entry.value.clone())
    }

    /// Return the cached value for `key`, or run `query` and cache its result.
    ///
    /// Errors from `query` are returned to the caller and never cached.
    pub async fn fetch<F, Fut, E>(&self, key: &str, ttl: Option<Duration>, query: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }

        let value = query().await?;
        self.set_with_ttl(key, value.clone(), ttl.unwrap_or(self.config.ttl));
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    fn cache(max_items: usize, strategy: EvictionStrategy) -> CacheManager<u32> {
        CacheManager::new(CacheConfig {
            ttl: Duration::from_secs(60),
            max_items,
            strategy,
        })
    }

    #[test]
    fn test_get_after_set_returns_value() {
        let cache = cache(10, EvictionStrategy::Lru);
        cache.set("a", 1);
        assert_eq!(cache.get("a"), Some(1));
        assert_eq!(cache.get("missing"), None);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_expired_entry_is_removed_on_get() {
        let cache = cache(10, EvictionStrategy::Lru);
        cache.set_with_ttl("short", 7, Duration::from_millis(20));
        cache.set("long", 8);

        std::thread::sleep(Duration::from_millis(50));

        assert!(cache.contains_key("short"));
        assert_eq!(cache.get("short"), None);
        assert!(!cache.contains_key("short"));
        assert_eq!(cache.get("long"), Some(8));
        assert_eq!(cache.stats().expirations, 1);
    }

    #[test]
    fn test_purge_expired() {
        let cache = cache(10, EvictionStrategy::Fifo);
        cache.set_with_ttl("a", 1, Duration::from_millis(10));
        cache.set_with_ttl("b", 2, Duration::from_millis(10));
        cache.set("c", 3);

        std::thread::sleep(Duration::from_millis(30));

        assert_eq!(cache.purge_expired(), 2);
        assert_eq!(cache.keys(), vec!["c".to_string()]);
    }

    #[test]
    fn test_lru_evicts_least_recently_touched() {
        let cache = cache(3, EvictionStrategy::Lru);
        cache.set("a", 1);
        cache.set("b", 2);
        cache.set("c", 3);

        // Touch "a" so "b" becomes the oldest
        assert_eq!(cache.get("a"), Some(1));
        cache.set("d", 4);

        assert_eq!(cache.len(), 3);
        assert!(!cache.contains_key("b"));
        assert!(cache.contains_key("a"));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_fifo_ignores_access_pattern() {
        let cache = cache(3, EvictionStrategy::Fifo);
        cache.set("a", 1);
        cache.set("b", 2);
        cache.set("c", 3);

        assert_eq!(cache.get("a"), Some(1));
        cache.set("a", 10);
        cache.set("d", 4);

        assert!(!cache.contains_key("a"));
        assert_eq!(cache.keys(), vec!["b", "c", "d"]);
    }

    #[test]
    fn test_overwrite_at_capacity_does_not_evict() {
        let cache = cache(2, EvictionStrategy::Lru);
        cache.set("a", 1);
        cache.set("b", 2);
        cache.set("a", 3);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a"), Some(3));
        assert_eq!(cache.stats().evictions, 0);
    }

    #[test]
    fn test_invalidate_pattern_removes_only_matches() {
        let cache = cache(10, EvictionStrategy::Lru);
        cache.set("dashboard:u1", 1);
        cache.set("dashboard:u2", 2);
        cache.set("analytics:u1", 3);
        cache.set("plan:u1", 4);

        let removed = cache.invalidate_pattern(&Regex::new(r"^dashboard:").unwrap());
        assert_eq!(removed, 2);
        assert_eq!(cache.len(), 2);

        let removed = cache.invalidate_pattern(&Regex::new(r":u1$").unwrap());
        assert_eq!(removed, 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_invalidate_and_clear() {
        let cache = cache(10, EvictionStrategy::Lru);
        cache.set("a", 1);
        cache.set("b", 2);

        assert!(cache.invalidate("a"));
        assert!(!cache.invalidate("a"));
        assert_eq!(cache.keys(), vec!["b".to_string()]);

        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.keys().is_empty());
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let cache = cache(0, EvictionStrategy::Lru);
        assert_eq!(cache.config().max_items, 1);
        cache.set("a", 1);
        cache.set("b", 2);
        assert_eq!(cache.keys(), vec!["b".to_string()]);
    }

    #[test]
    fn test_strategy_parse() {
        assert_eq!("LRU".parse::<EvictionStrategy>().unwrap(), EvictionStrategy::Lru);
        assert_eq!("fifo".parse::<EvictionStrategy>().unwrap(), EvictionStrategy::Fifo);
        assert!("random".parse::<EvictionStrategy>().is_err());
    }

    #[tokio::test]
    async fn test_fetch_caches_success_only() {
        let cache = cache(10, EvictionStrategy::Lru);
        let mut calls = 0;

        let first: Result<u32, String> = cache
            .fetch("k", None, || {
                calls += 1;
                async { Ok(42) }
            })
            .await;
        assert_eq!(first, Ok(42));

        let second: Result<u32, String> = cache
            .fetch("k", None, || async { Err("should not run".to_string()) })
            .await;
        assert_eq!(second, Ok(42));
        assert_eq!(calls, 1);

        let failed: Result<u32, String> = cache
            .fetch("other", None, || async { Err("boom".to_string()) })
            .await;
        assert_eq!(failed, Err("boom".to_string()));
        assert!(!cache.contains_key("other"));
    }

    #[derive(Debug, Clone)]
    enum Op {
        Get(u8),
        Set(u8),
        Invalidate(u8),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u8..8).prop_map(Op::Get),
            (0u8..8).prop_map(Op::Set),
            (0u8..8).prop_map(Op::Invalidate),
        ]
    }

    /// Reference model: a vector ordered from eviction victim to newest
    fn apply_model(model: &mut Vec<String>, op: &Op, max: usize, strategy: EvictionStrategy) {
        match op {
            Op::Get(k) => {
                let key = format!("k{}", k);
                if let Some(pos) = model.iter().position(|e| *e == key)
                    && strategy == EvictionStrategy::Lru
                {
                    let key = model.remove(pos);
                    model.push(key);
                }
            }
            Op::Set(k) => {
                let key = format!("k{}", k);
                match model.iter().position(|e| *e == key) {
                    Some(pos) => {
                        if strategy == EvictionStrategy::Lru {
                            let key = model.remove(pos);
                            model.push(key);
                        }
                    }
                    None => {
                        if model.len() >= max {
                            model.remove(0);
                        }
                        model.push(key);
                    }
                }
            }
            Op::Invalidate(k) => {
                let key = format!("k{}", k);
                model.retain(|e| *e != key);
            }
        }
    }

    proptest! {
        #[test]
        fn prop_matches_reference_model(
            ops in proptest::collection::vec(op_strategy(), 1..64),
            lru in any::<bool>(),
            max in 1usize..6,
        ) {
            let strategy = if lru { EvictionStrategy::Lru } else { EvictionStrategy::Fifo };
            let cache = cache(max, strategy);
            let mut model: Vec<String> = Vec::new();

            for op in &ops {
                let before = cache.len();
                match op {
                    Op::Get(k) => {
                        let key = format!("k{}", k);
                        prop_assert_eq!(cache.get(&key).is_some(), model.contains(&key));
                    }
                    Op::Set(k) => cache.set(format!("k{}", k), u32::from(*k)),
                    Op::Invalidate(k) => {
                        cache.invalidate(&format!("k{}", k));
                    }
                }
                apply_model(&mut model, op, max, strategy);

                prop_assert_eq!(cache.keys(), model.clone());
                prop_assert!(cache.len() <= max);
                if matches!(op, Op::Set(_)) {
                    prop_assert!(cache.len() >= before);
                }
            }
        }

        #[test]
        fn prop_set_then_get_within_ttl(
            entries in proptest::collection::hash_map("[a-z]{1,6}", any::<u32>(), 1..20),
        ) {
            let cache = cache(entries.len(), EvictionStrategy::Lru);
            for (key, value) in &entries {
                cache.set(key.clone(), *value);
            }
            for (key, value) in &entries {
                prop_assert_eq!(cache.get(key), Some(*value));
            }
        }

        #[test]
        fn prop_invalidate_pattern_removes_exactly_matches(
            keys in proptest::collection::hash_set("(user|project):[0-9]{1,3}", 1..30),
        ) {
            let cache = cache(keys.len(), EvictionStrategy::Fifo);
            for key in &keys {
                cache.set(key.clone(), 0);
            }
            let pattern = Regex::new("^user:").unwrap();
            let expected = keys.iter().filter(|k| pattern.is_match(k)).count();

            prop_assert_eq!(cache.invalidate_pattern(&pattern), expected);
            for key in &keys {
                prop_assert_eq!(cache.contains_key(key), !pattern.is_match(key));
            }
        }
    }
}
