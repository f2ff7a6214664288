// src/cache.rs
//! Time-keyed cache used to memoize expensive collaborator calls (LLM
//! stages, content lookups). Entries expire by TTL; there is no size cap.
//! Memory is bounded by expiry plus the periodic sweep, not by pressure.
//!
//! The cache is an explicit instance handed to whoever needs memoization,
//! never process-global state, so tests can run against a private store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sha2::{Digest, Sha256};
use tokio::task::JoinHandle;

/// Wall-clock source, injectable so tests advance virtual time.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        chrono::Utc::now().timestamp_millis().max(0) as u64
    }
}

/// Hand-driven clock for tests.
#[derive(Default)]
pub struct ManualClock(AtomicU64);

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self(AtomicU64::new(start_ms))
    }

    pub fn advance(&self, ms: u64) {
        self.0.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

struct CacheEntry<T> {
    value: T,
    expires_at_ms: u64,
}

/// Generic expiring key→value store. Caller keys can be arbitrarily long
/// (JSON-serialized argument tuples); they are digested to 128 bits before
/// storage. Build keys with [`cache_key`] so every operation gets its own
/// namespace and unrelated callers cannot collide.
pub struct TtlCache<T> {
    entries: Mutex<HashMap<String, CacheEntry<T>>>,
    clock: Arc<dyn Clock>,
}

impl<T: Clone> TtlCache<T> {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Lookup with lazy eviction: an expired entry is removed and reported
    /// as absent, never returned.
    pub fn get(&self, key: &str) -> Option<T> {
        let digest = digest_key(key);
        let now = self.clock.now_ms();
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        match entries.get(&digest) {
            Some(entry) if now <= entry.expires_at_ms => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(&digest);
                None
            }
            None => None,
        }
    }

    /// Unconditional overwrite with a fresh expiry.
    pub fn set(&self, key: &str, value: T, ttl_ms: u64) {
        let digest = digest_key(key);
        let expires_at_ms = self.clock.now_ms().saturating_add(ttl_ms);
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        entries.insert(
            digest,
            CacheEntry {
                value,
                expires_at_ms,
            },
        );
    }

    /// Full sweep, independent of `get`'s lazy eviction. Returns the number
    /// of entries removed.
    pub fn clean_expired(&self) -> usize {
        let now = self.clock.now_ms();
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        let before = entries.len();
        entries.retain(|_, e| now <= e.expires_at_ms);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone> Default for TtlCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Build a namespaced cache key: the operation name is joined to the payload
/// with a unit separator before hashing, so `("translate", x)` and
/// `("summarize", x)` can never land on the same entry.
pub fn cache_key(namespace: &str, payload: &str) -> String {
    format!("{namespace}\u{1f}{payload}")
}

fn digest_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(32);
    for b in digest.iter().take(16) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Spawn a process-wide sweep at a fixed interval.
pub fn spawn_sweeper<T: Clone + Send + 'static>(
    cache: Arc<TtlCache<T>>,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // The first tick fires immediately; skip it so a fresh cache is not
        // swept before anyone has written to it.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let evicted = cache.clean_expired();
            if evicted > 0 {
                tracing::debug!(evicted, "cache sweep");
            }
        }
    })
}
