// src/store.rs
//! Content store adapter: persists full article text by a content-derived
//! key through an external store collaborator. Every operation fails soft:
//! an absent or broken backend degrades to `StorageMethod::None` / `None`,
//! never to an error the pipeline has to handle.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

use crate::ingest::types::StorageMethod;

/// Hard cap on stored content. Anything longer is truncated with a visible
/// notice; the recorded length is the truncated one.
pub const MAX_CONTENT_BYTES: usize = 300 * 1024;
pub const TRUNCATION_NOTICE: &str = "\n\n[content truncated for storage]";

const LOOKUP_MAX_RETRIES: u32 = 3;
const LOOKUP_BACKOFF_BASE_MS: u64 = 200;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContentRecord {
    pub story_key: String,
    pub headline: String,
    pub content: String,
    pub length: usize,
    pub created_at: i64,
}

/// External persistence collaborator. May be entirely absent (unconfigured).
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Insert a record and return its storage id.
    async fn insert(&self, record: ContentRecord) -> Result<String>;
    async fn find_by_key(&self, story_key: &str) -> Result<Option<ContentRecord>>;
    /// Secondary lookup strategy for records written before key derivation
    /// changed, or by other producers.
    async fn find_by_headline(&self, headline: &str) -> Result<Option<ContentRecord>>;
}

/// Outcome of a `put`. `method == None` means "not stored", which callers
/// treat as a disabled feature, not a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredContent {
    pub id: Option<String>,
    pub method: StorageMethod,
    pub size: usize,
}

impl StoredContent {
    fn not_stored() -> Self {
        Self {
            id: None,
            method: StorageMethod::None,
            size: 0,
        }
    }
}

/// Soft-failing facade over an optional [`ContentStore`].
pub struct ContentArchive {
    store: Option<Arc<dyn ContentStore>>,
}

impl ContentArchive {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self { store: Some(store) }
    }

    /// Archive without a backend: every `put` reports `None`, every `get`
    /// misses.
    pub fn disabled() -> Self {
        Self { store: None }
    }

    /// Derive the storage key for a story from its identifying content.
    pub fn content_key(headline: &str, link: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(headline.as_bytes());
        hasher.update(b"\x1f");
        hasher.update(link.as_bytes());
        let digest = hasher.finalize();
        let mut out = String::with_capacity(32);
        for b in digest.iter().take(16) {
            use std::fmt::Write as _;
            let _ = write!(&mut out, "{:02x}", b);
        }
        out
    }

    /// Store full text under `story_key`. Idempotent: a second put for the
    /// same key returns the existing record's id without re-inserting.
    pub async fn put(&self, story_key: &str, headline: &str, content: &str) -> StoredContent {
        let Some(store) = &self.store else {
            return StoredContent::not_stored();
        };

        // Lookup-before-insert keeps retried runs from duplicating rows.
        match store.find_by_key(story_key).await {
            Ok(Some(existing)) => {
                return StoredContent {
                    id: Some(existing.story_key.clone()),
                    method: StorageMethod::Database,
                    size: existing.length,
                };
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(error = ?e, story_key, "content store lookup failed, skipping storage");
                return StoredContent::not_stored();
            }
        }

        let stored_content = truncate_for_storage(content);
        let length = stored_content.len();
        let record = ContentRecord {
            story_key: story_key.to_string(),
            headline: headline.to_string(),
            content: stored_content,
            length,
            created_at: chrono::Utc::now().timestamp(),
        };

        match store.insert(record).await {
            Ok(id) => StoredContent {
                id: Some(id),
                method: StorageMethod::Database,
                size: length,
            },
            Err(e) => {
                tracing::warn!(error = ?e, story_key, "content store insert failed");
                StoredContent::not_stored()
            }
        }
    }

    /// Fetch stored text by key, falling back to a headline lookup when the
    /// key misses. Transient lookup errors are retried with exponential
    /// backoff; exhaustion returns `None`, never an error.
    pub async fn get(&self, story_key: &str, headline: &str) -> Option<String> {
        let store = self.store.as_ref()?;

        let mut attempt: u32 = 0;
        loop {
            let lookup = async {
                if let Some(rec) = store.find_by_key(story_key).await? {
                    return Ok::<_, anyhow::Error>(Some(rec));
                }
                store.find_by_headline(headline).await
            };
            match lookup.await {
                Ok(Some(rec)) => return Some(rec.content),
                Ok(None) => return None,
                Err(e) => {
                    attempt += 1;
                    if attempt >= LOOKUP_MAX_RETRIES {
                        tracing::warn!(error = ?e, story_key, "content lookup failed after retries");
                        return None;
                    }
                    let delay = LOOKUP_BACKOFF_BASE_MS << (attempt - 1);
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                }
            }
        }
    }
}

/// Truncate on a char boundary and append the notice. The recorded length is
/// the truncated length, not the original.
fn truncate_for_storage(content: &str) -> String {
    if content.len() <= MAX_CONTENT_BYTES {
        return content.to_string();
    }
    let mut end = MAX_CONTENT_BYTES;
    while !content.is_char_boundary(end) {
        end -= 1;
    }
    let mut out = String::with_capacity(end + TRUNCATION_NOTICE.len());
    out.push_str(&content[..end]);
    out.push_str(TRUNCATION_NOTICE);
    out
}

/// In-memory store, used by tests and offline runs.
#[derive(Default)]
pub struct MemoryContentStore {
    records: Mutex<HashMap<String, ContentRecord>>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().expect("store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn insert(&self, record: ContentRecord) -> Result<String> {
        let key = record.story_key.clone();
        self.records
            .lock()
            .expect("store lock poisoned")
            .insert(key.clone(), record);
        Ok(key)
    }

    async fn find_by_key(&self, story_key: &str) -> Result<Option<ContentRecord>> {
        Ok(self
            .records
            .lock()
            .expect("store lock poisoned")
            .get(story_key)
            .cloned())
    }

    async fn find_by_headline(&self, headline: &str) -> Result<Option<ContentRecord>> {
        Ok(self
            .records
            .lock()
            .expect("store lock poisoned")
            .values()
            .find(|r| r.headline == headline)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_archive_degrades_to_none() {
        let archive = ContentArchive::disabled();
        let stored = archive.put("k", "h", "body").await;
        assert_eq!(stored.method, StorageMethod::None);
        assert_eq!(stored.id, None);
        assert_eq!(archive.get("k", "h").await, None);
    }

    #[tokio::test]
    async fn put_is_idempotent() {
        let store = Arc::new(MemoryContentStore::new());
        let archive = ContentArchive::new(store.clone());
        let first = archive.put("k1", "headline", "body").await;
        let second = archive.put("k1", "headline", "other body").await;
        assert_eq!(first.method, StorageMethod::Database);
        assert_eq!(second.id, first.id);
        assert_eq!(store.len(), 1);
        // The original body survives the repeated put.
        assert_eq!(archive.get("k1", "headline").await.as_deref(), Some("body"));
    }

    #[tokio::test]
    async fn oversized_content_is_truncated_with_notice() {
        let store = Arc::new(MemoryContentStore::new());
        let archive = ContentArchive::new(store);
        let big = "x".repeat(MAX_CONTENT_BYTES + 100);
        let stored = archive.put("k", "h", &big).await;
        assert_eq!(stored.method, StorageMethod::Database);
        assert!(stored.size < big.len());
        let roundtrip = archive.get("k", "h").await.unwrap();
        assert!(roundtrip.ends_with(TRUNCATION_NOTICE));
        assert_eq!(roundtrip.len(), stored.size);
    }

    #[tokio::test]
    async fn get_falls_back_to_headline_lookup() {
        let store = Arc::new(MemoryContentStore::new());
        store
            .insert(ContentRecord {
                story_key: "other-key".into(),
                headline: "The Headline".into(),
                content: "body".into(),
                length: 4,
                created_at: 0,
            })
            .await
            .unwrap();
        let archive = ContentArchive::new(store);
        assert_eq!(
            archive.get("missing-key", "The Headline").await.as_deref(),
            Some("body")
        );
    }

    #[test]
    fn content_key_is_stable_and_distinct() {
        let a = ContentArchive::content_key("h", "https://a.com/1");
        let b = ContentArchive::content_key("h", "https://a.com/2");
        assert_eq!(a, ContentArchive::content_key("h", "https://a.com/1"));
        assert_ne!(a, b);
        assert_eq!(a.len(), 32);
    }
}
