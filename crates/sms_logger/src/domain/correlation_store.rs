use async_trait::async_trait;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// A submission seen on the request path, waiting for its ack and receipts
#[derive(Debug, Clone, PartialEq)]
pub struct PendingSubmission {
    pub source_connector: String,
    pub routed_cid: String,
    pub billed_amount: f64,
    pub billed_user_id: String,
    pub destination_addr: String,
    pub source_addr: Option<String>,
    pub segment_count: usize,
    pub display_text: String,
    pub raw_hex: String,
}

/// Message-id keyed storage of pending submissions
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CorrelationStore: Send + Sync {
    /// Insert or overwrite the entry for `message_id`
    async fn put(&self, message_id: String, submission: PendingSubmission);

    /// Non-destructive lookup
    async fn get(&self, message_id: &str) -> Option<PendingSubmission>;

    /// Number of entries currently held
    async fn len(&self) -> usize;

    /// Total entries dropped by capacity or TTL eviction
    fn evictions(&self) -> u64;
}

#[derive(Debug, Clone)]
pub struct CorrelationStoreConfig {
    pub capacity: NonZeroUsize,
    pub ttl: Duration,
}

impl Default for CorrelationStoreConfig {
    fn default() -> Self {
        Self {
            capacity: NonZeroUsize::new(100_000).unwrap_or(NonZeroUsize::MIN),
            ttl: Duration::from_secs(24 * 60 * 60),
        }
    }
}

struct StoredSubmission {
    submission: PendingSubmission,
    stored_at: Instant,
}

/// Bounded in-memory correlation store.
///
/// Holds at most `capacity` entries, evicting the least recently used one on
/// overflow. Entries older than `ttl` are dropped lazily: on lookup, and from
/// the least-recently-used end on every insert.
pub struct InMemoryCorrelationStore {
    entries: Mutex<LruCache<String, StoredSubmission>>,
    ttl: Duration,
    evictions: AtomicU64,
}

impl InMemoryCorrelationStore {
    pub fn new(config: CorrelationStoreConfig) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(config.capacity)),
            ttl: config.ttl,
            evictions: AtomicU64::new(0),
        }
    }

    fn is_expired(&self, stored: &StoredSubmission) -> bool {
        stored.stored_at.elapsed() >= self.ttl
    }

    fn record_eviction(&self, message_id: &str, cause: &'static str) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
        debug!(message_id = %message_id, cause = cause, "evicted pending submission");
    }

    fn purge_expired(&self, entries: &mut LruCache<String, StoredSubmission>) {
        while let Some((_, oldest)) = entries.peek_lru() {
            if !self.is_expired(oldest) {
                break;
            }
            if let Some((message_id, _)) = entries.pop_lru() {
                self.record_eviction(&message_id, "ttl");
            }
        }
    }
}

impl Default for InMemoryCorrelationStore {
    fn default() -> Self {
        Self::new(CorrelationStoreConfig::default())
    }
}

#[async_trait]
impl CorrelationStore for InMemoryCorrelationStore {
    async fn put(&self, message_id: String, submission: PendingSubmission) {
        let mut entries = self.entries.lock().await;
        self.purge_expired(&mut entries);

        let stored = StoredSubmission {
            submission,
            stored_at: Instant::now(),
        };

        if let Some((displaced, _)) = entries.push(message_id.clone(), stored) {
            // push hands back the old value when the key was already present
            if displaced != message_id {
                self.record_eviction(&displaced, "capacity");
            }
        }
    }

    async fn get(&self, message_id: &str) -> Option<PendingSubmission> {
        let mut entries = self.entries.lock().await;

        let expired = self.is_expired(entries.peek(message_id)?);
        if expired {
            entries.pop(message_id);
            self.record_eviction(message_id, "ttl");
            return None;
        }

        entries
            .get(message_id)
            .map(|stored| stored.submission.clone())
    }

    async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }
}
