use crate::domain::result::DomainResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Persisted delivery-log entry, uniquely keyed by message id
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub message_id: String,
    pub source_addr: String,
    pub billed_amount: f64,
    pub segment_count: i32,
    pub destination_addr: String,
    pub display_text: String,
    pub status: String,
    pub billed_user_id: String,
    pub created_at: DateTime<Utc>,
    pub raw_hex: String,
    pub routed_cid: String,
    pub source_connector: String,
    pub status_at: DateTime<Utc>,
    /// Number of acknowledgement inserts observed for this message id
    pub trials: i32,
}

/// Input for overwriting the status of an existing log entry
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStatusInput {
    pub message_id: String,
    pub status: String,
    pub status_at: DateTime<Utc>,
}

/// Repository trait for the submit log.
/// Infrastructure layer (e.g. PostgreSQL) implements this trait
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait SubmitLogRepository: Send + Sync {
    /// Insert a new entry with `trials = 1`; on key conflict only increment
    /// `trials` of the stored row. Atomic per message id.
    async fn upsert_on_ack(&self, record: &LogRecord) -> DomainResult<()>;

    /// Overwrite `status` and `status_at` of an existing entry.
    /// Returns the number of rows touched; a missing row is not an error.
    async fn update_status_on_receipt(&self, input: UpdateStatusInput) -> DomainResult<u64>;

    /// Fetch an entry by message id
    async fn get(&self, message_id: &str) -> DomainResult<Option<LogRecord>>;
}
