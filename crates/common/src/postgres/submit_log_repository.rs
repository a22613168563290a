use crate::domain::{DomainError, DomainResult, LogRecord, SubmitLogRepository, UpdateStatusInput};
use crate::postgres::PostgresClient;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

const UPSERT_ON_ACK: &str = "INSERT INTO submit_log (msgid, source_addr, rate, pdu_count,
                                destination_addr, short_message, status, uid, created_at,
                                binary_message, routed_cid, source_connector, status_at, trials)
     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, 1)
     ON CONFLICT (msgid) DO UPDATE SET trials = submit_log.trials + 1";

const UPDATE_STATUS: &str = "UPDATE submit_log SET status = $1, status_at = $2 WHERE msgid = $3";

const SELECT_BY_MSGID: &str = "SELECT msgid, source_addr, rate, pdu_count, destination_addr,
            short_message, status, uid, created_at, binary_message, routed_cid,
            source_connector, status_at, trials
     FROM submit_log
     WHERE msgid = $1";

/// submit_log row as stored in PostgreSQL
#[derive(Debug, Clone)]
pub struct SubmitLogRow {
    pub msgid: String,
    pub source_addr: String,
    pub rate: f64,
    pub pdu_count: i32,
    pub destination_addr: String,
    pub short_message: String,
    pub status: String,
    pub uid: String,
    pub created_at: DateTime<Utc>,
    pub binary_message: String,
    pub routed_cid: String,
    pub source_connector: String,
    pub status_at: DateTime<Utc>,
    pub trials: i32,
}

impl From<SubmitLogRow> for LogRecord {
    fn from(row: SubmitLogRow) -> Self {
        LogRecord {
            message_id: row.msgid,
            source_addr: row.source_addr,
            billed_amount: row.rate,
            segment_count: row.pdu_count,
            destination_addr: row.destination_addr,
            display_text: row.short_message,
            status: row.status,
            billed_user_id: row.uid,
            created_at: row.created_at,
            raw_hex: row.binary_message,
            routed_cid: row.routed_cid,
            source_connector: row.source_connector,
            status_at: row.status_at,
            trials: row.trials,
        }
    }
}

impl TryFrom<&tokio_postgres::Row> for SubmitLogRow {
    type Error = tokio_postgres::Error;

    fn try_from(row: &tokio_postgres::Row) -> Result<Self, Self::Error> {
        Ok(SubmitLogRow {
            msgid: row.try_get("msgid")?,
            source_addr: row.try_get("source_addr")?,
            rate: row.try_get("rate")?,
            pdu_count: row.try_get("pdu_count")?,
            destination_addr: row.try_get("destination_addr")?,
            short_message: row.try_get("short_message")?,
            status: row.try_get("status")?,
            uid: row.try_get("uid")?,
            created_at: row.try_get("created_at")?,
            binary_message: row.try_get("binary_message")?,
            routed_cid: row.try_get("routed_cid")?,
            source_connector: row.try_get("source_connector")?,
            status_at: row.try_get("status_at")?,
            trials: row.try_get("trials")?,
        })
    }
}

#[derive(Clone)]
pub struct PostgresSubmitLogRepository {
    client: PostgresClient,
}

impl PostgresSubmitLogRepository {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SubmitLogRepository for PostgresSubmitLogRepository {
    async fn upsert_on_ack(&self, record: &LogRecord) -> DomainResult<()> {
        debug!(msgid = %record.message_id, "Upserting submit_log entry");

        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::PersistenceFailure)?;

        conn.execute(
            UPSERT_ON_ACK,
            &[
                &record.message_id,
                &record.source_addr,
                &record.billed_amount,
                &record.segment_count,
                &record.destination_addr,
                &record.display_text,
                &record.status,
                &record.billed_user_id,
                &record.created_at,
                &record.raw_hex,
                &record.routed_cid,
                &record.source_connector,
                &record.status_at,
            ],
        )
        .await
        .map_err(|e| DomainError::PersistenceFailure(e.into()))?;

        info!(msgid = %record.message_id, status = %record.status, "submit_log entry upserted");
        Ok(())
    }

    async fn update_status_on_receipt(&self, input: UpdateStatusInput) -> DomainResult<u64> {
        debug!(msgid = %input.message_id, status = %input.status, "Updating submit_log status");

        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::PersistenceFailure)?;

        let updated = conn
            .execute(
                UPDATE_STATUS,
                &[&input.status, &input.status_at, &input.message_id],
            )
            .await
            .map_err(|e| DomainError::PersistenceFailure(e.into()))?;

        if updated == 0 {
            debug!(msgid = %input.message_id, "no submit_log entry to update");
        } else {
            info!(msgid = %input.message_id, status = %input.status, "submit_log status updated");
        }

        Ok(updated)
    }

    async fn get(&self, message_id: &str) -> DomainResult<Option<LogRecord>> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::PersistenceFailure)?;

        let row = conn
            .query_opt(SELECT_BY_MSGID, &[&message_id])
            .await
            .map_err(|e| DomainError::PersistenceFailure(e.into()))?;

        row.map(|row| {
            SubmitLogRow::try_from(&row)
                .map(LogRecord::from)
                .map_err(|e| DomainError::PersistenceFailure(e.into()))
        })
        .transpose()
    }
}
