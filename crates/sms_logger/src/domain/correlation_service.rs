use crate::domain::{normalize, reassemble, resolve_billing, CorrelationStore, PendingSubmission};
use chrono::Utc;
use common::domain::{
    DeliveryReceiptEvent, DomainError, DomainResult, InboundEvent, LogRecord, SubmitAckEvent,
    SubmitLogRepository, SubmitRequestEvent, UpdateStatusInput,
};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Status prefix of receipts the gateway derives from its own submit_sm_resp
pub const INTERNAL_STATUS_PREFIX: &str = "ESME_";

/// Qualifier some producers put in front of status codes
const COMMAND_STATUS_QUALIFIER: &str = "CommandStatus.";

/// Why an event was acknowledged without effect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    UnrecognizedRoute,
    UnknownSubmission,
    UnknownReceipt,
    InternalReceipt,
    MalformedBillingData,
    MalformedEvent,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            SkipReason::UnrecognizedRoute => "unrecognized route",
            SkipReason::UnknownSubmission => "unknown submission",
            SkipReason::UnknownReceipt => "unknown receipt",
            SkipReason::InternalReceipt => "internal receipt",
            SkipReason::MalformedBillingData => "malformed billing data",
            SkipReason::MalformedEvent => "malformed event",
        };
        f.write_str(reason)
    }
}

/// Result of handling one inbound event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Submission request kept for correlation
    Stored,
    /// Acknowledgement written to the submit log
    Persisted,
    /// Delivery receipt applied to the submit log
    StatusUpdated,
    Skipped(SkipReason),
}

/// Remove the `CommandStatus.` qualifier from a status code
pub fn normalize_status(status: &str) -> String {
    status.replace(COMMAND_STATUS_QUALIFIER, "")
}

/// Domain service correlating submissions, acknowledgements and delivery
/// receipts into the submit log.
///
/// Flow per event:
/// 1. Submission request: reassemble, normalize text, resolve billing, remember it
/// 2. Acknowledgement: look up the submission, upsert the log entry
/// 3. Delivery receipt: look up the submission, overwrite the log entry status
///
/// Only persistence failures are returned as errors; every other problem is
/// logged once and reported as a skip.
pub struct CorrelationService {
    store: Arc<dyn CorrelationStore>,
    repository: Arc<dyn SubmitLogRepository>,
}

impl CorrelationService {
    pub fn new(store: Arc<dyn CorrelationStore>, repository: Arc<dyn SubmitLogRepository>) -> Self {
        Self { store, repository }
    }

    #[instrument(skip(self, event), fields(routing_key = %event.routing_key(), message_id = event.message_id().unwrap_or_default()))]
    pub async fn process_event(&self, event: InboundEvent) -> DomainResult<ProcessOutcome> {
        match event {
            InboundEvent::SubmissionRequest(request) => self.handle_submission_request(request).await,
            InboundEvent::SubmissionAck(ack) => self.handle_submission_ack(ack).await,
            InboundEvent::DeliveryReceipt(receipt) => self.handle_delivery_receipt(receipt).await,
            InboundEvent::Unrecognized { routing_key } => {
                warn!(routing_key = %routing_key, "unknown route: {routing_key}");
                Ok(ProcessOutcome::Skipped(SkipReason::UnrecognizedRoute))
            }
        }
    }

    async fn handle_submission_request(
        &self,
        request: SubmitRequestEvent,
    ) -> DomainResult<ProcessOutcome> {
        let reassembled = reassemble(&request.segments);

        // addressing and coding come from the last segment of the chain
        let last = request.segments.last();
        let text = normalize(&reassembled.buffer, last.data_coding.as_ref());

        let cost = match resolve_billing(&request.metadata, reassembled.segment_count) {
            Ok(cost) => cost,
            Err(e) => {
                error!(
                    message_id = %request.message_id,
                    error = %e,
                    "dropping submission with unusable billing data"
                );
                return Ok(ProcessOutcome::Skipped(SkipReason::MalformedBillingData));
            }
        };

        let pending = PendingSubmission {
            source_connector: request.source_connector,
            routed_cid: request.routed_cid,
            billed_amount: cost.billed_amount,
            billed_user_id: cost.billed_user_id,
            destination_addr: last.destination_addr.clone(),
            source_addr: last.source_addr.clone(),
            segment_count: reassembled.segment_count,
            display_text: text.display_text,
            raw_hex: text.raw_hex,
        };

        debug!(
            message_id = %request.message_id,
            segment_count = pending.segment_count,
            billed_amount = pending.billed_amount,
            "storing pending submission"
        );

        self.store.put(request.message_id, pending).await;
        Ok(ProcessOutcome::Stored)
    }

    async fn handle_submission_ack(&self, ack: SubmitAckEvent) -> DomainResult<ProcessOutcome> {
        let Some(pending) = self.store.get(&ack.message_id).await else {
            warn!(message_id = %ack.message_id, "got resp of an unknown submit_sm: {}", ack.message_id);
            return Ok(ProcessOutcome::Skipped(SkipReason::UnknownSubmission));
        };

        let created_at = ack.created_at.unwrap_or_else(Utc::now);
        let segment_count = i32::try_from(pending.segment_count).map_err(|_| {
            DomainError::MalformedEvent(format!(
                "segment count {} out of range",
                pending.segment_count
            ))
        })?;

        let record = LogRecord {
            message_id: ack.message_id,
            source_addr: pending.source_addr.unwrap_or_default(),
            billed_amount: pending.billed_amount,
            segment_count,
            destination_addr: pending.destination_addr,
            display_text: pending.display_text,
            status: normalize_status(&ack.command_status),
            billed_user_id: pending.billed_user_id,
            created_at,
            raw_hex: pending.raw_hex,
            routed_cid: pending.routed_cid,
            source_connector: pending.source_connector,
            status_at: created_at,
            trials: 1,
        };

        self.repository.upsert_on_ack(&record).await?;

        info!(message_id = %record.message_id, status = %record.status, "submission logged");
        Ok(ProcessOutcome::Persisted)
    }

    async fn handle_delivery_receipt(
        &self,
        receipt: DeliveryReceiptEvent,
    ) -> DomainResult<ProcessOutcome> {
        if receipt.message_status.starts_with(INTERNAL_STATUS_PREFIX) {
            debug!(
                message_id = %receipt.message_id,
                status = %receipt.message_status,
                "ignoring receipt generated from submit_sm_resp"
            );
            return Ok(ProcessOutcome::Skipped(SkipReason::InternalReceipt));
        }

        if self.store.get(&receipt.message_id).await.is_none() {
            warn!(message_id = %receipt.message_id, "got dlr of an unknown submit_sm: {}", receipt.message_id);
            return Ok(ProcessOutcome::Skipped(SkipReason::UnknownReceipt));
        }

        let input = UpdateStatusInput {
            message_id: receipt.message_id,
            status: normalize_status(&receipt.message_status),
            status_at: Utc::now(),
        };

        self.repository.update_status_on_receipt(input.clone()).await?;

        info!(message_id = %input.message_id, status = %input.status, "delivery status updated");
        Ok(ProcessOutcome::StatusUpdated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CorrelationStoreConfig, InMemoryCorrelationStore, MockCorrelationStore};
    use chrono::TimeZone;
    use common::domain::{
        DataCoding, EventMetadata, MessageSegment, MockSubmitLogRepository, SegmentChain,
    };

    const BILL: &str = r#"{"user":{"uid":"user-7"},"amounts":{"submit_sm":1.5}}"#;

    fn segment(payload: &[u8], coding: Option<DataCoding>) -> MessageSegment {
        MessageSegment {
            payload: payload.to_vec(),
            data_coding: coding,
            destination_addr: "+15550001".to_string(),
            source_addr: None,
        }
    }

    fn billing_metadata(bill: &str) -> EventMetadata {
        let mut metadata = EventMetadata::new();
        metadata.insert("submit_sm_bill".to_string(), bill.to_string());
        metadata
    }

    fn request(message_id: &str, segments: Vec<MessageSegment>) -> InboundEvent {
        InboundEvent::SubmissionRequest(SubmitRequestEvent {
            message_id: message_id.to_string(),
            routing_key: "submit.sm.smsc01".to_string(),
            routed_cid: "smsc01".to_string(),
            source_connector: "http".to_string(),
            metadata: billing_metadata(BILL),
            segments: SegmentChain::new(segments).unwrap(),
        })
    }

    fn ack(message_id: &str, status: &str) -> InboundEvent {
        InboundEvent::SubmissionAck(SubmitAckEvent {
            message_id: message_id.to_string(),
            routing_key: "submit.sm.resp.smsc01".to_string(),
            command_status: status.to_string(),
            created_at: Some(Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()),
            metadata: EventMetadata::new(),
        })
    }

    fn receipt(message_id: &str, status: &str) -> InboundEvent {
        InboundEvent::DeliveryReceipt(DeliveryReceiptEvent {
            message_id: message_id.to_string(),
            routing_key: "dlr_thrower.http".to_string(),
            message_status: status.to_string(),
            metadata: EventMetadata::new(),
        })
    }

    fn in_memory_store() -> Arc<InMemoryCorrelationStore> {
        Arc::new(InMemoryCorrelationStore::new(CorrelationStoreConfig::default()))
    }

    #[tokio::test]
    async fn test_request_ack_receipt_scenario() {
        let store = in_memory_store();
        let mut repository = MockSubmitLogRepository::new();

        repository
            .expect_upsert_on_ack()
            .withf(|record: &LogRecord| {
                record.message_id == "M1"
                    && record.billed_amount == 1.5
                    && record.segment_count == 1
                    && record.trials == 1
                    && record.status == "ESME_ROK"
                    && record.display_text == "Hello"
                    && record.raw_hex == hex::encode("Hello")
                    && record.source_addr.is_empty()
                    && record.routed_cid == "smsc01"
                    && record.source_connector == "http"
                    && record.billed_user_id == "user-7"
                    && record.created_at == record.status_at
            })
            .times(1)
            .returning(|_| Ok(()));

        repository
            .expect_update_status_on_receipt()
            .withf(|input: &UpdateStatusInput| {
                input.message_id == "M1" && input.status == "DELIVERED"
            })
            .times(1)
            .returning(|_| Ok(1));

        let service = CorrelationService::new(store.clone(), Arc::new(repository));

        let stored = service
            .process_event(request("M1", vec![segment(b"HEADERHello", None)]))
            .await
            .unwrap();
        assert_eq!(stored, ProcessOutcome::Stored);

        let pending = store.get("M1").await.unwrap();
        assert_eq!(pending.billed_amount, 1.5);
        assert_eq!(pending.segment_count, 1);

        let persisted = service.process_event(ack("M1", "ESME_ROK")).await.unwrap();
        assert_eq!(persisted, ProcessOutcome::Persisted);

        let updated = service
            .process_event(receipt("M1", "DELIVERED"))
            .await
            .unwrap();
        assert_eq!(updated, ProcessOutcome::StatusUpdated);
    }

    #[tokio::test]
    async fn test_multipart_request_bills_every_segment() {
        let store = in_memory_store();
        let service =
            CorrelationService::new(store.clone(), Arc::new(MockSubmitLogRepository::new()));

        let outcome = service
            .process_event(request(
                "M3",
                vec![segment(b"\x05\x00\x03\x01\x02\x01text", None), segment(b"moretext", None)],
            ))
            .await
            .unwrap();

        assert_eq!(outcome, ProcessOutcome::Stored);
        let pending = store.get("M3").await.unwrap();
        assert_eq!(pending.segment_count, 2);
        assert_eq!(pending.display_text, "textmoretext");
        assert_eq!(pending.billed_amount, 3.0);
    }

    #[tokio::test]
    async fn test_ucs2_request_is_transcoded_with_raw_hex_kept() {
        let store = in_memory_store();
        let service =
            CorrelationService::new(store.clone(), Arc::new(MockSubmitLogRepository::new()));

        let payload = [0x05, 0x00, 0x03, 0x01, 0x01, 0x01, 0x00, 0x41, 0x00, 0x42];
        service
            .process_event(request("M4", vec![segment(&payload, Some(DataCoding::Numeric(8)))]))
            .await
            .unwrap();

        let pending = store.get("M4").await.unwrap();
        assert_eq!(pending.display_text, "AB");
        assert_eq!(pending.raw_hex, "00410042");
    }

    #[tokio::test]
    async fn test_nul_byte_in_text_is_logged_without_nul() {
        let store = in_memory_store();
        let mut repository = MockSubmitLogRepository::new();
        repository
            .expect_upsert_on_ack()
            .withf(|record: &LogRecord| {
                !record.display_text.contains('\0')
                    && record.display_text == "Mail me \u{FFFD} home"
                    && record.raw_hex == hex::encode(b"Mail me \0 home")
            })
            .times(1)
            .returning(|_| Ok(()));

        let service = CorrelationService::new(store, Arc::new(repository));

        let stored = service
            .process_event(request("M9", vec![segment(b"HEADERMail me \0 home", None)]))
            .await
            .unwrap();
        assert_eq!(stored, ProcessOutcome::Stored);

        let persisted = service.process_event(ack("M9", "ESME_ROK")).await.unwrap();
        assert_eq!(persisted, ProcessOutcome::Persisted);
    }

    #[tokio::test]
    async fn test_request_with_malformed_billing_is_skipped() {
        let mut store = MockCorrelationStore::new();
        store.expect_put().times(0);

        let service = CorrelationService::new(Arc::new(store), Arc::new(MockSubmitLogRepository::new()));

        let mut event = request("M5", vec![segment(b"HEADERhi", None)]);
        if let InboundEvent::SubmissionRequest(ref mut req) = event {
            req.metadata = billing_metadata("{broken");
        }

        let outcome = service.process_event(event).await.unwrap();
        assert_eq!(outcome, ProcessOutcome::Skipped(SkipReason::MalformedBillingData));
    }

    #[tokio::test]
    async fn test_unknown_ack_and_receipt_are_skipped() {
        let mut store = MockCorrelationStore::new();
        store
            .expect_get()
            .withf(|message_id: &str| message_id == "M2")
            .times(2)
            .returning(|_| None);
        store.expect_put().times(0);

        let mut repository = MockSubmitLogRepository::new();
        repository.expect_upsert_on_ack().times(0);
        repository.expect_update_status_on_receipt().times(0);

        let service = CorrelationService::new(Arc::new(store), Arc::new(repository));

        assert_eq!(
            service.process_event(ack("M2", "ESME_ROK")).await.unwrap(),
            ProcessOutcome::Skipped(SkipReason::UnknownSubmission)
        );
        assert_eq!(
            service.process_event(receipt("M2", "DELIVRD")).await.unwrap(),
            ProcessOutcome::Skipped(SkipReason::UnknownReceipt)
        );
    }

    #[tokio::test]
    async fn test_internal_receipt_is_skipped_before_lookup() {
        let mut store = MockCorrelationStore::new();
        store.expect_get().times(0);

        let mut repository = MockSubmitLogRepository::new();
        repository.expect_update_status_on_receipt().times(0);

        let service = CorrelationService::new(Arc::new(store), Arc::new(repository));

        let outcome = service
            .process_event(receipt("M1", "ESME_RTHROTTLED"))
            .await
            .unwrap();
        assert_eq!(outcome, ProcessOutcome::Skipped(SkipReason::InternalReceipt));
    }

    #[tokio::test]
    async fn test_unrecognized_route_is_skipped() {
        let service = CorrelationService::new(
            Arc::new(MockCorrelationStore::new()),
            Arc::new(MockSubmitLogRepository::new()),
        );

        let outcome = service
            .process_event(InboundEvent::Unrecognized {
                routing_key: "deliver.sm.smsc01".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(outcome, ProcessOutcome::Skipped(SkipReason::UnrecognizedRoute));
    }

    #[tokio::test]
    async fn test_ack_normalizes_status_and_source_addr() {
        let store = in_memory_store();
        let mut pending_segment = segment(b"HEADERhi", None);
        pending_segment.source_addr = Some("ACME".to_string());

        let mut repository = MockSubmitLogRepository::new();
        repository
            .expect_upsert_on_ack()
            .withf(|record: &LogRecord| {
                record.status == "ESME_RINVDSTADR" && record.source_addr == "ACME"
            })
            .times(1)
            .returning(|_| Ok(()));

        let service = CorrelationService::new(store, Arc::new(repository));
        service
            .process_event(request("M6", vec![pending_segment]))
            .await
            .unwrap();

        let outcome = service
            .process_event(ack("M6", "CommandStatus.ESME_RINVDSTADR"))
            .await
            .unwrap();
        assert_eq!(outcome, ProcessOutcome::Persisted);
    }

    #[tokio::test]
    async fn test_duplicate_ack_upserts_again() {
        let store = in_memory_store();
        let mut repository = MockSubmitLogRepository::new();
        repository
            .expect_upsert_on_ack()
            .withf(|record: &LogRecord| record.message_id == "M7" && record.trials == 1)
            .times(2)
            .returning(|_| Ok(()));

        let service = CorrelationService::new(store, Arc::new(repository));
        service
            .process_event(request("M7", vec![segment(b"HEADERdup", None)]))
            .await
            .unwrap();

        for _ in 0..2 {
            assert_eq!(
                service.process_event(ack("M7", "ESME_ROK")).await.unwrap(),
                ProcessOutcome::Persisted
            );
        }
    }

    #[tokio::test]
    async fn test_persistence_failure_propagates() {
        let store = in_memory_store();
        let mut repository = MockSubmitLogRepository::new();
        repository.expect_upsert_on_ack().times(1).returning(|_| {
            Err(DomainError::PersistenceFailure(anyhow::anyhow!(
                "connection refused"
            )))
        });

        let service = CorrelationService::new(store, Arc::new(repository));
        service
            .process_event(request("M8", vec![segment(b"HEADERx", None)]))
            .await
            .unwrap();

        let err = service
            .process_event(ack("M8", "ESME_ROK"))
            .await
            .unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_receipt_status_update_failure_propagates() {
        let store = in_memory_store();
        let mut repository = MockSubmitLogRepository::new();
        repository
            .expect_update_status_on_receipt()
            .times(1)
            .returning(|_| Err(DomainError::PersistenceFailure(anyhow::anyhow!("timeout"))));

        let service = CorrelationService::new(store, Arc::new(repository));
        service
            .process_event(request("M9", vec![segment(b"HEADERx", None)]))
            .await
            .unwrap();

        let result = service.process_event(receipt("M9", "DELIVRD")).await;
        assert!(matches!(result, Err(DomainError::PersistenceFailure(_))));
    }

    #[test]
    fn test_normalize_status() {
        assert_eq!(normalize_status("CommandStatus.ESME_ROK"), "ESME_ROK");
        assert_eq!(normalize_status("DELIVRD"), "DELIVRD");
    }
}
