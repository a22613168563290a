use crate::domain::{
    classify, routed_cid, RouteKind, REQUEST_BILL_HEADER, RESPONSE_BILL_HEADER,
};
use crate::nats::{Segment, SubmitSm, SubmitSmResp};
use chrono::{DateTime, NaiveDateTime, Utc};
use common::domain::{
    DataCoding, DeliveryReceiptEvent, DomainError, DomainResult, EventMetadata, InboundEvent,
    MessageSegment, SegmentChain, SubmitAckEvent, SubmitRequestEvent,
};
use common::nats::ConsumeRequest;
use prost::Message as ProstMessage;
use tracing::warn;

pub const MESSAGE_ID_HEADER: &str = "message-id";
pub const SOURCE_CONNECTOR_HEADER: &str = "source_connector";
pub const CREATED_AT_HEADER: &str = "created_at";
pub const MESSAGE_STATUS_HEADER: &str = "message_status";

/// Headers carried into the event metadata
const METADATA_HEADERS: [&str; 6] = [
    MESSAGE_ID_HEADER,
    SOURCE_CONNECTOR_HEADER,
    CREATED_AT_HEADER,
    MESSAGE_STATUS_HEADER,
    RESPONSE_BILL_HEADER,
    REQUEST_BILL_HEADER,
];

/// Fallback layout for `created_at` values without an offset, read as UTC
const NAIVE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Classify a consumed message and decode it into its event variant.
///
/// Unrecognized routes decode to `InboundEvent::Unrecognized` without looking
/// at the payload. Anything else that cannot be decoded is a `MalformedEvent`.
pub fn decode_event(req: &ConsumeRequest) -> DomainResult<InboundEvent> {
    let routing_key = req.subject.clone();
    let kind = classify(&routing_key);

    if kind == RouteKind::Unrecognized {
        return Ok(InboundEvent::Unrecognized { routing_key });
    }

    let metadata = extract_metadata(req);
    let message_id = required_header(&metadata, MESSAGE_ID_HEADER)?;

    let event = match kind {
        RouteKind::SubmissionRequest => {
            let pdu = SubmitSm::decode(&req.payload[..]).map_err(|e| {
                DomainError::MalformedEvent(format!("invalid submit_sm payload: {e}"))
            })?;
            let segments = SegmentChain::new(
                pdu.segments.into_iter().map(MessageSegment::from).collect(),
            )
            .ok_or_else(|| DomainError::MalformedEvent("submit_sm without segments".to_string()))?;

            InboundEvent::SubmissionRequest(SubmitRequestEvent {
                message_id,
                routed_cid: routed_cid(&routing_key).to_string(),
                source_connector: required_header(&metadata, SOURCE_CONNECTOR_HEADER)?,
                routing_key,
                metadata,
                segments,
            })
        }
        RouteKind::SubmissionAck => {
            let pdu = SubmitSmResp::decode(&req.payload[..]).map_err(|e| {
                DomainError::MalformedEvent(format!("invalid submit_sm_resp payload: {e}"))
            })?;

            InboundEvent::SubmissionAck(SubmitAckEvent {
                message_id,
                routing_key,
                command_status: pdu.command_status,
                created_at: metadata.get(CREATED_AT_HEADER).and_then(|v| parse_timestamp(v)),
                metadata,
            })
        }
        RouteKind::DeliveryReceipt => InboundEvent::DeliveryReceipt(DeliveryReceiptEvent {
            message_id,
            message_status: required_header(&metadata, MESSAGE_STATUS_HEADER)?,
            routing_key,
            metadata,
        }),
        RouteKind::Unrecognized => InboundEvent::Unrecognized { routing_key },
    };

    Ok(event)
}

fn extract_metadata(req: &ConsumeRequest) -> EventMetadata {
    METADATA_HEADERS
        .iter()
        .filter_map(|name| req.header(name).map(|value| (name.to_string(), value.to_string())))
        .collect()
}

fn required_header(metadata: &EventMetadata, name: &str) -> DomainResult<String> {
    metadata
        .get(name)
        .filter(|value| !value.is_empty())
        .cloned()
        .ok_or_else(|| DomainError::MalformedEvent(format!("missing {name} header")))
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }

    match NaiveDateTime::parse_from_str(value, NAIVE_TIMESTAMP_FORMAT) {
        Ok(naive) => Some(naive.and_utc()),
        Err(e) => {
            warn!(value = %value, error = %e, "ignoring unparsable created_at header");
            None
        }
    }
}

impl From<Segment> for MessageSegment {
    fn from(segment: Segment) -> Self {
        // the symbolic scheme is the more specific of the two hints
        let data_coding = match (segment.data_coding_scheme, segment.data_coding) {
            (Some(scheme), _) if !scheme.is_empty() => Some(DataCoding::Scheme(scheme)),
            (_, Some(value)) => Some(DataCoding::Numeric(value)),
            _ => None,
        };

        MessageSegment {
            payload: segment.short_message,
            data_coding,
            destination_addr: segment.destination_addr,
            source_addr: segment.source_addr,
        }
    }
}
