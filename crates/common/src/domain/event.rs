use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Numeric data_coding value for UCS2 (UTF-16BE) payloads
pub const UCS2_DATA_CODING: u32 = 8;

/// Symbolic scheme name for UCS2 payloads
pub const UCS2_SCHEME_NAME: &str = "UCS2";

/// Event metadata (broker message headers), keys are case-sensitive
pub type EventMetadata = BTreeMap<String, String>;

/// Coding identifier of a message segment, either the raw numeric
/// data_coding value or a symbolic scheme name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataCoding {
    Numeric(u32),
    Scheme(String),
}

impl DataCoding {
    /// True when the payload is big-endian 16-bit text
    pub fn is_ucs2(&self) -> bool {
        match self {
            DataCoding::Numeric(value) => *value == UCS2_DATA_CODING,
            DataCoding::Scheme(name) => name == UCS2_SCHEME_NAME,
        }
    }
}

/// One physical unit of a possibly multi-part text message
#[derive(Debug, Clone, PartialEq)]
pub struct MessageSegment {
    pub payload: Vec<u8>,
    pub data_coding: Option<DataCoding>,
    pub destination_addr: String,
    pub source_addr: Option<String>,
}

/// Ordered chain of segments making up one logical message.
///
/// Always holds at least one segment; the first one carries the
/// multipart header.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentChain {
    segments: Vec<MessageSegment>,
}

impl SegmentChain {
    /// Returns `None` for an empty segment list
    pub fn new(segments: Vec<MessageSegment>) -> Option<Self> {
        if segments.is_empty() {
            None
        } else {
            Some(Self { segments })
        }
    }

    pub fn single(segment: MessageSegment) -> Self {
        Self {
            segments: vec![segment],
        }
    }

    pub fn first(&self) -> &MessageSegment {
        &self.segments[0]
    }

    pub fn last(&self) -> &MessageSegment {
        &self.segments[self.segments.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn iter(&self) -> impl Iterator<Item = &MessageSegment> {
        self.segments.iter()
    }
}

/// Outbound submission request (submit_sm)
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitRequestEvent {
    pub message_id: String,
    pub routing_key: String,
    /// Connector the message was routed to, taken from the routing key
    pub routed_cid: String,
    pub source_connector: String,
    pub metadata: EventMetadata,
    pub segments: SegmentChain,
}

/// Submission acknowledgement (submit_sm_resp)
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitAckEvent {
    pub message_id: String,
    pub routing_key: String,
    /// Terminal status code reported by the SMSC, e.g. `ESME_ROK`
    pub command_status: String,
    pub created_at: Option<DateTime<Utc>>,
    pub metadata: EventMetadata,
}

/// Delivery receipt thrown by the gateway
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryReceiptEvent {
    pub message_id: String,
    pub routing_key: String,
    pub message_status: String,
    pub metadata: EventMetadata,
}

/// Inbound broker event, decoded once at classification time
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    SubmissionRequest(SubmitRequestEvent),
    SubmissionAck(SubmitAckEvent),
    DeliveryReceipt(DeliveryReceiptEvent),
    Unrecognized { routing_key: String },
}

impl InboundEvent {
    pub fn message_id(&self) -> Option<&str> {
        match self {
            InboundEvent::SubmissionRequest(event) => Some(&event.message_id),
            InboundEvent::SubmissionAck(event) => Some(&event.message_id),
            InboundEvent::DeliveryReceipt(event) => Some(&event.message_id),
            InboundEvent::Unrecognized { .. } => None,
        }
    }

    pub fn routing_key(&self) -> &str {
        match self {
            InboundEvent::SubmissionRequest(event) => &event.routing_key,
            InboundEvent::SubmissionAck(event) => &event.routing_key,
            InboundEvent::DeliveryReceipt(event) => &event.routing_key,
            InboundEvent::Unrecognized { routing_key } => routing_key,
        }
    }
}
