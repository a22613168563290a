/// Routing-key prefix of submission requests (`submit.sm.<cid>`)
pub const SUBMIT_SM_PREFIX: &str = "submit.sm.";

/// Routing-key prefix of submission acknowledgements (`submit.sm.resp.<cid>`)
pub const SUBMIT_SM_RESP_PREFIX: &str = "submit.sm.resp.";

/// Routing-key prefix of delivery receipts (`dlr_thrower.<type>`)
pub const DLR_THROWER_PREFIX: &str = "dlr_thrower.";

/// Subjects the consumer subscribes to
pub fn subscription_subjects() -> Vec<String> {
    [SUBMIT_SM_PREFIX, SUBMIT_SM_RESP_PREFIX, DLR_THROWER_PREFIX]
        .iter()
        .map(|prefix| format!("{prefix}*"))
        .collect()
}

/// Handling path selected for an inbound event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    SubmissionRequest,
    SubmissionAck,
    DeliveryReceipt,
    Unrecognized,
}

/// Classify an event by its routing key.
///
/// `submit.sm.resp.` is itself prefixed by `submit.sm.`, so the longer
/// acknowledgement prefix is excluded from the submission-request rule.
pub fn classify(routing_key: &str) -> RouteKind {
    if routing_key.starts_with(SUBMIT_SM_PREFIX) && !routing_key.starts_with(SUBMIT_SM_RESP_PREFIX)
    {
        RouteKind::SubmissionRequest
    } else if routing_key.starts_with(SUBMIT_SM_RESP_PREFIX) {
        RouteKind::SubmissionAck
    } else if routing_key.starts_with(DLR_THROWER_PREFIX) {
        RouteKind::DeliveryReceipt
    } else {
        RouteKind::Unrecognized
    }
}

/// Connector id a submission was routed to: the routing key minus its prefix
pub fn routed_cid(routing_key: &str) -> &str {
    routing_key.strip_prefix(SUBMIT_SM_PREFIX).unwrap_or("")
}
