use crate::domain::{CorrelationService, ProcessOutcome, SkipReason};
use crate::nats::decode_event;
use common::nats::{ConsumeRequest, ConsumeResponse};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::Service;
use tracing::{debug, error, warn};

/// Tower service feeding consumed messaging-stream events into the correlation engine.
///
/// This service:
/// 1. Classifies the subject and decodes headers and payload into an `InboundEvent`
/// 2. Processes the event through the `CorrelationService`
/// 3. Returns Ack, Skip, or an error for failed durable writes
///
/// Only an error leaves the message unacknowledged.
#[derive(Clone)]
pub struct SmsLogConsumerService {
    correlation_service: Arc<CorrelationService>,
}

impl SmsLogConsumerService {
    pub fn new(correlation_service: Arc<CorrelationService>) -> Self {
        Self {
            correlation_service,
        }
    }
}

impl Service<ConsumeRequest> for SmsLogConsumerService {
    type Response = ConsumeResponse;
    type Error = anyhow::Error;
    type Future = BoxFuture<'static, Result<ConsumeResponse, anyhow::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: ConsumeRequest) -> Self::Future {
        let correlation_service = Arc::clone(&self.correlation_service);

        Box::pin(async move {
            let event = match decode_event(&req) {
                Ok(event) => event,
                Err(e) => {
                    error!(
                        subject = %req.subject,
                        error = %e,
                        "failed to decode event"
                    );
                    return Ok(ConsumeResponse::skip(SkipReason::MalformedEvent.to_string()));
                }
            };

            match correlation_service.process_event(event).await {
                Ok(ProcessOutcome::Skipped(reason)) => Ok(ConsumeResponse::skip(reason.to_string())),
                Ok(outcome) => {
                    debug!(subject = %req.subject, outcome = ?outcome, "event processed");
                    Ok(ConsumeResponse::ack())
                }
                Err(e) if e.is_fatal() => Err(anyhow::Error::new(e)),
                Err(e) => {
                    warn!(subject = %req.subject, error = %e, "dropping event");
                    Ok(ConsumeResponse::skip(e.to_string()))
                }
            }
        })
    }
}
