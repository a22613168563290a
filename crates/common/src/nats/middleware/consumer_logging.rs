use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use crate::nats::{ConsumeRequest, ConsumeResponse};
use tower::{Layer, Service};
use tracing::{debug, error, info, Instrument, Span};

/// Tower layer emitting one log line per consumed NATS message.
///
/// Skips are logged at debug level; the service that decided to skip
/// reports the reason itself.
#[derive(Clone, Default)]
pub struct NatsConsumeLoggingLayer;

impl NatsConsumeLoggingLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for NatsConsumeLoggingLayer {
    type Service = NatsConsumeLoggingService<S>;

    fn layer(&self, service: S) -> Self::Service {
        NatsConsumeLoggingService { inner: service }
    }
}

/// Service that logs single message consumption
#[derive(Clone)]
pub struct NatsConsumeLoggingService<S> {
    inner: S,
}

impl<S> Service<ConsumeRequest> for NatsConsumeLoggingService<S>
where
    S: Service<ConsumeRequest, Response = ConsumeResponse> + Clone + Send + 'static,
    S::Error: std::fmt::Display + Send,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: ConsumeRequest) -> Self::Future {
        let subject = req.subject.clone();
        let payload_size = req.payload.len();
        let start = Instant::now();
        let mut inner = self.inner.clone();

        let span = Span::current();

        Box::pin(
            async move {
                let result = inner.call(req).await;
                let duration_ms = start.elapsed().as_millis();

                match &result {
                    Ok(ConsumeResponse::Ack) => {
                        info!(
                            subject = %subject,
                            payload_bytes = payload_size,
                            outcome = "ack",
                            duration_ms = %duration_ms,
                            "consumed from {subject} in {duration_ms}ms [ack]"
                        );
                    }
                    Ok(ConsumeResponse::Skip(reason)) => {
                        debug!(
                            subject = %subject,
                            payload_bytes = payload_size,
                            outcome = "skip",
                            reason = %reason,
                            duration_ms = %duration_ms,
                            "consumed from {subject} in {duration_ms}ms [skip: {reason}]"
                        );
                    }
                    Err(e) => {
                        error!(
                            subject = %subject,
                            payload_bytes = payload_size,
                            duration_ms = %duration_ms,
                            error = %e,
                            "failed to consume from {subject} in {duration_ms}ms: {e}"
                        );
                    }
                }

                result
            }
            .instrument(span),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::sync::{Arc, Mutex};
    use tower::{service_fn, ServiceExt};
    use tracing::{Event, Level, Subscriber};
    use tracing_subscriber::layer::{Context as LayerContext, SubscriberExt};

    /// Records the level of every event emitted while installed
    #[derive(Clone, Default)]
    struct LevelCapture(Arc<Mutex<Vec<Level>>>);

    impl<S: Subscriber> tracing_subscriber::Layer<S> for LevelCapture {
        fn on_event(&self, event: &Event<'_>, _ctx: LayerContext<'_, S>) {
            self.0.lock().unwrap().push(*event.metadata().level());
        }
    }

    async fn levels_for(response: ConsumeResponse) -> Vec<Level> {
        let capture = LevelCapture::default();
        let _guard = tracing::subscriber::set_default(
            tracing_subscriber::registry().with(capture.clone()),
        );

        let inner = service_fn(move |_req: ConsumeRequest| {
            let response = response.clone();
            async move { Ok::<_, anyhow::Error>(response) }
        });
        let service = NatsConsumeLoggingLayer::new().layer(inner);
        let req = ConsumeRequest::new("dlr_thrower.http".to_string(), Bytes::new(), None);
        service.oneshot(req).await.unwrap();

        let levels = capture.0.lock().unwrap().clone();
        levels
    }

    #[tokio::test]
    async fn test_ack_is_logged_at_info() {
        assert_eq!(levels_for(ConsumeResponse::Ack).await, vec![Level::INFO]);
    }

    #[tokio::test]
    async fn test_skip_is_logged_at_debug_only() {
        let levels = levels_for(ConsumeResponse::skip("unknown receipt")).await;
        assert_eq!(levels, vec![Level::DEBUG]);
    }

    #[tokio::test]
    async fn test_logging_layer_passes_response_through() {
        let inner = service_fn(|_req: ConsumeRequest| async {
            Ok::<_, anyhow::Error>(ConsumeResponse::skip("unknown route"))
        });
        let service = NatsConsumeLoggingLayer::new().layer(inner);

        let req = ConsumeRequest::new("deliver.sm.x".to_string(), Bytes::from_static(b"x"), None);
        let resp = service.oneshot(req).await.unwrap();

        assert_eq!(resp, ConsumeResponse::Skip("unknown route".to_string()));
    }

    #[tokio::test]
    async fn test_logging_layer_passes_error_through() {
        let inner = service_fn(|_req: ConsumeRequest| async {
            Err::<ConsumeResponse, _>(anyhow::anyhow!("database unavailable"))
        });
        let service = NatsConsumeLoggingLayer::new().layer(inner);

        let req = ConsumeRequest::new("submit.sm.resp.c1".to_string(), Bytes::new(), None);
        let err = service.oneshot(req).await.unwrap_err();

        assert!(err.to_string().contains("database unavailable"));
    }
}
