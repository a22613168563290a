use async_nats::HeaderMap;
use opentelemetry::{global, propagation::Extractor, Context};
use tracing_opentelemetry::OpenTelemetrySpanExt;

/// W3C Trace Context header names
const TRACEPARENT: &str = "traceparent";
const TRACESTATE: &str = "tracestate";

/// Extractor implementation for NATS HeaderMap
struct NatsHeaderExtractor<'a>(&'a HeaderMap);

impl Extractor for NatsHeaderExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(|v| v.as_str())
    }

    fn keys(&self) -> Vec<&str> {
        vec![TRACEPARENT, TRACESTATE]
    }
}

/// Extract the publisher's trace context from NATS headers.
pub fn extract_trace_context(headers: &HeaderMap) -> Context {
    global::get_text_map_propagator(|propagator| propagator.extract(&NatsHeaderExtractor(headers)))
}

/// Set the parent context from NATS headers on the current span.
pub fn set_parent_from_headers(headers: &HeaderMap) {
    let ctx = extract_trace_context(headers);
    tracing::Span::current().set_parent(ctx);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_handles_empty_headers() {
        let headers = HeaderMap::new();

        // Should not panic with empty headers
        let _ctx = extract_trace_context(&headers);
    }

    #[test]
    fn test_set_parent_handles_empty_headers() {
        let headers = HeaderMap::new();
        set_parent_from_headers(&headers);
    }

    #[test]
    fn test_extractor_reads_traceparent() {
        let mut headers = HeaderMap::new();
        headers.insert(TRACEPARENT, "00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01");
        headers.insert("message-id", "ignored");

        let extractor = NatsHeaderExtractor(&headers);
        let value = extractor.get(TRACEPARENT);
        assert!(value.unwrap().starts_with("00-"));
        assert_eq!(extractor.keys(), vec![TRACEPARENT, TRACESTATE]);
    }
}
