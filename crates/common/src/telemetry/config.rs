use opentelemetry_sdk::{logs::LoggerProvider, trace::TracerProvider as SdkTracerProvider};

/// Logging and trace export settings for one service process
#[derive(Clone, Debug)]
pub struct TelemetryConfig {
    /// Reported as the OTLP `service.name` resource attribute
    pub service_name: String,
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub log_level: String,
    /// OTLP gRPC collector; `None` keeps output to stdout JSON only
    pub otlp_endpoint: Option<String>,
}

impl TelemetryConfig {
    pub fn new(service_name: impl Into<String>, log_level: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            log_level: log_level.into(),
            otlp_endpoint: None,
        }
    }

    /// Export spans and log records to the collector at `endpoint`
    pub fn with_otlp_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.otlp_endpoint = Some(endpoint.into());
        self
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self::new("sms-logger", "info")
    }
}

/// Exporter providers kept alive for the life of the process
pub struct TelemetryProviders {
    pub tracer_provider: SdkTracerProvider,
    pub logger_provider: LoggerProvider,
}

impl TelemetryProviders {
    /// Flush buffered spans and log records, then stop both exporters
    pub fn shutdown(self) {
        if let Err(e) = self.tracer_provider.shutdown() {
            eprintln!("Error shutting down tracer provider: {:?}", e);
        }
        if let Err(e) = self.logger_provider.shutdown() {
            eprintln!("Error shutting down logger provider: {:?}", e);
        }
    }
}
