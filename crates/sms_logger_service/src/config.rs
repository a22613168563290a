use common::postgres::PostgresConfig;
use common::telemetry::TelemetryConfig;
use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};
use sms_logger::SmsLoggerConfig;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    // NATS configuration
    /// NATS server URL
    #[serde(default = "default_nats_url")]
    pub nats_url: String,

    /// JetStream stream carrying submit_sm, submit_sm_resp and DLR events
    #[serde(default = "default_nats_stream")]
    pub nats_stream: String,

    /// Durable consumer name
    #[serde(default = "default_nats_consumer_name")]
    pub nats_consumer_name: String,

    /// Batch size for consumer
    #[serde(default = "default_nats_batch_size")]
    pub nats_batch_size: usize,

    /// Max wait time for batches in seconds
    #[serde(default = "default_nats_batch_wait_secs")]
    pub nats_batch_wait_secs: u64,

    /// Startup timeout for initialization operations in seconds
    #[serde(default = "default_startup_timeout_secs")]
    pub startup_timeout_secs: u64,

    // PostgreSQL configuration
    /// PostgreSQL host
    #[serde(default = "default_postgres_host")]
    pub postgres_host: String,

    /// PostgreSQL port
    #[serde(default = "default_postgres_port")]
    pub postgres_port: u16,

    /// PostgreSQL database name
    #[serde(default = "default_postgres_database")]
    pub postgres_database: String,

    /// PostgreSQL username
    #[serde(default = "default_postgres_username")]
    pub postgres_username: String,

    /// PostgreSQL password
    #[serde(default = "default_postgres_password")]
    pub postgres_password: String,

    /// Maximum number of pooled connections
    #[serde(default = "default_postgres_max_pool_size")]
    pub postgres_max_pool_size: usize,

    /// Path to PostgreSQL migrations directory
    #[serde(default = "default_postgres_migrations_dir")]
    pub postgres_migrations_dir: String,

    /// Path to goose binary
    #[serde(default = "default_postgres_goose_binary_path")]
    pub postgres_goose_binary_path: String,

    // Correlation store configuration
    /// Maximum number of pending submissions kept in memory
    #[serde(default = "default_correlation_capacity")]
    pub correlation_capacity: usize,

    /// Seconds a pending submission is kept before it is evicted
    #[serde(default = "default_correlation_ttl_secs")]
    pub correlation_ttl_secs: u64,

    /// Seconds between correlation store stats log lines
    #[serde(default = "default_correlation_stats_interval_secs")]
    pub correlation_stats_interval_secs: u64,

    // OpenTelemetry configuration
    /// Export traces and logs over OTLP
    #[serde(default = "default_otel_enabled")]
    pub otel_enabled: bool,

    /// OTLP gRPC endpoint
    #[serde(default = "default_otel_endpoint")]
    pub otel_endpoint: String,

    /// Service name reported to the collector
    #[serde(default = "default_otel_service_name")]
    pub otel_service_name: String,

    /// Seconds granted to cleanup tasks on shutdown
    #[serde(default = "default_closer_timeout_secs")]
    pub closer_timeout_secs: u64,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_nats_url() -> String {
    "nats://localhost:4222".to_string()
}

fn default_nats_stream() -> String {
    "messaging".to_string()
}

fn default_nats_consumer_name() -> String {
    "sms_logger".to_string()
}

fn default_nats_batch_size() -> usize {
    1
}

fn default_nats_batch_wait_secs() -> u64 {
    5
}

fn default_startup_timeout_secs() -> u64 {
    10
}

fn default_postgres_host() -> String {
    PostgresConfig::default().host
}

fn default_postgres_port() -> u16 {
    PostgresConfig::default().port
}

fn default_postgres_database() -> String {
    PostgresConfig::default().database
}

fn default_postgres_username() -> String {
    PostgresConfig::default().username
}

fn default_postgres_password() -> String {
    PostgresConfig::default().password
}

fn default_postgres_max_pool_size() -> usize {
    PostgresConfig::default().max_pool_size
}

fn default_postgres_migrations_dir() -> String {
    PostgresConfig::default().migrations_dir
}

fn default_postgres_goose_binary_path() -> String {
    PostgresConfig::default().goose_binary_path
}

fn default_correlation_capacity() -> usize {
    100_000
}

fn default_correlation_ttl_secs() -> u64 {
    24 * 60 * 60
}

fn default_correlation_stats_interval_secs() -> u64 {
    60
}

fn default_otel_enabled() -> bool {
    false
}

fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_otel_service_name() -> String {
    "sms-logger".to_string()
}

fn default_closer_timeout_secs() -> u64 {
    10
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Environment::with_prefix("SMS_LOGGER"))
            .build()?
            .try_deserialize()
    }

    pub fn postgres_config(&self) -> PostgresConfig {
        PostgresConfig {
            host: self.postgres_host.clone(),
            port: self.postgres_port,
            database: self.postgres_database.clone(),
            username: self.postgres_username.clone(),
            password: self.postgres_password.clone(),
            max_pool_size: self.postgres_max_pool_size,
            migrations_dir: self.postgres_migrations_dir.clone(),
            goose_binary_path: self.postgres_goose_binary_path.clone(),
        }
    }

    pub fn telemetry_config(&self) -> TelemetryConfig {
        let config = TelemetryConfig::new(&self.otel_service_name, &self.log_level);
        if self.otel_enabled {
            config.with_otlp_endpoint(&self.otel_endpoint)
        } else {
            config
        }
    }

    pub fn sms_logger_config(&self) -> SmsLoggerConfig {
        SmsLoggerConfig {
            stream_name: self.nats_stream.clone(),
            consumer_name: self.nats_consumer_name.clone(),
            nats_batch_size: self.nats_batch_size,
            nats_batch_wait_secs: self.nats_batch_wait_secs,
            correlation_capacity: self.correlation_capacity,
            correlation_ttl_secs: self.correlation_ttl_secs,
            stats_interval_secs: self.correlation_stats_interval_secs,
        }
    }
}
