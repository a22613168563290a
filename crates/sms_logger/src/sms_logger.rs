use crate::domain::{
    subscription_subjects, CorrelationService, CorrelationStore, CorrelationStoreConfig,
    InMemoryCorrelationStore,
};
use crate::nats::SmsLogConsumerService;
use anyhow::Result;
use common::domain::SubmitLogRepository;
use common::nats::{
    ConsumerSettings, JetStreamConsumer, NatsConsumeLoggingLayer, NatsConsumeLoggingService,
    NatsConsumeTracingLayer, NatsConsumeTracingService, TowerConsumer,
};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tracing::{debug, info};

/// Type alias for the layered submit log consumer service
type SmsLogLayeredService =
    NatsConsumeTracingService<NatsConsumeLoggingService<SmsLogConsumerService>>;

pub struct SmsLoggerConfig {
    pub stream_name: String,
    pub consumer_name: String,
    pub nats_batch_size: usize,
    pub nats_batch_wait_secs: u64,
    pub correlation_capacity: usize,
    pub correlation_ttl_secs: u64,
    /// How often correlation store size and evictions are logged
    pub stats_interval_secs: u64,
}

impl Default for SmsLoggerConfig {
    fn default() -> Self {
        Self {
            stream_name: "messaging".to_string(),
            consumer_name: "sms_logger".to_string(),
            nats_batch_size: 1,
            nats_batch_wait_secs: 5,
            correlation_capacity: 100_000,
            correlation_ttl_secs: 24 * 60 * 60,
            stats_interval_secs: 60,
        }
    }
}

/// Delivery-log worker: one durable consumer over the three messaging
/// subjects, feeding the correlation engine one event at a time.
pub struct SmsLogger {
    consumer: TowerConsumer<SmsLogLayeredService>,
    store: Arc<InMemoryCorrelationStore>,
    stats_interval: Duration,
}

impl SmsLogger {
    pub async fn new(
        jetstream: Arc<dyn JetStreamConsumer>,
        repository: Arc<dyn SubmitLogRepository>,
        config: SmsLoggerConfig,
    ) -> Result<Self> {
        info!("Initializing SMS logger module");

        let capacity = NonZeroUsize::new(config.correlation_capacity)
            .ok_or_else(|| anyhow::anyhow!("correlation capacity must be greater than zero"))?;
        let store = Arc::new(InMemoryCorrelationStore::new(CorrelationStoreConfig {
            capacity,
            ttl: Duration::from_secs(config.correlation_ttl_secs),
        }));

        let correlation_service = Arc::new(CorrelationService::new(store.clone(), repository));

        // Build the Tower service with middleware layers
        let layered_service = ServiceBuilder::new()
            .layer(NatsConsumeTracingLayer::new(config.consumer_name.clone()))
            .layer(NatsConsumeLoggingLayer::new())
            .service(SmsLogConsumerService::new(correlation_service));

        let settings = ConsumerSettings {
            stream_name: config.stream_name,
            consumer_name: config.consumer_name,
            filter_subjects: subscription_subjects(),
            batch_size: config.nats_batch_size,
            max_wait: Duration::from_secs(config.nats_batch_wait_secs),
        };

        let consumer = TowerConsumer::new(jetstream, settings, layered_service).await?;

        info!("SMS logger initialized");

        Ok(Self {
            consumer,
            store,
            stats_interval: Duration::from_secs(config.stats_interval_secs.max(1)),
        })
    }

    /// Run the consumer until cancellation or a fatal processing error
    pub async fn run(self, ctx: CancellationToken) -> Result<()> {
        debug!("starting SMS logger");

        tokio::select! {
            result = self.consumer.run(ctx) => result,
            _ = report_store_stats(self.store, self.stats_interval) => Ok(()),
        }
    }
}

async fn report_store_stats(store: Arc<InMemoryCorrelationStore>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    // the first tick completes immediately
    interval.tick().await;

    loop {
        interval.tick().await;
        let pending_submissions = store.len().await;
        info!(
            pending_submissions = pending_submissions,
            evictions = store.evictions(),
            "correlation store stats"
        );
    }
}
