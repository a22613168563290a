use crate::nats::{ConsumeRequest, ConsumeResponse, ConsumedMessage, JetStreamConsumer, PullConsumer};
use anyhow::{Context, Result};
use async_nats::jetstream;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tower::Service;
use tracing::{debug, error, info, warn};

/// Pause before retrying after a failed fetch
const FETCH_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Subscription settings for a durable pull consumer
#[derive(Debug, Clone)]
pub struct ConsumerSettings {
    pub stream_name: String,
    pub consumer_name: String,
    pub filter_subjects: Vec<String>,
    pub batch_size: usize,
    pub max_wait: Duration,
}

#[derive(Debug, Error)]
enum BatchError {
    /// Transient broker failure; the loop retries
    #[error("fetch failed: {0:#}")]
    Fetch(anyhow::Error),

    /// The service could not finish a message; the message stays unacknowledged
    #[error("processing {subject} failed: {source:#}")]
    Processing {
        subject: String,
        source: anyhow::Error,
    },
}

/// A NATS consumer that processes messages one at a time through a Tower service stack.
///
/// Each message is converted to an owned `ConsumeRequest` and fully processed
/// (including any durable write done by the service) before the next one is
/// handed to the service. Both `Ack` and `Skip` responses acknowledge the
/// message. A service error stops the consumer without acknowledging the
/// failing message, so the broker redelivers it to the next consumer instance.
pub struct TowerConsumer<S> {
    consumer: Box<dyn PullConsumer>,
    settings: ConsumerSettings,
    service: S,
}

impl<S> TowerConsumer<S>
where
    S: Service<ConsumeRequest, Response = ConsumeResponse, Error = anyhow::Error>
        + Clone
        + Send
        + 'static,
    S::Future: Send + 'static,
{
    /// Create the durable consumer and bind the service to it
    pub async fn new(
        jetstream: Arc<dyn JetStreamConsumer>,
        settings: ConsumerSettings,
        service: S,
    ) -> Result<Self> {
        debug!(
            stream = %settings.stream_name,
            consumer = %settings.consumer_name,
            filter_subjects = ?settings.filter_subjects,
            "creating tower nats consumer"
        );

        let config = jetstream::consumer::pull::Config {
            name: Some(settings.consumer_name.clone()),
            durable_name: Some(settings.consumer_name.clone()),
            filter_subjects: settings.filter_subjects.clone(),
            ack_policy: jetstream::consumer::AckPolicy::Explicit,
            ..Default::default()
        };

        let consumer = jetstream
            .create_consumer(config, &settings.stream_name)
            .await
            .context("failed to create consumer")?;

        debug!(
            stream = %settings.stream_name,
            consumer = %settings.consumer_name,
            "tower nats consumer created successfully"
        );

        Ok(Self {
            consumer,
            settings,
            service,
        })
    }

    /// Run the consumer loop until cancellation or a processing failure.
    ///
    /// Cancellation interrupts a pending fetch only. A message already handed
    /// to the service is processed and acknowledged before the loop stops, and
    /// the rest of its batch is left unacknowledged for redelivery.
    pub async fn run(mut self, ctx: CancellationToken) -> Result<()> {
        info!(
            stream = %self.settings.stream_name,
            consumer = %self.settings.consumer_name,
            "starting tower nats consumer"
        );

        loop {
            let fetched = tokio::select! {
                biased;

                _ = ctx.cancelled() => None,
                result = self.fetch_batch() => Some(result),
            };

            let Some(fetched) = fetched else {
                info!(
                    stream = %self.settings.stream_name,
                    consumer = %self.settings.consumer_name,
                    "received shutdown signal, stopping consumer"
                );
                break;
            };

            let result = match fetched {
                Ok(messages) => self.process_batch(&messages, &ctx).await,
                Err(e) => Err(e),
            };

            match result {
                Ok(()) => {}
                Err(BatchError::Fetch(e)) => {
                    error!(
                        stream = %self.settings.stream_name,
                        consumer = %self.settings.consumer_name,
                        error = %e,
                        "error fetching batch"
                    );
                    tokio::time::sleep(FETCH_RETRY_DELAY).await;
                }
                Err(err @ BatchError::Processing { .. }) => {
                    error!(
                        stream = %self.settings.stream_name,
                        consumer = %self.settings.consumer_name,
                        error = %err,
                        "stopping consumer, message left unacknowledged for redelivery"
                    );
                    return Err(anyhow::Error::new(err));
                }
            }
        }

        debug!(
            stream = %self.settings.stream_name,
            consumer = %self.settings.consumer_name,
            "consumer stopped gracefully"
        );
        Ok(())
    }

    async fn fetch_batch(&mut self) -> Result<Vec<Box<dyn ConsumedMessage>>, BatchError> {
        self.consumer
            .fetch_messages(self.settings.batch_size, self.settings.max_wait)
            .await
            .map_err(BatchError::Fetch)
    }

    async fn process_batch(
        &mut self,
        messages: &[Box<dyn ConsumedMessage>],
        ctx: &CancellationToken,
    ) -> Result<(), BatchError> {
        if messages.is_empty() {
            debug!("no messages in batch");
            return Ok(());
        }

        debug!(message_count = messages.len(), "received message batch");

        for (processed, msg) in messages.iter().enumerate() {
            if ctx.is_cancelled() {
                debug!(
                    left_unacked = messages.len() - processed,
                    "shutdown requested, leaving rest of batch for redelivery"
                );
                break;
            }
            self.process_message(msg.as_ref()).await?;
        }

        Ok(())
    }

    async fn process_message(&mut self, msg: &dyn ConsumedMessage) -> Result<(), BatchError> {
        let subject = msg.subject();
        let request = ConsumeRequest::new(subject.clone(), msg.payload(), msg.headers());

        let response = self
            .service
            .call(request)
            .await
            .map_err(|source| BatchError::Processing {
                subject: subject.clone(),
                source,
            })?;

        if let ConsumeResponse::Skip(reason) = &response {
            debug!(subject = %subject, reason = %reason, "acknowledging skipped message");
        }

        if let Err(e) = msg.ack().await {
            warn!(
                subject = %subject,
                error = %e,
                "failed to acknowledge message"
            );
        }

        Ok(())
    }
}
