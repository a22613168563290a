mod config;

use common::nats::NatsClient;
use common::postgres::{PostgresClient, PostgresSubmitLogRepository};
use common::telemetry::{init_telemetry, shutdown_telemetry, TelemetryProviders};
use config::ServiceConfig;
use goose::MigrationRunner;
use ponix_runner::Runner;
use sms_logger::{subscription_subjects, SmsLogger};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

#[tokio::main]
async fn main() {
    // Initialize configuration and tracing
    let config = match ServiceConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize telemetry (JSON logs, optionally OpenTelemetry traces and logs)
    let telemetry_providers: Option<TelemetryProviders> =
        match init_telemetry(&config.telemetry_config()) {
            Ok(providers) => providers,
            Err(e) => {
                eprintln!("Failed to initialize telemetry: {}", e);
                std::process::exit(1);
            }
        };

    info!(
        otel_enabled = config.otel_enabled,
        stream = %config.nats_stream,
        consumer = %config.nats_consumer_name,
        "Starting sms-logger service"
    );
    debug!(
        nats_url = %config.nats_url,
        postgres_host = %config.postgres_host,
        postgres_database = %config.postgres_database,
        "Configuration loaded"
    );

    let (repository, nats_client) = match initialize_dependencies(&config).await {
        Ok(deps) => deps,
        Err(e) => {
            error!("Failed to initialize dependencies: {:#}", e);
            shutdown_telemetry(telemetry_providers);
            std::process::exit(1);
        }
    };

    let sms_logger = match SmsLogger::new(
        nats_client.create_consumer_client(),
        repository,
        config.sms_logger_config(),
    )
    .await
    {
        Ok(worker) => worker,
        Err(e) => {
            error!("Failed to initialize SMS logger: {:#}", e);
            shutdown_telemetry(telemetry_providers);
            std::process::exit(1);
        }
    };

    let runner = Runner::new()
        .with_named_process("sms_logger", move |ctx| async move { sms_logger.run(ctx).await })
        .with_closer({
            let nats_for_close = Arc::clone(&nats_client);
            move || {
                Box::pin(async move {
                    info!("Running cleanup tasks...");
                    // the consumer has stopped, so this is the last reference
                    if let Ok(client) = Arc::try_unwrap(nats_for_close) {
                        client.close().await;
                    }

                    // Shutdown telemetry and flush pending traces and logs
                    shutdown_telemetry(telemetry_providers);

                    info!("Cleanup complete");
                    Ok(())
                })
            }
        })
        .with_closer_timeout(Duration::from_secs(config.closer_timeout_secs));

    drop(nats_client);

    // Run the service
    runner.run().await;
}

async fn initialize_dependencies(
    config: &ServiceConfig,
) -> anyhow::Result<(Arc<PostgresSubmitLogRepository>, Arc<NatsClient>)> {
    // PostgreSQL initialization
    info!("Initializing PostgreSQL...");
    let postgres_config = config.postgres_config();
    MigrationRunner::new(
        postgres_config.goose_binary_path.clone(),
        postgres_config.migrations_dir.clone(),
        "postgres".to_string(),
        postgres_config.dsn(),
    )
    .run_migrations()
    .await?;

    let postgres_client = PostgresClient::from_config(&postgres_config)?;
    tokio::time::timeout(
        Duration::from_secs(config.startup_timeout_secs),
        postgres_client.ping(),
    )
    .await
    .map_err(|_| anyhow::anyhow!("timed out waiting for PostgreSQL"))??;
    let repository = Arc::new(PostgresSubmitLogRepository::new(postgres_client));

    // NATS initialization
    info!("Initializing NATS...");
    let nats_client = Arc::new(
        NatsClient::connect(
            &config.nats_url,
            Duration::from_secs(config.startup_timeout_secs),
        )
        .await?,
    );
    nats_client
        .ensure_stream(&config.nats_stream, &subscription_subjects())
        .await?;

    Ok((repository, nats_client))
}
