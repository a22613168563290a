use chrono::{DateTime, TimeZone, Utc};
use common::domain::{LogRecord, SubmitLogRepository, UpdateStatusInput};
use common::postgres::{PostgresClient, PostgresSubmitLogRepository};
use goose::MigrationRunner;
use testcontainers::runners::AsyncRunner;
use testcontainers::ContainerAsync;
use testcontainers_modules::postgres::Postgres;

async fn setup_test_db() -> (ContainerAsync<Postgres>, PostgresSubmitLogRepository) {
    let postgres = Postgres::default().start().await.unwrap();
    let host = postgres.get_host().await.unwrap();
    let port = postgres.get_host_port_ipv4(5432).await.unwrap();

    // Run migrations
    let migrations_dir = format!("{}/migrations/postgres", env!("CARGO_MANIFEST_DIR"));
    let dsn = format!(
        "postgres://postgres:postgres@{}:{}/postgres?sslmode=disable",
        host, port
    );
    let goose_path = which::which("goose").expect("goose binary not found");

    let migration_runner = MigrationRunner::new(
        goose_path.to_string_lossy().to_string(),
        migrations_dir,
        "postgres".to_string(),
        dsn,
    );

    migration_runner
        .run_migrations()
        .await
        .expect("Migrations failed");

    let client = PostgresClient::new(
        &host.to_string(),
        port,
        "postgres",
        "postgres",
        "postgres",
        5,
    )
    .expect("Failed to create client");

    (postgres, PostgresSubmitLogRepository::new(client))
}

fn timestamp(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, hour, 0, 0).unwrap()
}

fn record(message_id: &str) -> LogRecord {
    LogRecord {
        message_id: message_id.to_string(),
        source_addr: String::new(),
        billed_amount: 1.5,
        segment_count: 1,
        destination_addr: "+15550001".to_string(),
        display_text: "Hello".to_string(),
        status: "ESME_ROK".to_string(),
        billed_user_id: "user-7".to_string(),
        created_at: timestamp(12),
        raw_hex: hex::encode("Hello"),
        routed_cid: "smsc01".to_string(),
        source_connector: "http".to_string(),
        status_at: timestamp(12),
        trials: 1,
    }
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_upsert_inserts_with_one_trial() {
    let (_container, repo) = setup_test_db().await;

    repo.upsert_on_ack(&record("M1")).await.unwrap();

    let stored = repo.get("M1").await.unwrap().unwrap();
    assert_eq!(stored, record("M1"));
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_duplicate_upsert_only_counts_trials() {
    let (_container, repo) = setup_test_db().await;

    repo.upsert_on_ack(&record("M1")).await.unwrap();

    let mut duplicate = record("M1");
    duplicate.status = "ESME_RTHROTTLED".to_string();
    duplicate.billed_amount = 9.0;
    duplicate.created_at = timestamp(13);
    repo.upsert_on_ack(&duplicate).await.unwrap();

    let stored = repo.get("M1").await.unwrap().unwrap();
    assert_eq!(stored.trials, 2);
    assert_eq!(
        LogRecord {
            trials: 1,
            ..stored
        },
        record("M1")
    );
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_status_update_touches_only_status_columns() {
    let (_container, repo) = setup_test_db().await;

    repo.upsert_on_ack(&record("M1")).await.unwrap();

    let updated = repo
        .update_status_on_receipt(UpdateStatusInput {
            message_id: "M1".to_string(),
            status: "DELIVERED".to_string(),
            status_at: timestamp(14),
        })
        .await
        .unwrap();
    assert_eq!(updated, 1);

    let stored = repo.get("M1").await.unwrap().unwrap();
    assert_eq!(stored.status, "DELIVERED");
    assert_eq!(stored.status_at, timestamp(14));
    assert_eq!(
        LogRecord {
            status: "ESME_ROK".to_string(),
            status_at: timestamp(12),
            ..stored
        },
        record("M1")
    );
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_status_update_without_row_is_noop() {
    let (_container, repo) = setup_test_db().await;

    let updated = repo
        .update_status_on_receipt(UpdateStatusInput {
            message_id: "missing".to_string(),
            status: "DELIVERED".to_string(),
            status_at: timestamp(14),
        })
        .await
        .unwrap();

    assert_eq!(updated, 0);
    assert!(repo.get("missing").await.unwrap().is_none());
}
