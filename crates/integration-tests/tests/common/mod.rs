// Shared setup for live-database tests

use pgmq_kit_core::{ClientConfig, QueueClient, RetryPolicy};
use pgmq_kit_infra_postgres::{create_pool, run_setup, PgQueueStore};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;

pub const DATABASE_URL_VAR: &str = "PGMQ_TEST_DATABASE_URL";

// Concurrent CREATE EXTENSION calls race on the catalog; install once per binary
#[allow(dead_code)]
static EXTENSION: OnceCell<()> = OnceCell::const_new();

/// Connected client, or None (test skipped) when no database is configured
#[allow(dead_code)]
pub async fn client() -> Option<QueueClient> {
    let pool = pool().await?;
    EXTENSION
        .get_or_init(|| async {
            run_setup(&pool, &RetryPolicy::fixed(3, Duration::from_secs(1)))
                .await
                .unwrap();
        })
        .await;

    Some(QueueClient::new(Arc::new(PgQueueStore::new(pool))))
}

/// Raw pool for the test database, or None when it is not configured
pub async fn pool() -> Option<PgPool> {
    let Ok(url) = std::env::var(DATABASE_URL_VAR) else {
        eprintln!("skipping: {} not set", DATABASE_URL_VAR);
        return None;
    };

    let config = ClientConfig {
        url: Some(url),
        pool_size: 4,
        ..ClientConfig::default()
    };
    Some(create_pool(&config).await.unwrap())
}

/// Unique, valid queue name per test run
#[allow(dead_code)]
pub fn queue_name(prefix: &str) -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("{}_{}", prefix, &id[..12])
}
