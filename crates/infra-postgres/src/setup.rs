// Schema bootstrap

use crate::error::map_sqlx_error;
use pgmq_kit_core::error::Result;
use pgmq_kit_core::{QueueError, RetryPolicy};
use sqlx::PgPool;
use tracing::info;

const SQL_CREATE_EXTENSION: &str = "CREATE EXTENSION IF NOT EXISTS pgmq CASCADE";

/// Install the pgmq extension, retrying while the server comes up.
///
/// Only transport failures are retried; a missing extension package or a
/// permission error is returned on the first attempt.
pub async fn run_setup(pool: &PgPool, policy: &RetryPolicy) -> Result<()> {
    info!("Ensuring pgmq extension is installed...");

    policy
        .run_if(
            "create extension pgmq",
            || async {
                sqlx::query(SQL_CREATE_EXTENSION)
                    .execute(pool)
                    .await
                    .map(|_| ())
                    .map_err(|e| map_sqlx_error(e, None))
            },
            QueueError::is_transient,
        )
        .await?;

    info!("pgmq extension ready");
    Ok(())
}
