// Postgres QueueStore Implementation (pgmq extension functions)

use crate::error::map_sqlx_error;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pgmq_kit_core::domain::{Message, MsgId, QueueMeta, QueueMetrics, QueueName};
use pgmq_kit_core::error::{QueueError, Result};
use pgmq_kit_core::port::QueueStore;
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::debug;

// pgmq creates its tables with IF NOT EXISTS, so a taken name is detected by
// looking up the queue table before the create function runs.
const SQL_CREATE: &str = "SELECT CASE WHEN to_regclass('pgmq_' || $1::text) IS NOT NULL THEN true \
     ELSE (SELECT false FROM pgmq_create($1::text)) END AS existed";
const SQL_CREATE_PARTITIONED: &str =
    "SELECT CASE WHEN to_regclass('pgmq_' || $1::text) IS NOT NULL THEN true \
     ELSE (SELECT false FROM pgmq_create_partitioned($1::text, $2::text, $3::text)) END AS existed";
const SQL_SEND: &str = "SELECT pgmq_send($1::text, $2::jsonb) AS msg_id";
const SQL_READ: &str =
    "SELECT msg_id, read_ct, enqueued_at, vt, message FROM pgmq_read($1::text, $2, $3)";
const SQL_POP: &str = "SELECT msg_id, read_ct, enqueued_at, vt, message FROM pgmq_pop($1::text)";
const SQL_SET_VT: &str =
    "SELECT msg_id, read_ct, enqueued_at, vt, message FROM pgmq_set_vt($1::text, $2, $3)";
const SQL_DELETE: &str = "SELECT pgmq_delete($1::text, $2) AS deleted";
const SQL_ARCHIVE: &str = "SELECT pgmq_archive($1::text, $2) AS archived";
const SQL_DROP: &str = "SELECT pgmq_drop_queue($1::text) AS dropped";
const SQL_LIST: &str = "SELECT queue_name, created_at FROM pgmq_list_queues()";
const SQL_METRICS: &str = "SELECT queue_name, queue_length, newest_msg_age_sec, oldest_msg_age_sec \
     FROM pgmq_metrics($1::text)";

/// Row shape shared by read, pop and set_vt
#[derive(sqlx::FromRow)]
struct MessageRow {
    msg_id: i64,
    read_ct: i32,
    enqueued_at: DateTime<Utc>,
    vt: DateTime<Utc>,
    message: Json<serde_json::Value>,
}

impl MessageRow {
    fn into_message(self) -> Message {
        Message {
            msg_id: self.msg_id,
            read_ct: self.read_ct,
            enqueued_at: self.enqueued_at,
            vt: self.vt,
            message: self.message.0,
        }
    }
}

#[derive(sqlx::FromRow)]
struct QueueMetaRow {
    queue_name: String,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct MetricsRow {
    queue_name: String,
    queue_length: i64,
    newest_msg_age_sec: Option<i32>,
    oldest_msg_age_sec: Option<i32>,
}

pub struct PgQueueStore {
    pool: PgPool,
}

impl PgQueueStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_flag(&self, sql: &str, queue: &QueueName, msg_id: Option<MsgId>) -> Result<bool> {
        let mut query = sqlx::query_scalar::<_, Option<bool>>(sql).bind(queue.as_str());
        if let Some(id) = msg_id {
            query = query.bind(id);
        }
        let flag = query
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(e, Some(queue)))?;

        Ok(flag.unwrap_or(false))
    }
}

fn created_or_exists(existed: bool, queue: &QueueName) -> Result<()> {
    if existed {
        return Err(QueueError::QueueExists(queue.to_string()));
    }
    Ok(())
}

#[async_trait]
impl QueueStore for PgQueueStore {
    async fn create(&self, queue: &QueueName) -> Result<()> {
        let existed = self.fetch_flag(SQL_CREATE, queue, None).await?;

        debug!(queue = %queue, existed, "pgmq_create");
        created_or_exists(existed, queue)
    }

    async fn create_partitioned(
        &self,
        queue: &QueueName,
        partition_interval: i64,
        retention_interval: i64,
    ) -> Result<()> {
        // The extension accepts intervals as text (numeric ranges or time spans)
        let existed: Option<bool> = sqlx::query_scalar(SQL_CREATE_PARTITIONED)
            .bind(queue.as_str())
            .bind(partition_interval.to_string())
            .bind(retention_interval.to_string())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(e, Some(queue)))?;
        let existed = existed.unwrap_or(false);

        debug!(
            queue = %queue,
            partition_interval,
            retention_interval,
            existed,
            "pgmq_create_partitioned"
        );
        created_or_exists(existed, queue)
    }

    async fn send(&self, queue: &QueueName, payload: &serde_json::Value) -> Result<MsgId> {
        let msg_id: i64 = sqlx::query_scalar(SQL_SEND)
            .bind(queue.as_str())
            .bind(Json(payload))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(e, Some(queue)))?;

        debug!(queue = %queue, msg_id, "pgmq_send");
        Ok(msg_id)
    }

    async fn read(&self, queue: &QueueName, vt: i32, limit: i32) -> Result<Vec<Message>> {
        let rows = sqlx::query_as::<_, MessageRow>(SQL_READ)
            .bind(queue.as_str())
            .bind(vt)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(e, Some(queue)))?;

        debug!(queue = %queue, vt, limit, returned = rows.len(), "pgmq_read");
        Ok(rows.into_iter().map(MessageRow::into_message).collect())
    }

    async fn pop(&self, queue: &QueueName) -> Result<Option<Message>> {
        let row = sqlx::query_as::<_, MessageRow>(SQL_POP)
            .bind(queue.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(e, Some(queue)))?;

        Ok(row.map(MessageRow::into_message))
    }

    async fn set_vt(&self, queue: &QueueName, msg_id: MsgId, vt: i32) -> Result<Option<Message>> {
        let row = sqlx::query_as::<_, MessageRow>(SQL_SET_VT)
            .bind(queue.as_str())
            .bind(msg_id)
            .bind(vt)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(e, Some(queue)))?;

        debug!(queue = %queue, msg_id, vt, found = row.is_some(), "pgmq_set_vt");
        Ok(row.map(MessageRow::into_message))
    }

    async fn delete(&self, queue: &QueueName, msg_id: MsgId) -> Result<bool> {
        let deleted = self.fetch_flag(SQL_DELETE, queue, Some(msg_id)).await?;
        debug!(queue = %queue, msg_id, deleted, "pgmq_delete");
        Ok(deleted)
    }

    async fn archive(&self, queue: &QueueName, msg_id: MsgId) -> Result<bool> {
        let archived = self.fetch_flag(SQL_ARCHIVE, queue, Some(msg_id)).await?;
        debug!(queue = %queue, msg_id, archived, "pgmq_archive");
        Ok(archived)
    }

    async fn drop_queue(&self, queue: &QueueName) -> Result<bool> {
        self.fetch_flag(SQL_DROP, queue, None).await
    }

    async fn list_queues(&self) -> Result<Vec<QueueMeta>> {
        let rows = sqlx::query_as::<_, QueueMetaRow>(SQL_LIST)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(e, None))?;

        Ok(rows
            .into_iter()
            .map(|r| QueueMeta {
                queue_name: r.queue_name,
                created_at: r.created_at,
            })
            .collect())
    }

    async fn metrics(&self, queue: &QueueName) -> Result<QueueMetrics> {
        let row = sqlx::query_as::<_, MetricsRow>(SQL_METRICS)
            .bind(queue.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(e, Some(queue)))?;

        Ok(QueueMetrics {
            queue_name: row.queue_name,
            queue_length: row.queue_length,
            newest_msg_age_sec: row.newest_msg_age_sec,
            oldest_msg_age_sec: row.oldest_msg_age_sec,
        })
    }
}
