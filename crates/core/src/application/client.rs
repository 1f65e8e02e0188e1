// Queue Client - the public face of the queue contract

use crate::application::constants::{READ_LIMIT_DEFAULT, VT_DEFAULT};
use crate::domain::{Message, MsgId, QueueMeta, QueueMetrics, QueueName, QueueOptions};
use crate::error::{QueueError, Result};
use crate::port::QueueStore;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// Client for a pgmq-backed message queue.
///
/// Every method is exactly one round trip to the store. Visibility and
/// exclusivity are enforced server-side; the client validates inputs, maps
/// rows to typed messages and surfaces errors. It never retries.
///
/// Construct it once and hand clones to the code that needs it:
///
/// ```text
/// let store = Arc::new(PgQueueStore::new(pool));
/// let client = QueueClient::new(store);
/// let id = client.send("orders", &json!({"sku": "A-1"})).await?;
/// ```
#[derive(Clone)]
pub struct QueueClient {
    store: Arc<dyn QueueStore>,
    default_vt: i32,
}

fn queue_name(queue: &str) -> Result<QueueName> {
    QueueName::new(queue)
}

fn check_vt(vt: i32) -> Result<i32> {
    if vt < 0 {
        return Err(QueueError::Validation(format!(
            "Visibility timeout must be non-negative: {}",
            vt
        )));
    }
    Ok(vt)
}

impl QueueClient {
    pub fn new(store: Arc<dyn QueueStore>) -> Self {
        Self {
            store,
            default_vt: VT_DEFAULT,
        }
    }

    /// Override the visibility timeout used when a read passes `None`
    pub fn with_default_vt(mut self, vt: i32) -> Self {
        self.default_vt = vt;
        self
    }

    /// Create a non-partitioned queue.
    ///
    /// Fails with `QueueExists` on a name collision; callers that treat
    /// creation as idempotent match on that variant.
    pub async fn create_queue(&self, queue: &str) -> Result<()> {
        self.create_queue_with(queue, &QueueOptions::default()).await
    }

    /// Create a partitioned queue with the default retention interval
    pub async fn create_partitioned_queue(&self, queue: &str, partition_size: i64) -> Result<()> {
        self.create_queue_with(queue, &QueueOptions::partitioned(partition_size))
            .await
    }

    pub async fn create_queue_with(&self, queue: &str, options: &QueueOptions) -> Result<()> {
        let name = queue_name(queue)?;

        if options.partitioned {
            options.validate()?;
            self.store
                .create_partitioned(&name, options.partition_interval, options.retention_interval)
                .await?;
        } else {
            self.store.create(&name).await?;
        }

        info!(
            queue = %name,
            partitioned = options.partitioned,
            "Queue created"
        );
        Ok(())
    }

    /// Enqueue a payload and return the server-assigned message id
    pub async fn send<T: Serialize + ?Sized>(&self, queue: &str, payload: &T) -> Result<MsgId> {
        let name = queue_name(queue)?;
        let value = serde_json::to_value(payload)?;
        let msg_id = self.store.send(&name, &value).await?;

        debug!(queue = %name, msg_id, "Message sent");
        Ok(msg_id)
    }

    /// Enqueue with a delivery delay.
    ///
    /// Delayed delivery is not available in the server version this client
    /// targets: a zero delay is a plain `send`, anything else fails with
    /// `NotSupported` instead of being dropped.
    pub async fn send_delay<T: Serialize + ?Sized>(
        &self,
        queue: &str,
        payload: &T,
        delay_seconds: u32,
    ) -> Result<MsgId> {
        if delay_seconds > 0 {
            return Err(QueueError::NotSupported(format!(
                "send with delay ({}s) is not implemented by pgmq",
                delay_seconds
            )));
        }
        self.send(queue, payload).await
    }

    /// Read at most one visible message, hiding it for `vt` seconds.
    ///
    /// `None` means nothing is visible right now; callers poll.
    pub async fn read<T: DeserializeOwned>(
        &self,
        queue: &str,
        vt: Option<i32>,
    ) -> Result<Option<Message<T>>> {
        let mut batch = self.read_batch(queue, vt, READ_LIMIT_DEFAULT).await?;
        Ok(batch.pop())
    }

    /// Read up to `limit` visible messages, hiding each for `vt` seconds
    pub async fn read_batch<T: DeserializeOwned>(
        &self,
        queue: &str,
        vt: Option<i32>,
        limit: i32,
    ) -> Result<Vec<Message<T>>> {
        let name = queue_name(queue)?;
        let vt = check_vt(vt.unwrap_or(self.default_vt))?;
        if limit < 1 {
            return Err(QueueError::Validation(format!(
                "Read limit must be at least 1: {}",
                limit
            )));
        }

        let rows = self.store.read(&name, vt, limit).await?;
        debug!(queue = %name, vt, limit, returned = rows.len(), "Read batch");

        rows.into_iter()
            .map(|m| m.decode().map_err(QueueError::from))
            .collect()
    }

    /// Read one message and delete it in the same statement
    pub async fn pop<T: DeserializeOwned>(&self, queue: &str) -> Result<Option<Message<T>>> {
        let name = queue_name(queue)?;
        let row = self.store.pop(&name).await?;
        row.map(|m| m.decode().map_err(QueueError::from))
            .transpose()
    }

    /// Reset the visibility timeout of a message to `now + vt` seconds
    pub async fn set_vt<T: DeserializeOwned>(
        &self,
        queue: &str,
        msg_id: MsgId,
        vt: i32,
    ) -> Result<Message<T>> {
        let name = queue_name(queue)?;
        let vt = check_vt(vt)?;
        match self.store.set_vt(&name, msg_id, vt).await? {
            Some(row) => Ok(row.decode()?),
            None => Err(QueueError::MessageNotFound {
                queue: name.into(),
                msg_id,
            }),
        }
    }

    /// Move a message to the queue's archive.
    ///
    /// A missing id fails with `MessageNotFound`.
    pub async fn archive(&self, queue: &str, msg_id: MsgId) -> Result<()> {
        let name = queue_name(queue)?;
        if !self.store.archive(&name, msg_id).await? {
            return Err(QueueError::MessageNotFound {
                queue: name.into(),
                msg_id,
            });
        }
        debug!(queue = %name, msg_id, "Message archived");
        Ok(())
    }

    /// Permanently remove a message. A missing id fails with `MessageNotFound`.
    pub async fn delete(&self, queue: &str, msg_id: MsgId) -> Result<()> {
        let name = queue_name(queue)?;
        if !self.store.delete(&name, msg_id).await? {
            return Err(QueueError::MessageNotFound {
                queue: name.into(),
                msg_id,
            });
        }
        debug!(queue = %name, msg_id, "Message deleted");
        Ok(())
    }

    pub async fn drop_queue(&self, queue: &str) -> Result<()> {
        let name = queue_name(queue)?;
        if !self.store.drop_queue(&name).await? {
            return Err(QueueError::QueueNotFound(name.into()));
        }
        info!(queue = %name, "Queue dropped");
        Ok(())
    }

    pub async fn list_queues(&self) -> Result<Vec<QueueMeta>> {
        self.store.list_queues().await
    }

    pub async fn metrics(&self, queue: &str) -> Result<QueueMetrics> {
        let name = queue_name(queue)?;
        self.store.metrics(&name).await
    }
}
