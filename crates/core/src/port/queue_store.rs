// Queue Store Port (Interface)
//
// One method per server-side pgmq statement. Payloads cross this boundary
// as raw JSON; typed (de)serialization happens in QueueClient.

use crate::domain::{Message, MsgId, QueueMeta, QueueMetrics, QueueName};
use crate::error::Result;
use async_trait::async_trait;

/// Backing store for queue operations.
///
/// Each call is a single round trip. Implementations must not retry.
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// `pgmq_create(name)`
    async fn create(&self, queue: &QueueName) -> Result<()>;

    /// `pgmq_create_partitioned(name, partition_interval, retention_interval)`
    async fn create_partitioned(
        &self,
        queue: &QueueName,
        partition_interval: i64,
        retention_interval: i64,
    ) -> Result<()>;

    /// `pgmq_send(name, payload)`, returns the assigned message id
    async fn send(&self, queue: &QueueName, payload: &serde_json::Value) -> Result<MsgId>;

    /// `pgmq_read(name, vt, limit)`, hides each returned message for `vt` seconds
    async fn read(&self, queue: &QueueName, vt: i32, limit: i32) -> Result<Vec<Message>>;

    /// `pgmq_pop(name)`, reads and deletes in one statement
    async fn pop(&self, queue: &QueueName) -> Result<Option<Message>>;

    /// `pgmq_set_vt(name, msg_id, vt)`
    async fn set_vt(&self, queue: &QueueName, msg_id: MsgId, vt: i32) -> Result<Option<Message>>;

    /// `pgmq_delete(name, msg_id)`, false when no such message
    async fn delete(&self, queue: &QueueName, msg_id: MsgId) -> Result<bool>;

    /// `pgmq_archive(name, msg_id)`, false when no such message
    async fn archive(&self, queue: &QueueName, msg_id: MsgId) -> Result<bool>;

    /// `pgmq_drop_queue(name)`
    async fn drop_queue(&self, queue: &QueueName) -> Result<bool>;

    /// `pgmq_list_queues()`
    async fn list_queues(&self) -> Result<Vec<QueueMeta>>;

    /// `pgmq_metrics(name)`
    async fn metrics(&self, queue: &QueueName) -> Result<QueueMetrics>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::QueueError;
    use crate::port::TimeProvider;
    use chrono::{DateTime, Duration, Utc};
    use std::collections::{BTreeMap, HashMap};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone)]
    struct StoredMessage {
        read_ct: i32,
        enqueued_at: DateTime<Utc>,
        vt: DateTime<Utc>,
        payload: serde_json::Value,
    }

    impl StoredMessage {
        fn to_message(&self, msg_id: MsgId) -> Message {
            Message {
                msg_id,
                read_ct: self.read_ct,
                enqueued_at: self.enqueued_at,
                vt: self.vt,
                message: self.payload.clone(),
            }
        }
    }

    #[derive(Debug)]
    struct MockQueue {
        created_at: DateTime<Utc>,
        next_id: MsgId,
        live: BTreeMap<MsgId, StoredMessage>,
        archived: BTreeMap<MsgId, StoredMessage>,
    }

    /// In-memory queue store honoring the visibility-timeout contract.
    ///
    /// A read reports the delivery count before the current delivery, so the
    /// first read of a message has `read_ct == 0`.
    pub struct InMemoryQueueStore {
        queues: Mutex<HashMap<String, MockQueue>>,
        time_provider: Arc<dyn TimeProvider>,
        offline: AtomicBool,
        call_count: AtomicUsize,
    }

    impl InMemoryQueueStore {
        pub fn new(time_provider: Arc<dyn TimeProvider>) -> Self {
            Self {
                queues: Mutex::new(HashMap::new()),
                time_provider,
                offline: AtomicBool::new(false),
                call_count: AtomicUsize::new(0),
            }
        }

        /// While offline every call fails with `QueueError::Connection`
        pub fn set_offline(&self, offline: bool) {
            self.offline.store(offline, Ordering::SeqCst);
        }

        /// Number of round trips attempted so far
        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }

        /// Ids currently held in the archive of `queue`
        pub fn archived_ids(&self, queue: &str) -> Vec<MsgId> {
            self.queues
                .lock()
                .unwrap()
                .get(queue)
                .map(|q| q.archived.keys().copied().collect())
                .unwrap_or_default()
        }

        fn round_trip(&self) -> Result<()> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            if self.offline.load(Ordering::SeqCst) {
                return Err(QueueError::Connection(
                    "connection refused (mock offline)".to_string(),
                ));
            }
            Ok(())
        }

        fn with_queue<R>(
            &self,
            queue: &QueueName,
            f: impl FnOnce(&mut MockQueue, DateTime<Utc>) -> R,
        ) -> Result<R> {
            self.round_trip()?;
            let now = self.time_provider.now();
            let mut queues = self.queues.lock().unwrap();
            let q = queues
                .get_mut(queue.as_str())
                .ok_or_else(|| QueueError::QueueNotFound(queue.to_string()))?;
            Ok(f(q, now))
        }

        fn insert_queue(&self, queue: &QueueName) -> Result<()> {
            self.round_trip()?;
            let now = self.time_provider.now();
            let mut queues = self.queues.lock().unwrap();
            if queues.contains_key(queue.as_str()) {
                return Err(QueueError::QueueExists(queue.to_string()));
            }
            queues.insert(
                queue.to_string(),
                MockQueue {
                    created_at: now,
                    next_id: 1,
                    live: BTreeMap::new(),
                    archived: BTreeMap::new(),
                },
            );
            Ok(())
        }
    }

    #[async_trait]
    impl QueueStore for InMemoryQueueStore {
        async fn create(&self, queue: &QueueName) -> Result<()> {
            self.insert_queue(queue)
        }

        async fn create_partitioned(
            &self,
            queue: &QueueName,
            _partition_interval: i64,
            _retention_interval: i64,
        ) -> Result<()> {
            self.insert_queue(queue)
        }

        async fn send(&self, queue: &QueueName, payload: &serde_json::Value) -> Result<MsgId> {
            self.with_queue(queue, |q, now| {
                let id = q.next_id;
                q.next_id += 1;
                q.live.insert(
                    id,
                    StoredMessage {
                        read_ct: 0,
                        enqueued_at: now,
                        vt: now,
                        payload: payload.clone(),
                    },
                );
                id
            })
        }

        async fn read(&self, queue: &QueueName, vt: i32, limit: i32) -> Result<Vec<Message>> {
            self.with_queue(queue, |q, now| {
                let new_vt = now + Duration::seconds(i64::from(vt));
                let mut delivered = Vec::new();
                for (id, stored) in q.live.iter_mut() {
                    if delivered.len() >= limit.max(0) as usize {
                        break;
                    }
                    if stored.vt > now {
                        continue;
                    }
                    stored.vt = new_vt;
                    delivered.push(stored.to_message(*id));
                    stored.read_ct += 1;
                }
                delivered
            })
        }

        async fn pop(&self, queue: &QueueName) -> Result<Option<Message>> {
            self.with_queue(queue, |q, now| {
                let id = q
                    .live
                    .iter()
                    .find(|(_, m)| m.vt <= now)
                    .map(|(id, _)| *id)?;
                q.live.remove(&id).map(|m| m.to_message(id))
            })
        }

        async fn set_vt(
            &self,
            queue: &QueueName,
            msg_id: MsgId,
            vt: i32,
        ) -> Result<Option<Message>> {
            self.with_queue(queue, |q, now| {
                q.live.get_mut(&msg_id).map(|m| {
                    m.vt = now + Duration::seconds(i64::from(vt));
                    m.to_message(msg_id)
                })
            })
        }

        async fn delete(&self, queue: &QueueName, msg_id: MsgId) -> Result<bool> {
            self.with_queue(queue, |q, _| q.live.remove(&msg_id).is_some())
        }

        async fn archive(&self, queue: &QueueName, msg_id: MsgId) -> Result<bool> {
            self.with_queue(queue, |q, _| match q.live.remove(&msg_id) {
                Some(m) => {
                    q.archived.insert(msg_id, m);
                    true
                }
                None => false,
            })
        }

        async fn drop_queue(&self, queue: &QueueName) -> Result<bool> {
            self.round_trip()?;
            Ok(self.queues.lock().unwrap().remove(queue.as_str()).is_some())
        }

        async fn list_queues(&self) -> Result<Vec<QueueMeta>> {
            self.round_trip()?;
            let queues = self.queues.lock().unwrap();
            let mut metas: Vec<QueueMeta> = queues
                .iter()
                .map(|(name, q)| QueueMeta {
                    queue_name: name.clone(),
                    created_at: q.created_at,
                })
                .collect();
            metas.sort_by(|a, b| a.queue_name.cmp(&b.queue_name));
            Ok(metas)
        }

        async fn metrics(&self, queue: &QueueName) -> Result<QueueMetrics> {
            self.with_queue(queue, |q, now| {
                let age = |t: DateTime<Utc>| (now - t).num_seconds() as i32;
                QueueMetrics {
                    queue_name: queue.to_string(),
                    queue_length: q.live.len() as i64,
                    newest_msg_age_sec: q.live.values().map(|m| m.enqueued_at).max().map(age),
                    oldest_msg_age_sec: q.live.values().map(|m| m.enqueued_at).min().map(age),
                }
            })
        }
    }
}
