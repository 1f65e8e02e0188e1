// Message Domain Model

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Message ID (assigned by the server, monotonically increasing per queue)
pub type MsgId = i64;

/// A message read from a queue.
///
/// The envelope carries the delivery metadata next to the payload. `vt` is
/// the instant at which the message becomes visible to other readers again
/// unless it is deleted or archived first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message<T = serde_json::Value> {
    pub msg_id: MsgId,
    /// Number of times the message has been delivered
    pub read_ct: i32,
    pub enqueued_at: DateTime<Utc>,
    pub vt: DateTime<Utc>,
    pub message: T,
}

impl Message<serde_json::Value> {
    /// Decode the raw JSON payload into a typed message
    pub fn decode<T: DeserializeOwned>(self) -> Result<Message<T>, serde_json::Error> {
        let message = serde_json::from_value(self.message)?;
        Ok(Message {
            msg_id: self.msg_id,
            read_ct: self.read_ct,
            enqueued_at: self.enqueued_at,
            vt: self.vt,
            message,
        })
    }
}

impl<T> Message<T> {
    /// Whether the message is hidden from other readers at `now`
    pub fn is_invisible_at(&self, now: DateTime<Utc>) -> bool {
        self.vt > now
    }
}
