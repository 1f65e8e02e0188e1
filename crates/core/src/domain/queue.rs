// Queue Domain Model

use crate::application::constants::{
    DEFAULT_PARTITION_INTERVAL, DEFAULT_RETENTION_INTERVAL, MAX_QUEUE_NAME_LEN,
};
use crate::error::{QueueError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Validated queue name.
///
/// The server splices the name into table identifiers, so only ASCII
/// alphanumerics and underscores are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct QueueName(String);

impl QueueName {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();

        if name.is_empty() {
            return Err(QueueError::Validation(
                "Queue name cannot be empty".to_string(),
            ));
        }

        if name.len() > MAX_QUEUE_NAME_LEN {
            return Err(QueueError::Validation(format!(
                "Queue name too long: {} bytes (max {})",
                name.len(),
                MAX_QUEUE_NAME_LEN
            )));
        }

        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(QueueError::Validation(format!(
                "Queue name must be alphanumeric or underscore: {}",
                name
            )));
        }

        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for QueueName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for QueueName {
    type Error = QueueError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl TryFrom<&str> for QueueName {
    type Error = QueueError;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

impl From<QueueName> for String {
    fn from(name: QueueName) -> Self {
        name.0
    }
}

/// Queue creation options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueOptions {
    pub partitioned: bool,
    /// Messages per partition
    pub partition_interval: i64,
    /// Messages retained before old partitions are dropped
    pub retention_interval: i64,
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            partitioned: false,
            partition_interval: DEFAULT_PARTITION_INTERVAL,
            retention_interval: DEFAULT_RETENTION_INTERVAL,
        }
    }
}

impl QueueOptions {
    /// Partitioned queue with the default retention interval
    pub fn partitioned(partition_interval: i64) -> Self {
        Self {
            partitioned: true,
            partition_interval,
            ..Self::default()
        }
    }

    pub fn with_retention(mut self, retention_interval: i64) -> Self {
        self.retention_interval = retention_interval;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.partition_interval <= 0 {
            return Err(QueueError::Validation(format!(
                "Partition interval must be positive: {}",
                self.partition_interval
            )));
        }
        if self.retention_interval <= 0 {
            return Err(QueueError::Validation(format!(
                "Retention interval must be positive: {}",
                self.retention_interval
            )));
        }
        Ok(())
    }
}

/// Queue metadata as listed by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueMeta {
    pub queue_name: String,
    pub created_at: DateTime<Utc>,
}

/// Point-in-time queue statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueMetrics {
    pub queue_name: String,
    pub queue_length: i64,
    pub newest_msg_age_sec: Option<i32>,
    pub oldest_msg_age_sec: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_name_empty() {
        let err = QueueName::new("").unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn test_queue_name_too_long() {
        let err = QueueName::new("a".repeat(MAX_QUEUE_NAME_LEN + 1)).unwrap_err();
        assert!(err.to_string().contains("too long"));
        assert!(QueueName::new("a".repeat(MAX_QUEUE_NAME_LEN)).is_ok());
    }

    #[test]
    fn test_queue_name_rejects_sql_characters() {
        for bad in ["my-queue", "q; drop table x", "queue.name", "q'1", "ünï"] {
            let err = QueueName::new(bad).unwrap_err();
            assert!(err.to_string().contains("alphanumeric"), "{bad}");
        }
    }

    #[test]
    fn test_queue_name_valid() {
        let name = QueueName::new("bench_queue_1").unwrap();
        assert_eq!(name.as_str(), "bench_queue_1");
        assert_eq!(name.to_string(), "bench_queue_1");
    }

    #[test]
    fn test_queue_name_serde_validates() {
        let ok: QueueName = serde_json::from_str("\"orders\"").unwrap();
        assert_eq!(ok.as_str(), "orders");
        assert!(serde_json::from_str::<QueueName>("\"bad name\"").is_err());
    }

    #[test]
    fn test_options_defaults() {
        let opts = QueueOptions::default();
        assert!(!opts.partitioned);
        assert_eq!(opts.partition_interval, 10_000);
        assert_eq!(opts.retention_interval, 100_000);

        let part = QueueOptions::partitioned(500).with_retention(5_000);
        assert!(part.partitioned);
        assert_eq!(part.partition_interval, 500);
        assert_eq!(part.retention_interval, 5_000);
    }

    #[test]
    fn test_options_validate() {
        assert!(QueueOptions::partitioned(0).validate().is_err());
        assert!(QueueOptions::default().with_retention(-1).validate().is_err());
        assert!(QueueOptions::partitioned(1).validate().is_ok());
    }
}
