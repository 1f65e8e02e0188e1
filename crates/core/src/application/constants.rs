// Queue client constants (No magic values)
use std::time::Duration;

/// Default visibility timeout in seconds
pub const VT_DEFAULT: i32 = 30;

/// Default number of messages per read
pub const READ_LIMIT_DEFAULT: i32 = 1;

/// Messages per partition for partitioned queues
pub const DEFAULT_PARTITION_INTERVAL: i64 = 10_000;

/// Messages retained by partitioned queues
pub const DEFAULT_RETENTION_INTERVAL: i64 = 100_000;

/// Longest queue name the server accepts once table prefixes are added
pub const MAX_QUEUE_NAME_LEN: usize = 47;

/// Default connection pool size
pub const DEFAULT_POOL_SIZE: u32 = 10;

/// How long a call waits for a pooled connection before failing
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(3);

/// Default attempts for schema setup retries
pub const SETUP_RETRY_ATTEMPTS: u32 = 5;

/// Fixed delay between schema setup attempts
pub const SETUP_RETRY_DELAY: Duration = Duration::from_secs(2);
