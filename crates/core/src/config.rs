// Client configuration (environment supplied)

use crate::application::constants::{DEFAULT_ACQUIRE_TIMEOUT, DEFAULT_POOL_SIZE, VT_DEFAULT};
use crate::error::{QueueError, Result};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Connection and client settings.
///
/// # Environment Variables
///
/// - `DATABASE_URL`: full connection URL, takes precedence over the parts
/// - `PGMQ_HOST`, `PGMQ_PORT`, `PGMQ_DATABASE`, `PGMQ_USER`, `PGMQ_PASSWORD`
/// - `PGMQ_POOL_SIZE`: fixed pool size (default: 10)
/// - `PGMQ_VT`: default visibility timeout in seconds (default: 30)
/// - `PGMQ_ACQUIRE_TIMEOUT_MS`: connection wait before a call fails with
///   `Connection` (default: 3000)
#[derive(Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
    pub pool_size: u32,
    pub vt: i32,
    pub acquire_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: "localhost".to_string(),
            port: 5432,
            database: "postgres".to_string(),
            username: "postgres".to_string(),
            password: "postgres".to_string(),
            pool_size: DEFAULT_POOL_SIZE,
            vt: VT_DEFAULT,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
        }
    }
}

impl ClientConfig {
    /// Load from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup (tests pass a map)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Self {
            url: lookup("DATABASE_URL").filter(|s| !s.is_empty()),
            host: lookup("PGMQ_HOST").unwrap_or(defaults.host),
            port: parse_var(&lookup, "PGMQ_PORT")?.unwrap_or(defaults.port),
            database: lookup("PGMQ_DATABASE").unwrap_or(defaults.database),
            username: lookup("PGMQ_USER").unwrap_or(defaults.username),
            password: lookup("PGMQ_PASSWORD").unwrap_or(defaults.password),
            pool_size: parse_var(&lookup, "PGMQ_POOL_SIZE")?.unwrap_or(defaults.pool_size),
            vt: parse_var(&lookup, "PGMQ_VT")?.unwrap_or(defaults.vt),
            acquire_timeout: parse_var(&lookup, "PGMQ_ACQUIRE_TIMEOUT_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.acquire_timeout),
        }
        .validated()
    }

    fn validated(self) -> Result<Self> {
        if self.pool_size == 0 {
            return Err(QueueError::Config("pool size must be at least 1".to_string()));
        }
        if self.vt < 0 {
            return Err(QueueError::Config(format!(
                "visibility timeout must be non-negative: {}",
                self.vt
            )));
        }
        if self.acquire_timeout.is_zero() {
            return Err(QueueError::Config(
                "acquire timeout must be greater than zero".to_string(),
            ));
        }
        Ok(self)
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| QueueError::Config(format!("{}={:?}: {}", key, raw, e))),
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("url", &self.url.as_ref().map(|_| "<redacted>"))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("pool_size", &self.pool_size)
            .field("vt", &self.vt)
            .field("acquire_timeout", &self.acquire_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.url, None);
        assert_eq!(config.acquire_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_parts_from_env() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("PGMQ_HOST", "db.internal"),
            ("PGMQ_PORT", "6543"),
            ("PGMQ_DATABASE", "queues"),
            ("PGMQ_USER", "app"),
            ("PGMQ_PASSWORD", "s3cret"),
            ("PGMQ_POOL_SIZE", " 4 "),
            ("PGMQ_VT", "15"),
            ("PGMQ_ACQUIRE_TIMEOUT_MS", "250"),
        ]))
        .unwrap();

        assert_eq!(config.host, "db.internal");
        assert_eq!(config.port, 6543);
        assert_eq!(config.database, "queues");
        assert_eq!(config.username, "app");
        assert_eq!(config.password, "s3cret");
        assert_eq!(config.pool_size, 4);
        assert_eq!(config.vt, 15);
        assert_eq!(config.acquire_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_database_url_wins() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://u:p@h:1/d"),
            ("PGMQ_HOST", "ignored"),
        ]))
        .unwrap();
        assert_eq!(config.url.as_deref(), Some("postgres://u:p@h:1/d"));
    }

    #[test]
    fn test_bad_numbers_fail() {
        let err = ClientConfig::from_lookup(lookup(&[("PGMQ_PORT", "not-a-port")])).unwrap_err();
        assert!(matches!(err, QueueError::Config(_)));
        assert!(err.to_string().contains("PGMQ_PORT"));

        assert!(ClientConfig::from_lookup(lookup(&[("PGMQ_POOL_SIZE", "0")])).is_err());
        assert!(ClientConfig::from_lookup(lookup(&[("PGMQ_VT", "-5")])).is_err());
        assert!(ClientConfig::from_lookup(lookup(&[("PGMQ_ACQUIRE_TIMEOUT_MS", "0")])).is_err());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("PGMQ_PASSWORD", "hunter2"),
            ("DATABASE_URL", "postgres://u:hunter2@h/d"),
        ]))
        .unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }
}
