// sqlx::Error -> QueueError mapping
//
// Lives here because of the orphan rule: core cannot see sqlx, and
// From<sqlx::Error> for QueueError cannot be implemented in this crate.

use pgmq_kit_core::domain::QueueName;
use pgmq_kit_core::error::QueueError;

/// Convert a driver error into the queue taxonomy.
///
/// `queue` names the queue the statement targeted, when there was one, so
/// existence errors carry it instead of the raw server message.
pub fn map_sqlx_error(err: sqlx::Error, queue: Option<&QueueName>) -> QueueError {
    let name = || {
        queue
            .map(|q| q.as_str().to_string())
            .unwrap_or_else(|| "<unknown>".to_string())
    };

    match &err {
        sqlx::Error::Database(db_err) => {
            // Postgres SQLSTATE codes: https://www.postgresql.org/docs/current/errcodes-appendix.html
            match db_err.code().as_deref() {
                // duplicate_table, unique_violation (concurrent create)
                Some("42P07") | Some("23505") => QueueError::QueueExists(name()),
                // undefined_table
                Some("42P01") => QueueError::QueueNotFound(name()),
                Some(code) => {
                    QueueError::Database(format!("[{}] {}", code, db_err.message()))
                }
                None => QueueError::Database(db_err.message().to_string()),
            }
        }
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => QueueError::Connection(err.to_string()),
        sqlx::Error::Configuration(_) => QueueError::Config(err.to_string()),
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            QueueError::Database(format!("Row decode failed: {}", err))
        }
        _ => QueueError::Database(err.to_string()),
    }
}
