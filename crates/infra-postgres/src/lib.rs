// pgmq-kit Infrastructure - Postgres Adapter
// Implements: QueueStore over the pgmq extension, schema bootstrap, RAG queries

mod connection;
mod error;
mod queue_store;
mod rag_client;
mod setup;

pub use connection::{connect_options, create_lazy_pool, create_pool};
pub use error::map_sqlx_error;
pub use queue_store::PgQueueStore;
pub use rag_client::PgRagClient;
pub use setup::run_setup;
