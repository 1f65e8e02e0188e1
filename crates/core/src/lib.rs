// pgmq-kit Core - Domain Types, Ports & Queue Client
// NO database driver dependencies (adapters live in infra crates)

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod port;

pub use application::{QueueClient, RetryPolicy};
pub use config::ClientConfig;
pub use domain::{Message, QueueMeta, QueueMetrics, QueueName, QueueOptions};
pub use error::{QueueError, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
