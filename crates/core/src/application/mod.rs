// Application Layer - Queue client and caller-side utilities

pub mod client;
pub mod constants;
pub mod retry;


// Re-exports
pub use client::QueueClient;
pub use retry::{Backoff, RetryPolicy};
