// Domain Layer - Queue, message and RAG request models

pub mod message;
pub mod queue;
pub mod rag;

// Re-exports
pub use message::{Message, MsgId};
pub use queue::{QueueMeta, QueueMetrics, QueueName, QueueOptions};
pub use rag::{ChatResponse, DocumentChunk, RagParam, RagProject, RagRequest, RagStatement};
