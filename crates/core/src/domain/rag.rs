// RAG Query Model
//
// Every optional clause of vectorize.rag has a fixed position in the
// statement; values are always bound, never spliced into the SQL text.

use crate::error::{QueueError, Result};
use serde::{Deserialize, Serialize};

/// Default chat model for RAG queries
pub const DEFAULT_CHAT_MODEL: &str = "gpt-3.5-turbo";

/// Default embedding model passed to `vectorize.init_rag`
pub const DEFAULT_TRANSFORMER: &str = "sentence-transformers/all-MiniLM-L12-v2";

/// Schema holding the per-agent document tables
pub const RAG_SCHEMA: &str = "vectorize";

/// A bound parameter value for a RAG statement
#[derive(Debug, Clone, PartialEq)]
pub enum RagParam {
    Text(String),
    Int(i32),
    Bool(bool),
}

/// Rendered statement plus its positional parameters
#[derive(Debug, Clone, PartialEq)]
pub struct RagStatement {
    pub sql: String,
    pub params: Vec<RagParam>,
}

/// Request for `vectorize.rag`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagRequest {
    pub agent_name: String,
    pub query: String,
    pub chat_model: String,

    /// Bound to the `task` argument
    #[serde(default)]
    pub prompt_template: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub num_context: Option<i32>,
    #[serde(default)]
    pub force_trim: Option<bool>,
}

impl RagRequest {
    pub fn new(agent_name: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            agent_name: agent_name.into(),
            query: query.into(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            prompt_template: None,
            api_key: None,
            num_context: None,
            force_trim: None,
        }
    }

    pub fn chat_model(mut self, model: impl Into<String>) -> Self {
        self.chat_model = model.into();
        self
    }

    pub fn prompt_template(mut self, template: impl Into<String>) -> Self {
        self.prompt_template = Some(template.into());
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn num_context(mut self, n: i32) -> Self {
        self.num_context = Some(n);
        self
    }

    pub fn force_trim(mut self, trim: bool) -> Self {
        self.force_trim = Some(trim);
        self
    }

    /// Render the statement.
    ///
    /// Clause order is fixed: `agent_name, query, chat_model, task, api_key,
    /// num_context, force_trim`. Absent optional clauses are omitted so the
    /// server-side defaults apply.
    pub fn to_statement(&self) -> RagStatement {
        let mut clauses: Vec<(&str, RagParam)> = vec![
            ("agent_name", RagParam::Text(self.agent_name.clone())),
            ("query", RagParam::Text(self.query.clone())),
            ("chat_model", RagParam::Text(self.chat_model.clone())),
        ];

        if let Some(task) = &self.prompt_template {
            clauses.push(("task", RagParam::Text(task.clone())));
        }
        if let Some(key) = &self.api_key {
            clauses.push(("api_key", RagParam::Text(key.clone())));
        }
        if let Some(n) = self.num_context {
            clauses.push(("num_context", RagParam::Int(n)));
        }
        if let Some(trim) = self.force_trim {
            clauses.push(("force_trim", RagParam::Bool(trim)));
        }

        let args = clauses
            .iter()
            .enumerate()
            .map(|(i, (name, _))| format!("{} => ${}", name, i + 1))
            .collect::<Vec<_>>()
            .join(", ");

        RagStatement {
            sql: format!("SELECT vectorize.rag({}) AS resp", args),
            params: clauses.into_iter().map(|(_, p)| p).collect(),
        }
    }
}

/// A RAG agent and the document table backing it.
///
/// The agent name ends up in a table identifier, so it is held to the same
/// character rules as a queue name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RagProject {
    agent_name: String,
    transformer: String,
}

impl RagProject {
    pub fn new(agent_name: impl Into<String>) -> Result<Self> {
        let agent_name = agent_name.into();
        if agent_name.is_empty() {
            return Err(QueueError::Validation(
                "Agent name cannot be empty".to_string(),
            ));
        }
        if !agent_name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(QueueError::Validation(format!(
                "Agent name must be ASCII alphanumeric or '_': {}",
                agent_name
            )));
        }
        Ok(Self {
            agent_name,
            transformer: DEFAULT_TRANSFORMER.to_string(),
        })
    }

    pub fn with_transformer(mut self, transformer: impl Into<String>) -> Self {
        self.transformer = transformer.into();
        self
    }

    pub fn agent_name(&self) -> &str {
        &self.agent_name
    }

    pub fn transformer(&self) -> &str {
        &self.transformer
    }

    /// Unqualified name of the document table
    pub fn table_name(&self) -> String {
        format!("_data_{}", self.agent_name)
    }

    /// Bulk insert of document chunks, one array parameter per column
    pub fn insert_documents_sql(&self) -> String {
        format!(
            "INSERT INTO {}.{} (document_name, chunk_id, meta, content) \
             SELECT * FROM UNNEST($1::text[], $2::text[], $3::jsonb[], $4::text[])",
            RAG_SCHEMA,
            self.table_name()
        )
    }

    /// DDL for the document table; safe to run repeatedly
    pub fn create_table_sql(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {}.{} (\
             record_id BIGINT GENERATED ALWAYS AS IDENTITY PRIMARY KEY, \
             document_name TEXT NOT NULL, \
             chunk_id TEXT NOT NULL, \
             meta JSONB, \
             content TEXT NOT NULL)",
            RAG_SCHEMA,
            self.table_name()
        )
    }
}

/// Response from `vectorize.rag`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub context: Vec<serde_json::Value>,
    pub chat_response: String,
}

/// One pre-split piece of a source document, as stored in the agent table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub document_name: String,
    pub chunk_id: String,
    #[serde(default)]
    pub meta: Option<serde_json::Value>,
    pub content: String,
}
