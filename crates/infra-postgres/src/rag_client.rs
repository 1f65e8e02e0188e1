// Postgres RAG client (vectorize extension)

use crate::error::map_sqlx_error;
use pgmq_kit_core::domain::{ChatResponse, DocumentChunk, RagParam, RagProject, RagRequest};
use pgmq_kit_core::domain::rag::RAG_SCHEMA;
use pgmq_kit_core::error::Result;
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::{debug, info};

const SQL_INIT_RAG: &str = "SELECT vectorize.init_rag(\
     agent_name => $1, table_name => $2, schema => $3, \
     unique_record_id => 'record_id', \"column\" => 'content', transformer => $4)";
/// Rows per bulk insert statement
const LOAD_BATCH_SIZE: usize = 1_000;

const SQL_ADD_PROMPT: &str =
    "INSERT INTO vectorize.prompts (prompt_type, sys_prompt, user_prompt) VALUES ($1, $2, $3)";

pub struct PgRagClient {
    pool: PgPool,
}

impl PgRagClient {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run a `vectorize.rag` query and decode the chat response
    pub async fn query(&self, request: &RagRequest) -> Result<ChatResponse> {
        let stmt = request.to_statement();

        let mut query = sqlx::query_scalar::<_, Json<ChatResponse>>(&stmt.sql);
        for param in stmt.params {
            query = match param {
                RagParam::Text(v) => query.bind(v),
                RagParam::Int(v) => query.bind(v),
                RagParam::Bool(v) => query.bind(v),
            };
        }

        let Json(resp) = query
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(e, None))?;

        debug!(
            agent = %request.agent_name,
            chat_model = %request.chat_model,
            context_items = resp.context.len(),
            "RAG query answered"
        );
        Ok(resp)
    }

    /// Create the project's document table and register it with vectorize
    pub async fn init_rag(&self, project: &RagProject) -> Result<()> {
        sqlx::query(&project.create_table_sql())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(e, None))?;

        sqlx::query(SQL_INIT_RAG)
            .bind(project.agent_name())
            .bind(project.table_name())
            .bind(RAG_SCHEMA)
            .bind(project.transformer())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(e, None))?;

        info!(
            agent = project.agent_name(),
            table = %project.table_name(),
            transformer = project.transformer(),
            "RAG project initialized"
        );
        Ok(())
    }

    /// Load pre-split document chunks into the agent's table.
    ///
    /// The table is created first when missing. All batches share one
    /// transaction, so a failure leaves no partial load behind.
    pub async fn load_documents(
        &self,
        project: &RagProject,
        chunks: &[DocumentChunk],
    ) -> Result<u64> {
        sqlx::query(&project.create_table_sql())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(e, None))?;

        if chunks.is_empty() {
            return Ok(0);
        }

        let sql = project.insert_documents_sql();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error(e, None))?;

        let mut loaded = 0u64;
        for batch in chunks.chunks(LOAD_BATCH_SIZE) {
            let names: Vec<&str> = batch.iter().map(|c| c.document_name.as_str()).collect();
            let ids: Vec<&str> = batch.iter().map(|c| c.chunk_id.as_str()).collect();
            let metas: Vec<Option<Json<serde_json::Value>>> =
                batch.iter().map(|c| c.meta.clone().map(Json)).collect();
            let contents: Vec<&str> = batch.iter().map(|c| c.content.as_str()).collect();

            let result = sqlx::query(&sql)
                .bind(names)
                .bind(ids)
                .bind(metas)
                .bind(contents)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error(e, None))?;
            loaded += result.rows_affected();

            debug!(
                agent = project.agent_name(),
                loaded,
                total = chunks.len(),
                "Document batch written"
            );
        }

        tx.commit().await.map_err(|e| map_sqlx_error(e, None))?;

        info!(
            agent = project.agent_name(),
            table = %project.table_name(),
            loaded,
            "Documents loaded"
        );
        Ok(loaded)
    }

    /// Register a named prompt template usable as `RagRequest::prompt_template`
    pub async fn add_prompt_template(
        &self,
        prompt_name: &str,
        sys_prompt: &str,
        user_prompt: &str,
    ) -> Result<()> {
        sqlx::query(SQL_ADD_PROMPT)
            .bind(prompt_name)
            .bind(sys_prompt)
            .bind(user_prompt)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(e, None))?;

        info!(prompt = prompt_name, "Prompt template added");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rag_statements_are_fully_bound() {
        assert!(SQL_INIT_RAG.contains("agent_name => $1"));
        assert!(SQL_INIT_RAG.contains("transformer => $4"));
        assert!(SQL_ADD_PROMPT.ends_with("VALUES ($1, $2, $3)"));
    }
}
