//! RAG client against a live vectorize installation
//!
//! Skipped when the server cannot install the vectorize extension.

mod common;

use pgmq_kit_core::domain::{DocumentChunk, RagProject, RagRequest};
use pgmq_kit_core::QueueError;
use pgmq_kit_infra_postgres::PgRagClient;
use serde_json::json;
use sqlx::PgPool;
use tokio::sync::OnceCell;

static VECTORIZE: OnceCell<bool> = OnceCell::const_new();

async fn rag_pool() -> Option<PgPool> {
    let pool = common::pool().await?;
    let available = *VECTORIZE
        .get_or_init(|| async {
            match sqlx::query("CREATE EXTENSION IF NOT EXISTS vectorize CASCADE")
                .execute(&pool)
                .await
            {
                Ok(_) => true,
                Err(e) => {
                    eprintln!("skipping rag tests: {}", e);
                    false
                }
            }
        })
        .await;
    available.then_some(pool)
}

fn chunk(doc: &str, id: &str, meta: Option<serde_json::Value>, content: &str) -> DocumentChunk {
    DocumentChunk {
        document_name: doc.to_string(),
        chunk_id: id.to_string(),
        meta,
        content: content.to_string(),
    }
}

async fn drop_table(pool: &PgPool, project: &RagProject) {
    sqlx::query(&format!("DROP TABLE IF EXISTS vectorize.{}", project.table_name()))
        .execute(pool)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_load_documents_into_agent_table() {
    let Some(pool) = rag_pool().await else {
        return;
    };
    let rag = PgRagClient::new(pool.clone());
    let project = RagProject::new(common::queue_name("docs")).unwrap();

    let chunks = vec![
        chunk("guide.md", "guide-0", Some(json!({"page": 1})), "Queues hold messages."),
        chunk("guide.md", "guide-1", None, "It's read with a visibility timeout."),
        chunk("faq.md", "faq-0", Some(json!({"page": 3})), "Archive keeps history."),
    ];
    assert_eq!(rag.load_documents(&project, &chunks).await.unwrap(), 3);

    let table = format!("vectorize.{}", project.table_name());
    let rows: Vec<(String, String, Option<serde_json::Value>, String)> = sqlx::query_as(&format!(
        "SELECT document_name, chunk_id, meta, content FROM {} ORDER BY record_id",
        table
    ))
    .fetch_all(&pool)
    .await
    .unwrap();

    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].1, "guide-0");
    assert_eq!(rows[0].2, Some(json!({"page": 1})));
    assert_eq!(rows[1].2, None);
    assert_eq!(rows[1].3, "It's read with a visibility timeout.");
    assert_eq!(rows[2].0, "faq.md");

    // Loading again appends; an empty load only ensures the table
    assert_eq!(rag.load_documents(&project, &chunks[..1]).await.unwrap(), 1);
    assert_eq!(rag.load_documents(&project, &[]).await.unwrap(), 0);

    drop_table(&pool, &project).await;
}

#[tokio::test]
async fn test_add_prompt_template() {
    let Some(pool) = rag_pool().await else {
        return;
    };
    let rag = PgRagClient::new(pool.clone());
    let name = common::queue_name("prompt");

    rag.add_prompt_template(&name, "You are terse.", "Context: {{ context_str }}")
        .await
        .unwrap();

    let (sys, user): (String, String) = sqlx::query_as(
        "SELECT sys_prompt, user_prompt FROM vectorize.prompts WHERE prompt_type = $1",
    )
    .bind(&name)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(sys, "You are terse.");
    assert_eq!(user, "Context: {{ context_str }}");

    sqlx::query("DELETE FROM vectorize.prompts WHERE prompt_type = $1")
        .bind(&name)
        .execute(&pool)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_init_rag_creates_table() {
    let Some(pool) = rag_pool().await else {
        return;
    };
    let rag = PgRagClient::new(pool.clone());
    let project = RagProject::new(common::queue_name("agent")).unwrap();

    // Registration needs the embedding service; the table is created before it
    if let Err(e) = rag.init_rag(&project).await {
        eprintln!("skipping init_rag registration: {}", e);
    }

    let exists: bool = sqlx::query_scalar("SELECT to_regclass($1) IS NOT NULL")
        .bind(format!("vectorize.{}", project.table_name()))
        .fetch_one(&pool)
        .await
        .unwrap();
    assert!(exists);

    drop_table(&pool, &project).await;
}

#[tokio::test]
async fn test_query_binds_every_clause() {
    let Some(pool) = rag_pool().await else {
        return;
    };
    let rag = PgRagClient::new(pool);

    // No such agent: the server must see a well-typed call and reject the agent
    let request = RagRequest::new(common::queue_name("missing"), "what is a queue?")
        .prompt_template("question_answer")
        .api_key("not-a-key")
        .num_context(2)
        .force_trim(true);
    let err = rag.query(&request).await.unwrap_err();

    assert!(matches!(err, QueueError::Database(_)), "unexpected error: {}", err);
    assert!(!err.to_string().contains("function vectorize.rag"), "{}", err);
}
