//! pgmq CLI - queue administration, benchmarking and producer/consumer runs

mod bench;
mod logging;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use pgmq_kit_core::domain::{DocumentChunk, MsgId, RagProject, RagRequest};
use pgmq_kit_core::{ClientConfig, Message, QueueClient, QueueOptions, RetryPolicy};
use pgmq_kit_infra_postgres::{
    create_lazy_pool, create_pool, run_setup, PgQueueStore, PgRagClient,
};
use serde_json::Value;
use sqlx::PgPool;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tabled::{Table, Tabled};
use tracing::info;

use crate::bench::{consume, ensure_queue, produce, run_bench, summarize, Timing};

#[derive(Parser)]
#[command(name = "pgmq")]
#[command(about = "Postgres message queue CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Connection URL; overrides the PGMQ_HOST/PGMQ_PORT/... parts
    #[arg(long, env = "DATABASE_URL", global = true, hide_env_values = true)]
    database_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Install the pgmq extension (retries while the server starts)
    Setup {
        /// Fail on the first connection error instead of retrying
        #[arg(long)]
        no_retry: bool,
    },

    /// Create a queue
    Create {
        queue: String,

        /// Create a partitioned queue
        #[arg(long)]
        partitioned: bool,

        /// Messages per partition
        #[arg(long, default_value = "10000")]
        partition_size: i64,

        /// Messages retained before old partitions are dropped
        #[arg(long, default_value = "100000")]
        retention: i64,
    },

    /// Send a JSON message
    Send {
        queue: String,

        /// Payload as JSON string
        payload: String,
    },

    /// Read messages, hiding them for the visibility timeout
    Read {
        queue: String,

        /// Visibility timeout in seconds (default: PGMQ_VT)
        #[arg(long)]
        vt: Option<i32>,

        #[arg(short = 'n', long, default_value = "1")]
        limit: i32,
    },

    /// Read and delete one message
    Pop { queue: String },

    /// Move a message to the archive
    Archive { queue: String, msg_id: MsgId },

    /// Delete a message
    Delete { queue: String, msg_id: MsgId },

    /// Drop a queue and its archive
    Drop { queue: String },

    /// List queues
    List,

    /// Show queue metrics
    Metrics { queue: String },

    /// Time write, read, archive and delete round trips
    Bench {
        /// Queue to use (default: random bench_queue_N)
        #[arg(long)]
        queue: Option<String>,

        #[arg(short = 'n', long, default_value = "10000")]
        num_messages: usize,

        #[arg(long, default_value = "10")]
        vt: i32,

        #[arg(long, default_value = "10000")]
        partition_interval: i64,

        /// Messages retained (default: num_messages)
        #[arg(long)]
        retention: Option<i64>,
    },

    /// Send messages at a fixed pace
    Produce {
        queue: String,

        #[arg(short = 'n', long, default_value = "1000")]
        count: usize,

        /// Pause between sends
        #[arg(long, default_value = "2")]
        interval_ms: u64,
    },

    /// Poll and delete messages for a fixed duration
    Consume {
        queue: String,

        #[arg(long, default_value = "60")]
        run_for_secs: u64,

        /// Pause after an empty read
        #[arg(long, default_value = "500")]
        poll_ms: u64,

        #[arg(long, default_value = "10")]
        vt: i32,
    },

    /// Retrieval-augmented generation via the vectorize extension
    Rag {
        #[command(subcommand)]
        command: RagCommands,
    },
}

#[derive(Subcommand)]
enum RagCommands {
    /// Create the document table and register the agent
    Init {
        agent_name: String,

        /// Embedding model
        #[arg(long)]
        transformer: Option<String>,
    },

    /// Register a prompt template
    AddPrompt {
        prompt_name: String,
        sys_prompt: String,
        user_prompt: String,
    },

    /// Load pre-split document chunks from a JSON Lines file
    Load {
        agent_name: String,

        /// One {"document_name", "chunk_id", "meta", "content"} object per line
        path: PathBuf,
    },

    /// Ask a question
    Query {
        agent_name: String,
        query: String,

        #[arg(long)]
        chat_model: Option<String>,

        /// Prompt template name (bound to `task`)
        #[arg(long)]
        prompt_template: Option<String>,

        #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
        api_key: Option<String>,

        #[arg(long)]
        num_context: Option<i32>,

        #[arg(long)]
        force_trim: Option<bool>,
    },
}

#[derive(Tabled)]
struct MessageView {
    msg_id: MsgId,
    read_ct: i32,
    enqueued_at: String,
    vt: String,
    message: String,
}

impl From<Message<Value>> for MessageView {
    fn from(m: Message<Value>) -> Self {
        Self {
            msg_id: m.msg_id,
            read_ct: m.read_ct,
            enqueued_at: m.enqueued_at.to_rfc3339(),
            vt: m.vt.to_rfc3339(),
            message: m.message.to_string(),
        }
    }
}

#[derive(Tabled)]
struct QueueView {
    queue_name: String,
    created_at: String,
}

fn opt_secs(v: Option<i32>) -> String {
    v.map(|s| s.to_string()).unwrap_or_else(|| "-".to_string())
}

fn print_messages(messages: Vec<Message<Value>>) {
    if messages.is_empty() {
        println!("{}", "No visible messages".yellow());
        return;
    }
    let rows: Vec<MessageView> = messages.into_iter().map(MessageView::from).collect();
    println!("{}", Table::new(rows));
}

fn print_summary(title: &str, timings: &[Timing]) {
    println!("{}", title.cyan().bold());
    println!("{}", Table::new(summarize(timings)));
}

fn read_chunks(path: &Path) -> Result<Vec<DocumentChunk>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("{}:{}: invalid document chunk", path.display(), i + 1))
        })
        .collect()
}

async fn connect(config: &ClientConfig) -> Result<PgPool> {
    create_pool(config)
        .await
        .with_context(|| format!("Failed to connect to {}:{}", config.host, config.port))
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_tracing()?;

    let cli = Cli::parse();

    let mut config = ClientConfig::from_env().context("Invalid configuration")?;
    if let Some(url) = cli.database_url {
        config.url = Some(url);
    }

    // Setup must survive a server that is still starting, so it connects lazily
    let pool = match cli.command {
        Commands::Setup { .. } => create_lazy_pool(&config)?,
        _ => connect(&config).await?,
    };
    let client = QueueClient::new(Arc::new(PgQueueStore::new(pool.clone())))
        .with_default_vt(config.vt);

    match cli.command {
        Commands::Setup { no_retry } => {
            let policy = if no_retry {
                RetryPolicy::none()
            } else {
                RetryPolicy::default()
            };
            run_setup(&pool, &policy).await?;
            println!("{}", "✓ pgmq extension installed".green().bold());
        }

        Commands::Create {
            queue,
            partitioned,
            partition_size,
            retention,
        } => {
            let options = if partitioned {
                QueueOptions::partitioned(partition_size).with_retention(retention)
            } else {
                QueueOptions::default()
            };
            client.create_queue_with(&queue, &options).await?;
            println!("{}", format!("✓ Queue {} created", queue).green().bold());
        }

        Commands::Send { queue, payload } => {
            let payload: Value = serde_json::from_str(&payload).context("Invalid JSON payload")?;
            let msg_id = client.send(&queue, &payload).await?;
            println!("{}", format!("✓ Sent message {}", msg_id).green().bold());
        }

        Commands::Read { queue, vt, limit } => {
            let messages = client.read_batch::<Value>(&queue, vt, limit).await?;
            print_messages(messages);
        }

        Commands::Pop { queue } => {
            let message = client.pop::<Value>(&queue).await?;
            print_messages(message.into_iter().collect());
        }

        Commands::Archive { queue, msg_id } => {
            client.archive(&queue, msg_id).await?;
            println!("{}", format!("✓ Message {} archived", msg_id).green().bold());
        }

        Commands::Delete { queue, msg_id } => {
            client.delete(&queue, msg_id).await?;
            println!("{}", format!("✓ Message {} deleted", msg_id).green().bold());
        }

        Commands::Drop { queue } => {
            client.drop_queue(&queue).await?;
            println!("{}", format!("✓ Queue {} dropped", queue).green().bold());
        }

        Commands::List => {
            let rows: Vec<QueueView> = client
                .list_queues()
                .await?
                .into_iter()
                .map(|q| QueueView {
                    queue_name: q.queue_name,
                    created_at: q.created_at.to_rfc3339(),
                })
                .collect();
            if rows.is_empty() {
                println!("{}", "No queues".yellow());
            } else {
                println!("{}", Table::new(rows));
            }
        }

        Commands::Metrics { queue } => {
            let m = client.metrics(&queue).await?;
            println!("{}", format!("Queue {}", m.queue_name).cyan().bold());
            println!();
            println!("  {} {}", "Length:".bold(), m.queue_length);
            println!("  {} {}", "Newest age (s):".bold(), opt_secs(m.newest_msg_age_sec));
            println!("  {} {}", "Oldest age (s):".bold(), opt_secs(m.oldest_msg_age_sec));
        }

        Commands::Bench {
            queue,
            num_messages,
            vt,
            partition_interval,
            retention,
        } => {
            let queue =
                queue.unwrap_or_else(|| format!("bench_queue_{}", rand::random::<u8>() % 101));
            let retention = retention.unwrap_or(num_messages as i64);
            info!(queue = %queue, num_messages, retention, "Starting benchmark");

            let options = QueueOptions::partitioned(partition_interval).with_retention(retention);
            ensure_queue(&client, &queue, &options).await?;

            let timings = run_bench(&client, &queue, num_messages, vt).await?;
            print_summary(&format!("Benchmark results ({})", queue), &timings);
        }

        Commands::Produce {
            queue,
            count,
            interval_ms,
        } => {
            ensure_queue(&client, &queue, &QueueOptions::default()).await?;
            let timings = produce(&client, &queue, count, Duration::from_millis(interval_ms)).await?;
            print_summary("Producer results", &timings);
        }

        Commands::Consume {
            queue,
            run_for_secs,
            poll_ms,
            vt,
        } => {
            ensure_queue(&client, &queue, &QueueOptions::default()).await?;
            let timings = consume(
                &client,
                &queue,
                Duration::from_secs(run_for_secs),
                Duration::from_millis(poll_ms),
                vt,
            )
            .await?;
            print_summary("Consumer results", &timings);
        }

        Commands::Rag { command } => {
            let rag = PgRagClient::new(pool);
            match command {
                RagCommands::Init {
                    agent_name,
                    transformer,
                } => {
                    let mut project = RagProject::new(agent_name)?;
                    if let Some(t) = transformer {
                        project = project.with_transformer(t);
                    }
                    rag.init_rag(&project).await?;
                    println!(
                        "{}",
                        format!("✓ Agent {} initialized", project.agent_name())
                            .green()
                            .bold()
                    );
                }

                RagCommands::AddPrompt {
                    prompt_name,
                    sys_prompt,
                    user_prompt,
                } => {
                    rag.add_prompt_template(&prompt_name, &sys_prompt, &user_prompt)
                        .await?;
                    println!(
                        "{}",
                        format!("✓ Prompt {} added", prompt_name).green().bold()
                    );
                }

                RagCommands::Load { agent_name, path } => {
                    let project = RagProject::new(agent_name)?;
                    let chunks = read_chunks(&path)?;
                    let loaded = rag.load_documents(&project, &chunks).await?;
                    println!(
                        "{}",
                        format!("✓ Loaded {} chunk(s) into {}", loaded, project.table_name())
                            .green()
                            .bold()
                    );
                }

                RagCommands::Query {
                    agent_name,
                    query,
                    chat_model,
                    prompt_template,
                    api_key,
                    num_context,
                    force_trim,
                } => {
                    let mut request = RagRequest::new(agent_name, query);
                    if let Some(m) = chat_model {
                        request = request.chat_model(m);
                    }
                    request.prompt_template = prompt_template;
                    request.api_key = api_key;
                    request.num_context = num_context;
                    request.force_trim = force_trim;

                    let resp = rag.query(&request).await?;
                    println!("{}", resp.chat_response);
                    println!();
                    println!(
                        "{}",
                        format!("{} context item(s)", resp.context.len()).dimmed()
                    );
                }
            }
        }
    }

    Ok(())
}
