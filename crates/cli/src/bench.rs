// Benchmark, producer and consumer loops
//
// All three drive a QueueClient and record one timing per round trip.

use anyhow::{bail, Result};
use pgmq_kit_core::domain::MsgId;
use pgmq_kit_core::{QueueClient, QueueError, QueueOptions};
use serde_json::{json, Value};
use std::fmt;
use std::time::{Duration, Instant};
use tabled::Tabled;
use tokio::time::sleep;
use tracing::{info, warn};

/// Progress is logged every this many messages
const PROGRESS_EVERY: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Operation {
    Write,
    Read,
    Archive,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operation::Write => "write",
            Operation::Read => "read",
            Operation::Archive => "archive",
            Operation::Delete => "delete",
        };
        f.write_str(s)
    }
}

/// One timed round trip
#[derive(Debug, Clone)]
pub struct Timing {
    pub operation: Operation,
    pub duration: Duration,
    pub msg_id: MsgId,
}

/// Aggregate timings for one operation, in milliseconds
#[derive(Debug, Clone, PartialEq, Tabled)]
pub struct OpSummary {
    pub operation: Operation,
    pub count: usize,
    #[tabled(rename = "mean (ms)", display_with = "fmt_ms")]
    pub mean_ms: f64,
    #[tabled(rename = "stddev (ms)", display_with = "fmt_ms")]
    pub stddev_ms: f64,
    #[tabled(rename = "min (ms)", display_with = "fmt_ms")]
    pub min_ms: f64,
    #[tabled(rename = "max (ms)", display_with = "fmt_ms")]
    pub max_ms: f64,
}

fn fmt_ms(v: &f64) -> String {
    format!("{:.3}", v)
}

/// Per-operation count/mean/stddev/min/max, ordered by operation.
///
/// The standard deviation is the sample one (n - 1); a single sample has 0.
pub fn summarize(timings: &[Timing]) -> Vec<OpSummary> {
    let mut ops: Vec<Operation> = timings.iter().map(|t| t.operation).collect();
    ops.sort();
    ops.dedup();

    ops.into_iter()
        .map(|op| {
            let samples: Vec<f64> = timings
                .iter()
                .filter(|t| t.operation == op)
                .map(|t| t.duration.as_secs_f64() * 1000.0)
                .collect();
            let n = samples.len() as f64;
            let mean = samples.iter().sum::<f64>() / n;
            let variance = if samples.len() > 1 {
                samples.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / (n - 1.0)
            } else {
                0.0
            };

            OpSummary {
                operation: op,
                count: samples.len(),
                mean_ms: mean,
                stddev_ms: variance.sqrt(),
                min_ms: samples.iter().copied().fold(f64::INFINITY, f64::min),
                max_ms: samples.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            }
        })
        .collect()
}

/// Create the queue, treating an existing one as success
pub async fn ensure_queue(client: &QueueClient, queue: &str, options: &QueueOptions) -> Result<()> {
    match client.create_queue_with(queue, options).await {
        Ok(()) => Ok(()),
        Err(QueueError::QueueExists(_)) => {
            warn!(queue, "Queue already exists, reusing it");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

pub fn bench_payload() -> Value {
    json!({"hello": "world"})
}

async fn timed_send(client: &QueueClient, queue: &str, payload: &Value) -> Result<Timing> {
    let start = Instant::now();
    let msg_id = client.send(queue, payload).await?;
    Ok(Timing {
        operation: Operation::Write,
        duration: start.elapsed(),
        msg_id,
    })
}

/// Full benchmark: write N, read and archive N, then write and delete N
pub async fn run_bench(
    client: &QueueClient,
    queue: &str,
    num_messages: usize,
    vt: i32,
) -> Result<Vec<Timing>> {
    let payload = bench_payload();
    let mut results = Vec::with_capacity(num_messages.saturating_mul(4));

    info!(queue, num_messages, "Writing messages");
    for i in 0..num_messages {
        results.push(timed_send(client, queue, &payload).await?);
        if (i + 1) % PROGRESS_EVERY == 0 {
            info!(written = i + 1, "Write progress");
        }
    }

    info!(queue, "Reading and archiving messages");
    for i in 0..num_messages {
        let start = Instant::now();
        let msg = client.read::<Value>(queue, Some(vt)).await?;
        let read_duration = start.elapsed();
        let Some(msg) = msg else {
            bail!("Queue {} drained after {} of {} reads", queue, i, num_messages);
        };
        results.push(Timing {
            operation: Operation::Read,
            duration: read_duration,
            msg_id: msg.msg_id,
        });

        let start = Instant::now();
        client.archive(queue, msg.msg_id).await?;
        results.push(Timing {
            operation: Operation::Archive,
            duration: start.elapsed(),
            msg_id: msg.msg_id,
        });
    }

    info!(queue, "Benchmarking message deletion");
    let mut ids = Vec::with_capacity(num_messages);
    for _ in 0..num_messages {
        ids.push(client.send(queue, &payload).await?);
    }
    for msg_id in ids {
        let start = Instant::now();
        client.delete(queue, msg_id).await?;
        results.push(Timing {
            operation: Operation::Delete,
            duration: start.elapsed(),
            msg_id,
        });
    }

    Ok(results)
}

/// Send `count` messages with a fixed pause between sends
pub async fn produce(
    client: &QueueClient,
    queue: &str,
    count: usize,
    interval: Duration,
) -> Result<Vec<Timing>> {
    let payload = bench_payload();
    let mut results = Vec::with_capacity(count);

    for i in 0..count {
        results.push(timed_send(client, queue, &payload).await?);
        if i % PROGRESS_EVERY == 0 {
            info!(sent = i, total = count, "Produce progress");
        }
        if i + 1 < count {
            sleep(interval).await;
        }
    }

    info!(queue, sent = count, "Producer finished");
    Ok(results)
}

/// Poll for messages until `run_for` elapses, deleting each one consumed.
///
/// An empty read sleeps for `poll` before trying again.
pub async fn consume(
    client: &QueueClient,
    queue: &str,
    run_for: Duration,
    poll: Duration,
    vt: i32,
) -> Result<Vec<Timing>> {
    let deadline = tokio::time::Instant::now() + run_for;
    let mut results = Vec::new();
    let mut empty_reads = 0u32;

    while tokio::time::Instant::now() < deadline {
        let start = Instant::now();
        let Some(msg) = client.read::<Value>(queue, Some(vt)).await? else {
            empty_reads += 1;
            if empty_reads > 2 {
                info!(queue, empty_reads, "No messages for consecutive reads");
            }
            sleep(poll).await;
            continue;
        };
        empty_reads = 0;
        results.push(Timing {
            operation: Operation::Read,
            duration: start.elapsed(),
            msg_id: msg.msg_id,
        });

        let start = Instant::now();
        client.delete(queue, msg.msg_id).await?;
        results.push(Timing {
            operation: Operation::Delete,
            duration: start.elapsed(),
            msg_id: msg.msg_id,
        });
    }

    info!(queue, consumed = results.len() / 2, "Consumer finished");
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pgmq_kit_core::port::time_provider::mocks::ManualTimeProvider;
    use pgmq_kit_core::port::queue_store::mocks::InMemoryQueueStore;
    use std::sync::Arc;
    use tokio_test::assert_ok;

    fn client() -> (QueueClient, Arc<InMemoryQueueStore>) {
        let clock = Arc::new(ManualTimeProvider::default());
        let store = Arc::new(InMemoryQueueStore::new(clock));
        (QueueClient::new(store.clone()), store)
    }

    fn timing(operation: Operation, ms: u64) -> Timing {
        Timing {
            operation,
            duration: Duration::from_millis(ms),
            msg_id: 1,
        }
    }

    #[test]
    fn test_summarize_stats() {
        let timings = vec![
            timing(Operation::Read, 2),
            timing(Operation::Write, 1),
            timing(Operation::Write, 3),
            timing(Operation::Write, 5),
        ];
        let summary = summarize(&timings);

        assert_eq!(summary.len(), 2);
        let write = &summary[0];
        assert_eq!(write.operation, Operation::Write);
        assert_eq!(write.count, 3);
        assert!((write.mean_ms - 3.0).abs() < 1e-9);
        assert!((write.stddev_ms - 2.0).abs() < 1e-9);
        assert!((write.min_ms - 1.0).abs() < 1e-9);
        assert!((write.max_ms - 5.0).abs() < 1e-9);

        let read = &summary[1];
        assert_eq!(read.count, 1);
        assert_eq!(read.stddev_ms, 0.0);
    }

    #[test]
    fn test_summarize_empty() {
        assert!(summarize(&[]).is_empty());
    }

    #[tokio::test]
    async fn test_ensure_queue_tolerates_existing() {
        let (client, _store) = client();
        assert_ok!(ensure_queue(&client, "bench_q", &QueueOptions::default()).await);
        assert_ok!(ensure_queue(&client, "bench_q", &QueueOptions::default()).await);
    }

    #[tokio::test]
    async fn test_ensure_queue_propagates_other_errors() {
        let (client, store) = client();
        store.set_offline(true);
        assert!(ensure_queue(&client, "bench_q", &QueueOptions::default())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_bench_exercises_every_operation() {
        let (client, store) = client();
        ensure_queue(&client, "bench_q", &QueueOptions::partitioned(100))
            .await
            .unwrap();

        let results = run_bench(&client, "bench_q", 5, 10).await.unwrap();
        let summary = summarize(&results);

        let counts: Vec<(Operation, usize)> =
            summary.iter().map(|s| (s.operation, s.count)).collect();
        assert_eq!(
            counts,
            vec![
                (Operation::Write, 5),
                (Operation::Read, 5),
                (Operation::Archive, 5),
                (Operation::Delete, 5),
            ]
        );
        assert_eq!(store.archived_ids("bench_q").len(), 5);
        assert_eq!(client.metrics("bench_q").await.unwrap().queue_length, 0);
    }

    #[tokio::test]
    async fn test_bench_with_no_messages() {
        let (client, _store) = client();
        ensure_queue(&client, "empty_q", &QueueOptions::default())
            .await
            .unwrap();

        let results = run_bench(&client, "empty_q", 0, 10).await.unwrap();
        assert!(results.is_empty());
        assert!(summarize(&results).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_produce_then_consume_drains_queue() {
        let (client, _store) = client();
        ensure_queue(&client, "work", &QueueOptions::default())
            .await
            .unwrap();

        let produced = produce(&client, "work", 4, Duration::from_millis(50))
            .await
            .unwrap();
        assert_eq!(produced.len(), 4);

        let consumed = consume(
            &client,
            "work",
            Duration::from_secs(2),
            Duration::from_millis(500),
            10,
        )
        .await
        .unwrap();

        let deleted: Vec<MsgId> = consumed
            .iter()
            .filter(|t| t.operation == Operation::Delete)
            .map(|t| t.msg_id)
            .collect();
        let sent: Vec<MsgId> = produced.iter().map(|t| t.msg_id).collect();
        assert_eq!(deleted, sent);
        assert_eq!(client.metrics("work").await.unwrap().queue_length, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_consume_stops_on_store_failure() {
        let (client, store) = client();
        ensure_queue(&client, "work", &QueueOptions::default())
            .await
            .unwrap();
        store.set_offline(true);

        let result = consume(
            &client,
            "work",
            Duration::from_secs(1),
            Duration::from_millis(100),
            10,
        )
        .await;
        assert!(result.is_err());
    }
}
