//! Visibility-timeout contract against a live pgmq installation

mod common;

use pgmq_kit_core::QueueError;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::time::Duration;

#[tokio::test]
async fn test_message_hidden_then_redelivered() {
    let Some(client) = common::client().await else {
        return;
    };
    let queue = common::queue_name("vis");
    client.create_queue(&queue).await.unwrap();

    let msg_id = client.send(&queue, &json!({"hello": "world"})).await.unwrap();

    let first = client.read::<Value>(&queue, Some(2)).await.unwrap().unwrap();
    assert_eq!(first.msg_id, msg_id);

    // Hidden while the timeout runs
    assert!(client.read::<Value>(&queue, Some(2)).await.unwrap().is_none());

    tokio::time::sleep(Duration::from_secs(3)).await;

    let second = client.read::<Value>(&queue, Some(2)).await.unwrap().unwrap();
    assert_eq!(second.msg_id, msg_id);
    assert!(second.read_ct > first.read_ct);
    assert_eq!(second.message, json!({"hello": "world"}));

    client.drop_queue(&queue).await.unwrap();
}

#[tokio::test]
async fn test_set_vt_extends_hold() {
    let Some(client) = common::client().await else {
        return;
    };
    let queue = common::queue_name("setvt");
    client.create_queue(&queue).await.unwrap();

    let msg_id = client.send(&queue, &json!(1)).await.unwrap();
    client.read::<Value>(&queue, Some(1)).await.unwrap().unwrap();

    let held = client.set_vt::<Value>(&queue, msg_id, 60).await.unwrap();
    assert_eq!(held.msg_id, msg_id);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(client.read::<Value>(&queue, Some(1)).await.unwrap().is_none());

    let err = client.set_vt::<Value>(&queue, 999_999, 5).await.unwrap_err();
    assert!(matches!(err, QueueError::MessageNotFound { .. }));

    client.drop_queue(&queue).await.unwrap();
}

#[tokio::test]
async fn test_concurrent_readers_never_share_a_message() {
    let Some(client) = common::client().await else {
        return;
    };
    let queue = common::queue_name("conc");
    client.create_queue(&queue).await.unwrap();

    for i in 0..20 {
        client.send(&queue, &json!({"i": i})).await.unwrap();
    }

    let mut handles = Vec::new();
    for _ in 0..4 {
        let client = client.clone();
        let queue = queue.clone();
        handles.push(tokio::spawn(async move {
            let mut seen = Vec::new();
            while let Some(msg) = client.read::<Value>(&queue, Some(30)).await.unwrap() {
                seen.push(msg.msg_id);
            }
            seen
        }));
    }

    let mut all = Vec::new();
    for handle in handles {
        all.extend(handle.await.unwrap());
    }
    let unique: HashSet<i64> = all.iter().copied().collect();
    assert_eq!(all.len(), 20);
    assert_eq!(unique.len(), 20);

    client.drop_queue(&queue).await.unwrap();
}
