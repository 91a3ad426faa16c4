// src/queue/mod.rs
// Batched, merged, ordered write queue.
//
// Enqueue returns a receiver that resolves once the batch containing this
// write has been durably persisted. Writes to the same id with
// operation=update are merged (later fields win); merging ignores priority.
// Within a batch, operations execute in enqueue order under a single
// `withLock(write:<resource>)` — here, a single call into the store's
// batch-apply path rather than one lock per item.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::{CortexError, Result};
use crate::record::MemoryRecord;

#[derive(Debug, Clone)]
pub enum BatchOp {
    Append(MemoryRecord),
    Update { id: String, patch: Value },
    SoftDelete { id: String },
}

impl BatchOp {
    fn merge_key(&self) -> Option<&str> {
        match self {
            BatchOp::Update { id, .. } => Some(id.as_str()),
            _ => None,
        }
    }
}

/// Implemented by whatever owns the actual tier stores; the queue itself
/// holds no storage state, only ordering and batching policy.
#[async_trait]
pub trait BatchExecutor: Send + Sync {
    async fn apply_batch(
        &self,
        resource: &str,
        ops: Vec<BatchOp>,
    ) -> Vec<std::result::Result<MemoryRecord, String>>;
}

type Completion = oneshot::Sender<std::result::Result<MemoryRecord, String>>;

struct PendingItem {
    op: BatchOp,
    priority: i32,
    seq: u64,
    senders: Vec<Completion>,
}

#[derive(Default)]
struct ResourceQueue {
    items: Vec<PendingItem>,
    timer: Option<JoinHandle<()>>,
}

#[derive(Debug, Clone)]
pub struct WriteQueueConfig {
    pub batch_size: usize,
    pub batch_delay_ms: u64,
    pub capacity: usize,
}

impl Default for WriteQueueConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            batch_delay_ms: 250,
            capacity: 10_000,
        }
    }
}

pub struct WriteQueue {
    executor: Arc<dyn BatchExecutor>,
    queues: Arc<Mutex<HashMap<String, ResourceQueue>>>,
    config: WriteQueueConfig,
    seq: AtomicU64,
}

impl WriteQueue {
    pub fn new(executor: Arc<dyn BatchExecutor>, config: WriteQueueConfig) -> Arc<Self> {
        Arc::new(Self {
            executor,
            queues: Arc::new(Mutex::new(HashMap::new())),
            config,
            seq: AtomicU64::new(0),
        })
    }

    /// Enqueue one operation with a given priority (lower = earlier).
    /// Returns synchronously with an error if the resource's queue is at
    /// capacity; otherwise returns a receiver that resolves when the batch
    /// persists (or carries the batch's rejection reason).
    pub async fn enqueue(
        self: &Arc<Self>,
        resource: &str,
        op: BatchOp,
        priority: i32,
    ) -> Result<oneshot::Receiver<std::result::Result<MemoryRecord, String>>> {
        let (tx, rx) = oneshot::channel();
        let mut queues = self.queues.lock().await;
        let rq = queues.entry(resource.to_string()).or_default();

        if rq.items.len() >= self.config.capacity {
            return Err(CortexError::QueueFull(resource.to_string()));
        }

        if let Some(key) = op.merge_key()
            && let Some(existing) = rq
                .items
                .iter_mut()
                .find(|item| item.op.merge_key() == Some(key))
        {
            if let (BatchOp::Update { patch: existing_patch, .. }, BatchOp::Update { patch: new_patch, .. }) =
                (&mut existing.op, &op)
            {
                merge_patch(existing_patch, new_patch);
            }
            existing.senders.push(tx);
            return Ok(rx);
        }

        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let should_flush_now = rq.items.len() + 1 >= self.config.batch_size;
        rq.items.push(PendingItem {
            op,
            priority,
            seq,
            senders: vec![tx],
        });

        if rq.items.len() == 1 && !should_flush_now {
            let this = self.clone();
            let resource = resource.to_string();
            let delay = Duration::from_millis(self.config.batch_delay_ms);
            rq.timer = Some(tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                this.flush(&resource).await;
            }));
        }
        drop(queues);

        if should_flush_now {
            self.flush(resource).await;
        }

        Ok(rx)
    }

    /// Flush one resource's queue now, regardless of size/timer state.
    pub async fn flush(self: &Arc<Self>, resource: &str) {
        let rq = {
            let mut queues = self.queues.lock().await;
            let Some(mut rq) = queues.remove(resource) else {
                return;
            };
            if let Some(timer) = rq.timer.take() {
                timer.abort();
            }
            rq
        };
        if rq.items.is_empty() {
            return;
        }

        let mut items = rq.items;
        items.sort_by(|a, b| a.priority.cmp(&b.priority).then(a.seq.cmp(&b.seq)));

        let ops: Vec<BatchOp> = items.iter().map(|i| i.op.clone()).collect();
        debug!(resource, batch_size = ops.len(), "flushing write batch");
        let results = self.executor.apply_batch(resource, ops).await;

        for (item, result) in items.into_iter().zip(results.into_iter()) {
            for sender in item.senders {
                let _ = sender.send(result.clone());
            }
        }
    }

    /// Flush every resource with pending items.
    pub async fn flush_all(self: &Arc<Self>) {
        let resources: Vec<String> = {
            let queues = self.queues.lock().await;
            queues.keys().cloned().collect()
        };
        for resource in resources {
            self.flush(&resource).await;
        }
    }
}

fn merge_patch(base: &mut Value, incoming: &Value) {
    match (base, incoming) {
        (Value::Object(base_map), Value::Object(incoming_map)) => {
            for (k, v) in incoming_map {
                base_map.insert(k.clone(), v.clone());
            }
        }
        (slot, incoming) => {
            *slot = incoming.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordType;
    use std::sync::atomic::AtomicUsize;

    struct CountingExecutor {
        calls: AtomicUsize,
        fail_ids: Vec<String>,
    }

    #[async_trait]
    impl BatchExecutor for CountingExecutor {
        async fn apply_batch(
            &self,
            _resource: &str,
            ops: Vec<BatchOp>,
        ) -> Vec<std::result::Result<MemoryRecord, String>> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            ops.into_iter()
                .map(|op| match op {
                    BatchOp::Append(r) => {
                        if self.fail_ids.contains(&r.id) {
                            Err(format!("failed {}", r.id))
                        } else {
                            Ok(r)
                        }
                    }
                    BatchOp::Update { id, .. } | BatchOp::SoftDelete { id } => {
                        Ok(MemoryRecord::new(id, RecordType::Learning, "x", "jsonl:working"))
                    }
                })
                .collect()
        }
    }

    #[tokio::test]
    async fn batch_size_triggers_immediate_flush() {
        let exec = Arc::new(CountingExecutor { calls: AtomicUsize::new(0), fail_ids: vec![] });
        let queue = WriteQueue::new(exec.clone(), WriteQueueConfig { batch_size: 2, batch_delay_ms: 60_000, capacity: 100 });
        let r1 = MemoryRecord::new("jsonl:a", RecordType::Learning, "x", "jsonl:working");
        let r2 = MemoryRecord::new("jsonl:b", RecordType::Learning, "x", "jsonl:working");
        let rx1 = queue.enqueue("working", BatchOp::Append(r1), 5).await.unwrap();
        let rx2 = queue.enqueue("working", BatchOp::Append(r2), 5).await.unwrap();
        let res1 = rx1.await.unwrap();
        let res2 = rx2.await.unwrap();
        assert!(res1.is_ok());
        assert!(res2.is_ok());
        assert_eq!(exec.calls.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn merged_updates_resolve_together() {
        let exec = Arc::new(CountingExecutor { calls: AtomicUsize::new(0), fail_ids: vec![] });
        let queue = WriteQueue::new(exec.clone(), WriteQueueConfig { batch_size: 10, batch_delay_ms: 20, capacity: 100 });
        let rx1 = queue
            .enqueue("working", BatchOp::Update { id: "jsonl:a".into(), patch: serde_json::json!({"a": 1}) }, 5)
            .await
            .unwrap();
        let rx2 = queue
            .enqueue("working", BatchOp::Update { id: "jsonl:a".into(), patch: serde_json::json!({"b": 2}) }, 5)
            .await
            .unwrap();
        rx1.await.unwrap().unwrap();
        rx2.await.unwrap().unwrap();
        // one merged item -> exactly one op executed
        assert_eq!(exec.calls.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn one_failure_does_not_fail_siblings() {
        let exec = Arc::new(CountingExecutor { calls: AtomicUsize::new(0), fail_ids: vec!["jsonl:bad".to_string()] });
        let queue = WriteQueue::new(exec.clone(), WriteQueueConfig { batch_size: 2, batch_delay_ms: 60_000, capacity: 100 });
        let good = MemoryRecord::new("jsonl:good", RecordType::Learning, "x", "jsonl:working");
        let bad = MemoryRecord::new("jsonl:bad", RecordType::Learning, "x", "jsonl:working");
        let rx_good = queue.enqueue("working", BatchOp::Append(good), 5).await.unwrap();
        let rx_bad = queue.enqueue("working", BatchOp::Append(bad), 5).await.unwrap();
        assert!(rx_good.await.unwrap().is_ok());
        assert!(rx_bad.await.unwrap().is_err());
    }

    #[tokio::test]
    async fn capacity_exceeded_fails_synchronously() {
        let exec = Arc::new(CountingExecutor { calls: AtomicUsize::new(0), fail_ids: vec![] });
        let queue = WriteQueue::new(exec, WriteQueueConfig { batch_size: 100, batch_delay_ms: 60_000, capacity: 1 });
        let r1 = MemoryRecord::new("jsonl:a", RecordType::Learning, "x", "jsonl:working");
        let r2 = MemoryRecord::new("jsonl:b", RecordType::Learning, "x", "jsonl:working");
        let _rx1 = queue.enqueue("working", BatchOp::Append(r1), 5).await.unwrap();
        let err = queue.enqueue("working", BatchOp::Append(r2), 5).await;
        assert!(err.is_err());
    }
}
