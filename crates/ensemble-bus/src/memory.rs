use crate::backend::QueueBackend;
use async_trait::async_trait;
use ensemble_core::EnsembleResult;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

#[derive(Default)]
struct Lane {
    items: VecDeque<String>,
    ready: Arc<Notify>,
}

/// In-process queue backend for tests and single-process deployments.
///
/// Waiting consumers park on a per-queue [`Notify`]; a push wakes one of them.
#[derive(Default)]
pub struct MemoryQueue {
    lanes: Mutex<HashMap<String, Lane>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the messages waiting in `queue`, head first.
    pub fn snapshot(&self, queue: &str) -> Vec<String> {
        self.lanes
            .lock()
            .get(queue)
            .map(|lane| lane.items.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn try_pop(&self, queue: &str) -> Result<String, Arc<Notify>> {
        let mut lanes = self.lanes.lock();
        let lane = lanes.entry(queue.to_string()).or_default();
        match lane.items.pop_front() {
            Some(item) => Ok(item),
            None => Err(lane.ready.clone()),
        }
    }
}

#[async_trait]
impl QueueBackend for MemoryQueue {
    async fn push(&self, queue: &str, payload: String) -> EnsembleResult<()> {
        let ready = {
            let mut lanes = self.lanes.lock();
            let lane = lanes.entry(queue.to_string()).or_default();
            lane.items.push_back(payload);
            lane.ready.clone()
        };
        ready.notify_one();
        Ok(())
    }

    async fn push_batch(&self, clear: &[String], items: Vec<(String, String)>) -> EnsembleResult<()> {
        let mut wake = Vec::with_capacity(items.len());
        {
            let mut lanes = self.lanes.lock();
            for queue in clear {
                if let Some(lane) = lanes.get_mut(queue) {
                    lane.items.clear();
                }
            }
            for (queue, payload) in items {
                let lane = lanes.entry(queue).or_default();
                lane.items.push_back(payload);
                wake.push(lane.ready.clone());
            }
        }
        for ready in wake {
            ready.notify_one();
        }
        Ok(())
    }

    async fn pop(&self, queue: &str) -> EnsembleResult<String> {
        loop {
            match self.try_pop(queue) {
                Ok(item) => return Ok(item),
                // A push between try_pop and here leaves a permit, so this wakes.
                Err(ready) => ready.notified().await,
            }
        }
    }

    async fn pop_timeout(&self, queue: &str, timeout: Duration) -> EnsembleResult<Option<String>> {
        // `pop` has no await between removing an item and returning it, so
        // dropping it on expiry cannot lose a message.
        match tokio::time::timeout(timeout, self.pop(queue)).await {
            Ok(result) => result.map(Some),
            Err(_) => Ok(None),
        }
    }

    async fn purge(&self, queue: &str) -> EnsembleResult<()> {
        let mut lanes = self.lanes.lock();
        if let Some(lane) = lanes.get_mut(queue) {
            lane.items.clear();
            // Keep the lane while a consumer still waits on its Notify.
            if Arc::strong_count(&lane.ready) == 1 {
                lanes.remove(queue);
            }
        }
        Ok(())
    }

    async fn len(&self, queue: &str) -> EnsembleResult<usize> {
        Ok(self
            .lanes
            .lock()
            .get(queue)
            .map_or(0, |lane| lane.items.len()))
    }

    async fn ping(&self) -> EnsembleResult<()> {
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fifo_order() {
        let q = MemoryQueue::new();
        q.push("q", "a".into()).await.unwrap();
        q.push("q", "b".into()).await.unwrap();
        q.push("q", "c".into()).await.unwrap();
        assert_eq!(q.pop("q").await.unwrap(), "a");
        assert_eq!(q.pop("q").await.unwrap(), "b");
        assert_eq!(q.pop("q").await.unwrap(), "c");
        assert_eq!(q.len("q").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_pop_waits_for_push() {
        let q = Arc::new(MemoryQueue::new());
        let consumer = {
            let q = q.clone();
            tokio::spawn(async move { q.pop("jobs").await.unwrap() })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!consumer.is_finished());
        q.push("jobs", "hello".into()).await.unwrap();
        assert_eq!(consumer.await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn test_competing_consumers_each_get_one() {
        let q = Arc::new(MemoryQueue::new());
        let mut handles = Vec::new();
        for _ in 0..4 {
            let q = q.clone();
            handles.push(tokio::spawn(async move { q.pop("work").await.unwrap() }));
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        for i in 0..4 {
            q.push("work", i.to_string()).await.unwrap();
        }
        let mut got = Vec::new();
        for h in handles {
            got.push(h.await.unwrap());
        }
        got.sort();
        assert_eq!(got, vec!["0", "1", "2", "3"]);
    }

    #[tokio::test]
    async fn test_pop_timeout_expires() {
        let q = MemoryQueue::new();
        let got = q.pop_timeout("empty", Duration::from_millis(20)).await.unwrap();
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn test_batch_and_purge() {
        let q = MemoryQueue::new();
        q.push("queue:b", "stale".into()).await.unwrap();
        q.push_batch(
            &["queue:b".to_string()],
            vec![
                ("queue:a".into(), "1".into()),
                ("queue:b".into(), "2".into()),
                ("queue:a".into(), "3".into()),
            ],
        )
        .await
        .unwrap();
        assert_eq!(q.snapshot("queue:a"), vec!["1", "3"]);
        assert_eq!(q.snapshot("queue:b"), vec!["2"]);

        q.purge("queue:a").await.unwrap();
        assert_eq!(q.len("queue:a").await.unwrap(), 0);
    }
}
