use std::collections::VecDeque;
use tokio::sync::Mutex;
use tracing::debug;

/// Bounded, thread-safe FIFO that decouples ingestion rate from processing
/// rate. Deliberately non-durable: a drained-but-unprocessed item is not
/// reclaimed here. Recovery rides on the queue's unacknowledged-message
/// redelivery, so durability stays owned by the queue, not the accumulator.
pub struct BatchAccumulator<T> {
    queue: Mutex<VecDeque<T>>,
    capacity: usize,
}

impl<T> BatchAccumulator<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Enqueue an item. A full accumulator rejects the offer and hands the
    /// item back so the caller can apply backpressure (negative
    /// acknowledgment) upstream without losing it.
    pub async fn offer(&self, item: T) -> Result<(), T> {
        let mut queue = self.queue.lock().await;
        if queue.len() >= self.capacity {
            debug!(capacity = self.capacity, "accumulator full, rejecting offer");
            return Err(item);
        }
        queue.push_back(item);
        Ok(())
    }

    /// Remove and return up to `max` items in FIFO order. Used exclusively
    /// by the scheduled flush; an item is never drained twice.
    pub async fn drain(&self, max: usize) -> Vec<T> {
        let mut queue = self.queue.lock().await;
        let count = max.min(queue.len());
        queue.drain(..count).collect()
    }

    pub async fn len(&self) -> usize {
        self.queue.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.queue.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_offer_rejects_and_returns_the_item_when_full() {
        let accumulator = BatchAccumulator::new(2);
        assert!(accumulator.offer(1).await.is_ok());
        assert!(accumulator.offer(2).await.is_ok());
        assert_eq!(accumulator.offer(3).await, Err(3));
        assert_eq!(accumulator.len().await, 2);
    }

    #[tokio::test]
    async fn test_drain_is_fifo_and_leaves_the_rest() {
        let accumulator = BatchAccumulator::new(10);
        for n in 1..=5 {
            accumulator.offer(n).await.unwrap();
        }

        let drained = accumulator.drain(3).await;
        assert_eq!(drained, vec![1, 2, 3]);
        assert_eq!(accumulator.len().await, 2);

        let rest = accumulator.drain(10).await;
        assert_eq!(rest, vec![4, 5]);
        assert!(accumulator.is_empty().await);
    }

    #[tokio::test]
    async fn test_no_item_is_drained_twice_under_concurrency() {
        let accumulator = Arc::new(BatchAccumulator::new(1000));
        for n in 0..1000u32 {
            accumulator.offer(n).await.unwrap();
        }

        let mut handles = Vec::new();
        for _ in 0..10 {
            let accumulator = Arc::clone(&accumulator);
            handles.push(tokio::spawn(
                async move { accumulator.drain(100).await },
            ));
        }

        let mut seen = std::collections::BTreeSet::new();
        for handle in handles {
            for item in handle.await.unwrap() {
                assert!(seen.insert(item), "item {} drained twice", item);
            }
        }
        assert_eq!(seen.len(), 1000);
    }
}
