/// The process-wide stream concurrency cap. A single `StreamSemaphore` is
/// constructed once in `main` and shared via `Arc`; a stream controller that
/// constructed its own semaphore would defeat the cap across sessions.
use std::sync::Arc;
use tokio::sync::{Semaphore, SemaphorePermit};

pub struct StreamSemaphore {
    inner: Semaphore,
}

impl StreamSemaphore {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            inner: Semaphore::new(max_concurrent),
        }
    }

    pub fn available_permits(&self) -> usize {
        self.inner.available_permits()
    }

    /// Waits (cooperatively, cancellation-safe) for a permit. Held for the
    /// session's lifetime; dropping it releases the slot, so callers should
    /// keep it alive in the driver task's scope, not leak it elsewhere.
    pub async fn acquire(self: &Arc<Self>) -> StreamPermit<'_> {
        let permit = self.inner.acquire().await.expect("semaphore never closed");
        StreamPermit { _permit: permit }
    }
}

pub struct StreamPermit<'a> {
    _permit: SemaphorePermit<'a>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn at_most_max_concurrent_permits_are_held_at_once() {
        let sem = Arc::new(StreamSemaphore::new(2));
        let p1 = sem.acquire().await;
        let p2 = sem.acquire().await;
        assert_eq!(sem.available_permits(), 0);

        let sem2 = sem.clone();
        let third = tokio::spawn(async move {
            let _p3 = sem2.acquire().await;
        });

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!third.is_finished());

        drop(p1);
        third.await.unwrap();
        drop(p2);
    }
}
