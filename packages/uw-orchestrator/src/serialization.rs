//! Per-underwriting serialization: an in-process keyed lock so concurrent
//! workflows for the *same* underwriting never interleave their
//! filtration/execution/consolidation sequence, while different
//! underwritings still run fully in parallel.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uw_core::domain::UnderwritingId;

#[derive(Default)]
pub struct UnderwritingLocks {
    locks: DashMap<UnderwritingId, Arc<Mutex<()>>>,
}

impl UnderwritingLocks {
    pub fn new() -> Self {
        Self::default()
    }

    async fn entry(&self, id: UnderwritingId) -> Arc<Mutex<()>> {
        Arc::clone(self.locks.entry(id).or_insert_with(|| Arc::new(Mutex::new(()))).value())
    }

    /// Holds the per-underwriting lock until the returned guard is dropped.
    pub async fn acquire(&self, id: UnderwritingId) -> OwnedMutexGuard<()> {
        let mutex = self.entry(id).await;
        mutex.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn same_underwriting_is_serialized() {
        let locks = Arc::new(UnderwritingLocks::new());
        let id = UnderwritingId::new();
        let counter = Arc::new(AtomicU32::new(0));
        let max_concurrent = Arc::new(AtomicU32::new(0));

        let mut handles = vec![];
        for _ in 0..5 {
            let locks = Arc::clone(&locks);
            let counter = Arc::clone(&counter);
            let max_concurrent = Arc::clone(&max_concurrent);
            handles.push(tokio::spawn(async move {
                let _guard = locks.acquire(id).await;
                let current = counter.fetch_add(1, Ordering::SeqCst) + 1;
                max_concurrent.fetch_max(current, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                counter.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(max_concurrent.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn different_underwritings_run_concurrently() {
        let locks = Arc::new(UnderwritingLocks::new());
        let max_concurrent = Arc::new(AtomicU32::new(0));
        let counter = Arc::new(AtomicU32::new(0));

        let mut handles = vec![];
        for _ in 0..5 {
            let locks = Arc::clone(&locks);
            let counter = Arc::clone(&counter);
            let max_concurrent = Arc::clone(&max_concurrent);
            let id = UnderwritingId::new();
            handles.push(tokio::spawn(async move {
                let _guard = locks.acquire(id).await;
                let current = counter.fetch_add(1, Ordering::SeqCst) + 1;
                max_concurrent.fetch_max(current, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                counter.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert!(max_concurrent.load(Ordering::SeqCst) > 1);
    }
}
