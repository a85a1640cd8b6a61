//! Per-thread exclusive lock: a run drive holds this for its whole
//! duration so a fork or a concurrently-submitted drive for the same
//! thread can never observe a half-mutated history. One `Semaphore(1)` per
//! `ThreadId`, created on first use and left in the map (idle locks are
//! cheap; `prune_idle` reclaims ones nobody references any more).

use std::collections::HashMap;
use std::sync::Arc;

use agentcore_domain::ids::ThreadId;
use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Default)]
pub struct SessionLockMap {
    locks: Mutex<HashMap<ThreadId, Arc<Semaphore>>>,
}

impl SessionLockMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire exclusive ownership of `thread_id`'s history, waiting if
    /// another drive currently holds it.
    pub async fn acquire(&self, thread_id: ThreadId) -> OwnedSemaphorePermit {
        let semaphore = {
            let mut locks = self.locks.lock();
            locks.entry(thread_id).or_insert_with(|| Arc::new(Semaphore::new(1))).clone()
        };
        semaphore.acquire_owned().await.expect("session lock semaphore is never closed")
    }

    /// Drop map entries for threads nobody currently holds or waits on.
    pub fn prune_idle(&self) {
        let mut locks = self.locks.lock();
        locks.retain(|_, semaphore| Arc::strong_count(semaphore) > 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn sequential_access_to_the_same_thread_does_not_deadlock() {
        let locks = SessionLockMap::new();
        let thread = ThreadId::new();
        {
            let _permit = locks.acquire(thread).await;
        }
        let _permit = locks.acquire(thread).await;
    }

    #[tokio::test]
    async fn different_threads_acquire_concurrently() {
        let locks = Arc::new(SessionLockMap::new());
        let a = ThreadId::new();
        let b = ThreadId::new();
        let permit_a = locks.acquire(a).await;
        let fut = tokio::time::timeout(Duration::from_millis(50), locks.acquire(b));
        assert!(fut.await.is_ok(), "a different thread must not wait on thread a's lock");
        drop(permit_a);
    }

    #[tokio::test]
    async fn same_thread_waits_for_the_prior_holder_to_release() {
        let locks = Arc::new(SessionLockMap::new());
        let thread = ThreadId::new();
        let permit = locks.acquire(thread).await;

        let locks2 = locks.clone();
        let waiter = tokio::spawn(async move {
            let _permit = locks2.acquire(thread).await;
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished(), "second acquire must block while the first permit is held");
        drop(permit);
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn prune_idle_removes_unused_entries() {
        let locks = SessionLockMap::new();
        let thread = ThreadId::new();
        {
            let _permit = locks.acquire(thread).await;
        }
        locks.prune_idle();
        assert_eq!(locks.locks.lock().len(), 0);
    }
}
