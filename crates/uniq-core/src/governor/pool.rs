//! Bounded worker pools with first-come admission.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tokio::time::Instant;

use super::JobClass;
use crate::error::AdmissionDenied;

/// A fixed number of slots for one job class. Waiters are admitted in
/// arrival order (the underlying semaphore is fair).
#[derive(Debug, Clone)]
pub struct WorkerPool {
    class: JobClass,
    capacity: usize,
    semaphore: Arc<Semaphore>,
    admission_timeout: Duration,
}

/// One occupied slot. The slot is released exactly once, when the ticket
/// is dropped.
#[derive(Debug)]
pub struct PoolTicket {
    class: JobClass,
    acquired_at: Instant,
    _permit: OwnedSemaphorePermit,
}

impl PoolTicket {
    pub fn class(&self) -> JobClass {
        self.class
    }

    /// How long the slot has been held.
    pub fn held_for(&self) -> Duration {
        self.acquired_at.elapsed()
    }
}

impl Drop for PoolTicket {
    fn drop(&mut self) {
        tracing::trace!("{} slot released after {:?}", self.class, self.held_for());
    }
}

impl WorkerPool {
    pub fn new(class: JobClass, capacity: usize, admission_timeout: Duration) -> Self {
        let capacity = capacity.max(1);
        Self {
            class,
            capacity,
            semaphore: Arc::new(Semaphore::new(capacity)),
            admission_timeout,
        }
    }

    /// Wait for a free slot, up to the admission timeout.
    pub async fn acquire(&self) -> Result<PoolTicket, AdmissionDenied> {
        let start = Instant::now();
        let acquire = self.semaphore.clone().acquire_owned();
        let permit = match tokio::time::timeout(self.admission_timeout, acquire).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(AdmissionDenied::PoolClosed(self.class)),
            Err(_) => {
                let waited_ms = start.elapsed().as_millis() as u64;
                tracing::warn!("{} pool saturated after {}ms", self.class, waited_ms);
                return Err(AdmissionDenied::PoolSaturated {
                    class: self.class,
                    waited_ms,
                });
            }
        };
        Ok(self.ticket(permit, start))
    }

    /// Take a slot only if one is free right now.
    pub fn try_acquire(&self) -> Result<PoolTicket, AdmissionDenied> {
        match self.semaphore.clone().try_acquire_owned() {
            Ok(permit) => Ok(self.ticket(permit, Instant::now())),
            Err(TryAcquireError::Closed) => Err(AdmissionDenied::PoolClosed(self.class)),
            Err(TryAcquireError::NoPermits) => Err(AdmissionDenied::PoolSaturated {
                class: self.class,
                waited_ms: 0,
            }),
        }
    }

    fn ticket(&self, permit: OwnedSemaphorePermit, requested_at: Instant) -> PoolTicket {
        let now = Instant::now();
        tracing::trace!(
            "{} slot acquired after {:?} ({}/{} in flight)",
            self.class,
            now - requested_at,
            self.in_flight(),
            self.capacity
        );
        PoolTicket {
            class: self.class,
            acquired_at: now,
            _permit: permit,
        }
    }

    /// Stop admitting. Waiters and later callers get `PoolClosed`; held
    /// tickets stay valid until dropped.
    pub fn close(&self) {
        self.semaphore.close();
    }

    pub fn class(&self) -> JobClass {
        self.class
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn in_flight(&self) -> usize {
        self.capacity.saturating_sub(self.available())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ticket_released_on_drop() {
        let pool = WorkerPool::new(JobClass::Image, 2, Duration::from_secs(1));
        let a = pool.acquire().await.unwrap();
        let _b = pool.acquire().await.unwrap();
        assert_eq!(pool.in_flight(), 2);
        assert!(pool.try_acquire().is_err());

        drop(a);
        assert_eq!(pool.available(), 1);
        assert!(pool.try_acquire().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_saturated_after_timeout() {
        let pool = WorkerPool::new(JobClass::Video, 1, Duration::from_millis(500));
        let _held = pool.acquire().await.unwrap();
        let err = pool.acquire().await.unwrap_err();
        assert!(matches!(
            err,
            AdmissionDenied::PoolSaturated {
                class: JobClass::Video,
                waited_ms,
            } if waited_ms >= 500
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiters_admitted_in_order() {
        let pool = WorkerPool::new(JobClass::Network, 1, Duration::from_secs(60));
        let held = pool.acquire().await.unwrap();
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for i in 0..3 {
            let pool = pool.clone();
            let order = order.clone();
            handles.push(tokio::spawn(async move {
                let _t = pool.acquire().await.unwrap();
                order.lock().unwrap().push(i);
                tokio::time::sleep(Duration::from_millis(10)).await;
            }));
            // Let each waiter enqueue before the next one spawns.
            tokio::task::yield_now().await;
        }
        drop(held);
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_closed_pool_rejects() {
        let pool = WorkerPool::new(JobClass::Image, 1, Duration::from_secs(1));
        pool.close();
        assert_eq!(
            pool.acquire().await.unwrap_err(),
            AdmissionDenied::PoolClosed(JobClass::Image)
        );
    }
}
