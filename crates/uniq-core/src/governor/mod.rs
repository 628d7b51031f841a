//! Resource governor: bounded per-class worker pools plus per-user rate
//! limiting. The governor never looks at job content; it only gates by job
//! class and caller identity.

mod pool;
mod rate;

pub use pool::{PoolTicket, WorkerPool};
pub use rate::{MemoryRateStore, RateLimiter, RateStats, RateStore, UserId, UserRecord};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{PoolsConfig, RateConfig};
use crate::error::AdmissionDenied;

/// Pool selector. Video transcodes are CPU-heavy and get their own pool so
/// they cannot starve image or network work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobClass {
    Video,
    Image,
    Network,
}

impl fmt::Display for JobClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Video => write!(f, "video"),
            Self::Image => write!(f, "image"),
            Self::Network => write!(f, "network"),
        }
    }
}

/// Shared admission control. Clones share the same pools and rate state.
#[derive(Clone)]
pub struct Governor {
    video: WorkerPool,
    image: WorkerPool,
    network: WorkerPool,
    rate: Arc<RateLimiter>,
}

impl Governor {
    pub fn new(pools: &PoolsConfig, rate: &RateConfig) -> Self {
        let timeout = Duration::from_millis(pools.admission_timeout_ms);
        Self {
            video: WorkerPool::new(JobClass::Video, pools.video_workers, timeout),
            image: WorkerPool::new(JobClass::Image, pools.image_workers, timeout),
            network: WorkerPool::new(JobClass::Network, pools.network_workers, timeout),
            rate: Arc::new(RateLimiter::from_config(rate)),
        }
    }

    pub fn pool(&self, class: JobClass) -> &WorkerPool {
        match class {
            JobClass::Video => &self.video,
            JobClass::Image => &self.image,
            JobClass::Network => &self.network,
        }
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate
    }

    /// Run an async task once a `class` slot is free. The slot is held
    /// until the task finishes; dropping the returned future does not
    /// cancel a task that has already been admitted.
    pub async fn submit<F, T>(&self, class: JobClass, task: F) -> Result<T, AdmissionDenied>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let ticket = self.pool(class).acquire().await?;
        let handle = tokio::spawn(async move {
            let _ticket = ticket;
            task.await
        });
        join(handle, class).await
    }

    /// Run a CPU-bound closure on the blocking thread pool once a `class`
    /// slot is free.
    pub async fn submit_blocking<F, T>(&self, class: JobClass, task: F) -> Result<T, AdmissionDenied>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let ticket = self.pool(class).acquire().await?;
        let handle = tokio::task::spawn_blocking(move || {
            let _ticket = ticket;
            task()
        });
        join(handle, class).await
    }

    pub fn check_rate(&self, user: UserId) -> Result<(), AdmissionDenied> {
        self.rate.check_rate(user)
    }

    pub fn ban(&self, user: UserId, duration: Duration) {
        self.rate.ban(user, duration);
    }

    pub fn unban(&self, user: UserId) {
        self.rate.unban(user);
    }

    /// Stop admitting new work in every pool.
    pub fn shutdown(&self) {
        self.video.close();
        self.image.close();
        self.network.close();
    }
}

async fn join<T>(
    handle: tokio::task::JoinHandle<T>,
    class: JobClass,
) -> Result<T, AdmissionDenied> {
    match handle.await {
        Ok(value) => Ok(value),
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(_) => Err(AdmissionDenied::PoolClosed(class)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn governor(video: usize) -> Governor {
        let pools = PoolsConfig {
            video_workers: video,
            image_workers: 4,
            network_workers: 2,
            admission_timeout_ms: 60_000,
        };
        Governor::new(&pools, &RateConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_pool_bounds_concurrency() {
        let gov = governor(2);
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..6)
            .map(|_| {
                let gov = gov.clone();
                let current = current.clone();
                let peak = peak.clone();
                tokio::spawn(async move {
                    gov.submit(JobClass::Video, async move {
                        let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        current.fetch_sub(1, Ordering::SeqCst);
                    })
                    .await
                })
            })
            .collect();
        for t in tasks {
            t.await.unwrap().unwrap();
        }
        assert_eq!(peak.load(Ordering::SeqCst), 2);
        assert_eq!(gov.pool(JobClass::Video).in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_classes_do_not_share_slots() {
        let gov = governor(1);
        let _video = gov.pool(JobClass::Video).acquire().await.unwrap();
        let out = gov.submit(JobClass::Image, async { 7 }).await.unwrap();
        assert_eq!(out, 7);
    }

    #[tokio::test]
    async fn test_blocking_task_releases_ticket() {
        let gov = governor(1);
        let value = gov
            .submit_blocking(JobClass::Image, || 40 + 2)
            .await
            .unwrap();
        assert_eq!(value, 42);
        assert_eq!(gov.pool(JobClass::Image).in_flight(), 0);
    }

    #[tokio::test]
    async fn test_ticket_released_when_task_fails() {
        let gov = governor(1);
        let result: Result<Result<(), String>, _> = gov
            .submit(JobClass::Video, async { Err("boom".to_string()) })
            .await;
        assert!(result.unwrap().is_err());
        assert_eq!(gov.pool(JobClass::Video).available(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_rejects_new_work() {
        let gov = governor(1);
        gov.shutdown();
        let err = gov.submit(JobClass::Network, async {}).await.unwrap_err();
        assert_eq!(err, AdmissionDenied::PoolClosed(JobClass::Network));
    }

    #[test]
    fn test_job_class_display() {
        assert_eq!(JobClass::Video.to_string(), "video");
        assert_eq!(JobClass::Network.to_string(), "network");
    }
}
