//! Back-pressure for embedding service calls.

use std::sync::Arc;

use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::time::{sleep_until, Duration, Instant};

use crate::error::{PipelineError, PipelineResult};

/// Bounds how hard a batch run leans on the embedding service.
///
/// At most `max_concurrency` calls are in flight at once, and when a
/// minimum interval is set, consecutive calls start at least that far
/// apart. Clones share the same budget.
#[derive(Debug, Clone)]
pub struct RequestLimiter {
    semaphore: Arc<Semaphore>,
    interval: Duration,
    next_start: Arc<Mutex<Option<Instant>>>,
}

/// Held for the duration of one service call.
#[derive(Debug)]
pub struct RequestPermit {
    _permit: OwnedSemaphorePermit,
}

impl RequestLimiter {
    /// Allow `max_concurrency` concurrent calls. Zero is treated as one.
    pub fn new(max_concurrency: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrency.max(1))),
            interval: Duration::ZERO,
            next_start: Arc::new(Mutex::new(None)),
        }
    }

    /// Space call starts at least `interval` apart.
    #[must_use]
    pub fn with_min_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Number of calls that could start right now.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Wait for a free slot, then for the pacing interval if one is set.
    ///
    /// # Errors
    /// Returns [`PipelineError::LimiterClosed`] if the limiter was closed.
    pub async fn acquire(&self) -> PipelineResult<RequestPermit> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| PipelineError::LimiterClosed)?;

        if !self.interval.is_zero() {
            let start = {
                let mut next = self.next_start.lock().await;
                let now = Instant::now();
                let start = next.map_or(now, |at| at.max(now));
                *next = Some(start + self.interval);
                start
            };
            sleep_until(start).await;
        }

        Ok(RequestPermit { _permit: permit })
    }

    /// Refuse all further acquisitions. Waiters get `LimiterClosed`.
    pub fn close(&self) {
        self.semaphore.close();
    }
}
