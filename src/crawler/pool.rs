//! Bounded-concurrency worker pool
//!
//! Runs one task per seed identifier, at most `concurrency` of them at a time.
//! A failure or panic in one task never blocks or cancels the others, and a
//! batch is only reported complete when every identifier settled.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::state::{FollowerOutcome, FollowerState};

/// Tally of one batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub done: usize,
    pub failed: usize,
    /// Stopped by shutdown, or never started because of it
    pub interrupted: usize,
    pub pages: u64,
    pub rows: u64,
}

impl BatchReport {
    /// True when every identifier reached a settled state
    pub fn is_complete(&self) -> bool {
        self.interrupted == 0
    }

    pub fn total(&self) -> usize {
        self.done + self.failed + self.interrupted
    }

    fn record(&mut self, outcome: &FollowerOutcome) {
        match outcome.state {
            FollowerState::Done => self.done += 1,
            FollowerState::Failed => self.failed += 1,
            _ => self.interrupted += 1,
        }
        self.pages += outcome.pages;
        self.rows += outcome.rows;
    }
}

/// Semaphore-gated task pool sharing one cancellation token
#[derive(Debug, Clone)]
pub struct WorkerPool {
    concurrency: usize,
    cancel: CancellationToken,
}

impl WorkerPool {
    pub fn new(concurrency: usize, cancel: CancellationToken) -> Self {
        Self {
            concurrency: concurrency.max(1),
            cancel,
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Runs `work` once for every identifier and waits for all of them
    pub async fn run_batch<F, Fut>(&self, ids: Vec<u64>, work: F) -> BatchReport
    where
        F: Fn(u64) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = FollowerOutcome> + Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let work = Arc::new(work);
        let mut tasks = JoinSet::new();

        for id in ids {
            let semaphore = Arc::clone(&semaphore);
            let work = Arc::clone(&work);
            let cancel = self.cancel.clone();

            tasks.spawn(async move {
                let permit = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    permit = semaphore.acquire_owned() => permit.ok(),
                };
                let Some(_permit) = permit else {
                    return (id, None);
                };
                if cancel.is_cancelled() {
                    return (id, None);
                }
                (id, Some(work(id).await))
            });
        }

        let mut report = BatchReport::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((id, Some(outcome))) => {
                    debug!(id, state = %outcome.state, rows = outcome.rows, "Worker finished");
                    report.record(&outcome);
                }
                Ok((id, None)) => {
                    debug!(id, "Worker skipped by shutdown");
                    report.interrupted += 1;
                }
                Err(e) => {
                    error!("Worker task panicked: {}", e);
                    report.failed += 1;
                }
            }
        }

        report
    }
}
