//! Crawler module: fetching and following paginated collections
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with failure classification
//! - Retry budget and backoff schedule
//! - The pagination follower state machine
//! - The bounded-concurrency worker pool
//! - Overall harvest coordination

mod coordinator;
mod fetcher;
mod follower;
mod pool;
mod retry;

pub use coordinator::{Flow, Harvester, RunEnd, RunMode, RunSummary};
pub use fetcher::{build_http_client, ApiClient, FetchError, Page};
pub use follower::PaginationFollower;
pub use pool::{BatchReport, WorkerPool};
pub use retry::{Backoff, RetryPolicy};
