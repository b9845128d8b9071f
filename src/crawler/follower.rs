//! Pagination follower
//!
//! Drives one cursor-paginated stream from a start URL to its last page:
//! fetch, emit the page to the batch writer, compute the next URL, repeat.
//! Pages of one stream are strictly sequential.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use super::fetcher::{ApiClient, Page};
use crate::endpoint::Endpoint;
use crate::output::{BatchWriter, HarvestStats};
use crate::state::{FollowerOutcome, FollowerState};
use crate::storage::CursorCheckpoint;

/// Follows pagination streams for one flow
///
/// Shared by every worker of the flow; each call to [`follow`](Self::follow)
/// is independent.
pub struct PaginationFollower {
    api: ApiClient,
    endpoint: Endpoint,
    writer: BatchWriter,
    stats: Arc<HarvestStats>,
    politeness_jitter: Duration,
    cancel: CancellationToken,
}

impl PaginationFollower {
    pub fn new(
        api: ApiClient,
        endpoint: Endpoint,
        writer: BatchWriter,
        stats: Arc<HarvestStats>,
        politeness_jitter: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            api,
            endpoint,
            writer,
            stats,
            politeness_jitter,
            cancel,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Follows one stream until it ends, fails or shutdown is requested
    ///
    /// When `checkpoint` is given, the next page URL (or the exhausted marker)
    /// is saved after every page has been appended.
    ///
    /// # Arguments
    ///
    /// * `target` - Label for log lines, e.g. "user 7"
    /// * `start` - First page to fetch
    /// * `checkpoint` - Cursor checkpoint of a single global stream
    pub async fn follow(
        &self,
        target: &str,
        start: Url,
        checkpoint: Option<&CursorCheckpoint>,
    ) -> FollowerOutcome {
        let mut url = start;
        let mut state = FollowerState::Fetching;
        let mut pending: Option<Page> = None;
        let mut pages = 0u64;
        let mut rows = 0u64;

        while !state.is_terminal() {
            let next = match state {
                FollowerState::Fetching => {
                    if self.cancel.is_cancelled() {
                        FollowerState::Interrupted
                    } else {
                        match self.api.fetch_page_with_retry(&url, &self.cancel).await {
                            Ok(page) => {
                                debug!(
                                    stream = target,
                                    url = %url,
                                    records = page.collection.len(),
                                    "Fetched page"
                                );
                                pending = Some(page);
                                FollowerState::Emitting
                            }
                            Err(e) if e.is_cancelled() => FollowerState::Interrupted,
                            Err(e) => {
                                warn!(stream = target, url = %url, "Abandoning stream: {}", e);
                                FollowerState::Failed
                            }
                        }
                    }
                }
                FollowerState::Emitting => {
                    let page = pending.take().unwrap_or_default();
                    pages += 1;
                    self.stats.record_page();
                    rows += self.writer.append(&page.collection).await;

                    match self.next_url(target, &url, page.next_cursor()) {
                        Some(next) => {
                            if let Some(checkpoint) = checkpoint {
                                checkpoint.save(next.as_ref().map(Url::as_str)).await;
                            }
                            match next {
                                Some(next) => {
                                    url = next;
                                    if self.pause().await {
                                        FollowerState::Fetching
                                    } else {
                                        FollowerState::Interrupted
                                    }
                                }
                                None => FollowerState::Done,
                            }
                        }
                        None => FollowerState::Failed,
                    }
                }
                terminal => terminal,
            };

            debug_assert!(
                state.can_transition_to(next),
                "illegal follower transition {} -> {}",
                state,
                next
            );
            state = next;
        }

        self.finish(target, state, pages, rows)
    }

    /// Resolves the page cursor
    ///
    /// `Some(None)` means the stream is exhausted, `None` that the cursor is
    /// unusable.
    fn next_url(
        &self,
        target: &str,
        current: &Url,
        cursor: Option<&str>,
    ) -> Option<Option<Url>> {
        let Some(cursor) = cursor else {
            return Some(None);
        };
        match self.endpoint.next_url(current, cursor) {
            Ok(next) => Some(Some(next)),
            Err(e) => {
                warn!(stream = target, url = %current, cursor, "Unusable next_href: {}", e);
                None
            }
        }
    }

    /// Politeness delay between two pages; false if shutdown cut it short
    async fn pause(&self) -> bool {
        let delay = self.politeness_delay();

        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }

    fn politeness_delay(&self) -> Duration {
        let jitter_ms = self.politeness_jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::rng().random_range(0..jitter_ms))
    }

    fn finish(&self, target: &str, state: FollowerState, pages: u64, rows: u64) -> FollowerOutcome {
        match state {
            FollowerState::Done => {
                self.stats.record_target_done();
                debug!(stream = target, pages, rows, "Stream exhausted");
            }
            FollowerState::Failed => {
                self.stats.record_target_failed();
                warn!(stream = target, pages, rows, "Stream failed");
            }
            _ => {
                self.stats.record_target_interrupted();
                info!(stream = target, pages, rows, "Stream interrupted");
            }
        }

        FollowerOutcome { state, pages, rows }
    }
}
