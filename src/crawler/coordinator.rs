//! Harvest coordinator - main crawl orchestration logic
//!
//! [`Harvester`] owns every resource of a run (API client, analytical store,
//! seed source, checkpoint backend, statistics, shutdown token). It is built
//! once, drives one flow, and is closed on every exit path.
//!
//! - `followers`: one global stream, cursor checkpoint saved after every page
//! - `tracks` / `snowball`: seed batches fanned out over the worker pool,
//!   `{offset, limit}` checkpoint saved after every fully settled batch

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use url::Url;

use super::fetcher::ApiClient;
use super::follower::PaginationFollower;
use super::pool::WorkerPool;
use super::retry::RetryPolicy;
use crate::config::{Config, SeededFlowConfig};
use crate::endpoint::{Collection, Endpoint};
use crate::output::{BatchWriter, ClickHouseClient, HarvestStats, RowSink, StatsSnapshot};
use crate::seed::{ClickHouseSeedSource, SeedSource};
use crate::state::{FollowerOutcome, FollowerState};
use crate::storage::{
    open_backend, CheckpointBackend, CursorCheckpoint, CursorPosition, OffsetCheckpoint,
    OffsetLimit,
};
use crate::transform::{Schema, TRACK_SCHEMA, USER_SCHEMA};
use crate::{ConfigError, Result};

/// The harvesting flows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum Flow {
    /// Followers of one configured user, as a single stream
    Followers,
    /// Tracks of every seed user
    Tracks,
    /// Followers of every seed user
    Snowball,
}

impl Flow {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Followers => "followers",
            Self::Tracks => "tracks",
            Self::Snowball => "snowball",
        }
    }

    /// Collection fetched per target
    pub fn collection(&self) -> Collection {
        match self {
            Self::Followers | Self::Snowball => Collection::Followers,
            Self::Tracks => Collection::Tracks,
        }
    }

    /// Layout of the rows this flow writes
    pub fn schema(&self) -> Schema {
        match self {
            Self::Followers | Self::Snowball => USER_SCHEMA,
            Self::Tracks => TRACK_SCHEMA,
        }
    }
}

impl fmt::Display for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a run starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// From the last checkpoint, or the beginning if there is none
    #[default]
    Resume,
    /// From the beginning, regardless of any checkpoint
    Fresh,
}

/// Why a run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEnd {
    /// The stream or the seed source ran out
    Exhausted,
    /// The checkpoint already marked the stream as exhausted
    AlreadyExhausted,
    /// The seed offset passed `crawler.max-offset`
    OffsetLimit,
    /// The global stream failed for good
    Failed,
    /// Shutdown was requested
    Interrupted,
}

/// Result of [`Harvester::run`]
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub flow: Flow,
    pub end: RunEnd,
    pub stats: StatsSnapshot,
    pub elapsed: Duration,
}

/// Resource-lifecycle object for one flow
pub struct Harvester {
    flow: Flow,
    config: Arc<Config>,
    api: ApiClient,
    sink: Arc<dyn RowSink>,
    seeds: Option<Arc<dyn SeedSource>>,
    checkpoints: Arc<dyn CheckpointBackend>,
    stats: Arc<HarvestStats>,
    cancel: CancellationToken,
}

impl Harvester {
    /// Connects every resource the flow needs
    ///
    /// # Arguments
    ///
    /// * `config` - Validated configuration, with the client id filled in
    /// * `flow` - Flow to run
    pub async fn connect(config: Config, flow: Flow) -> Result<Self> {
        let timeout = Duration::from_secs(config.api.request_timeout_secs);
        let clickhouse = ClickHouseClient::new(&config.clickhouse, timeout)?;

        let seeds: Option<Arc<dyn SeedSource>> = match flow {
            Flow::Followers => None,
            Flow::Tracks | Flow::Snowball => {
                let flow_config = seeded_config(&config, flow);
                Some(Arc::new(ClickHouseSeedSource::new(
                    clickhouse.clone(),
                    flow_config.seed_table.clone(),
                    flow_config.seed_order_by.clone(),
                )))
            }
        };

        let checkpoints = open_backend(&config.checkpoint).await?;
        info!(
            "Connected: store {} (database {}), {} checkpoints",
            config.clickhouse.url,
            clickhouse.database(),
            checkpoints.name()
        );

        Self::with_parts(config, flow, Arc::new(clickhouse), seeds, checkpoints)
    }

    /// Assembles a harvester from already connected parts
    pub fn with_parts(
        config: Config,
        flow: Flow,
        sink: Arc<dyn RowSink>,
        seeds: Option<Arc<dyn SeedSource>>,
        checkpoints: Arc<dyn CheckpointBackend>,
    ) -> Result<Self> {
        if config.api.client_id.trim().is_empty() {
            return Err(ConfigError::Validation(
                "api.client-id is required (config, --client-id or HARVESTER_CLIENT_ID)"
                    .to_string(),
            )
            .into());
        }
        if flow != Flow::Followers && seeds.is_none() {
            return Err(ConfigError::Validation(format!(
                "the {} flow needs a seed source",
                flow
            ))
            .into());
        }

        let api = ApiClient::new(&config.api, RetryPolicy::from(&config.retry))?;

        Ok(Self {
            flow,
            config: Arc::new(config),
            api,
            sink,
            seeds,
            checkpoints,
            stats: Arc::new(HarvestStats::new()),
            cancel: CancellationToken::new(),
        })
    }

    pub fn flow(&self) -> Flow {
        self.flow
    }

    /// Token that stops the run between units of work when cancelled
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Runs the flow until it is exhausted, fails or is interrupted
    pub async fn run(&self, mode: RunMode) -> Result<RunSummary> {
        let started = Instant::now();
        info!("Starting {} flow ({:?})", self.flow, mode);

        let end = match self.flow {
            Flow::Followers => self.run_followers(mode).await?,
            Flow::Tracks | Flow::Snowball => self.run_seeded(mode).await?,
        };

        let summary = RunSummary {
            flow: self.flow,
            end,
            stats: self.stats.snapshot(),
            elapsed: started.elapsed(),
        };
        info!(
            "{} flow stopped ({:?}) after {:.1}s",
            self.flow,
            end,
            summary.elapsed.as_secs_f64()
        );
        summary.stats.log_summary(self.flow.as_str());
        Ok(summary)
    }

    /// Human-readable stored checkpoint of the flow
    pub async fn describe_checkpoint(&self) -> Result<String> {
        let description = match self.flow {
            Flow::Followers => {
                let checkpoint = CursorCheckpoint::new(
                    Arc::clone(&self.checkpoints),
                    self.config.followers.checkpoint_key.clone(),
                );
                format!("{} = {}", checkpoint.key(), checkpoint.load().await?)
            }
            Flow::Tracks | Flow::Snowball => {
                let checkpoint = OffsetCheckpoint::new(
                    Arc::clone(&self.checkpoints),
                    seeded_config(&self.config, self.flow).checkpoint_key.clone(),
                );
                match checkpoint.load().await? {
                    Some(position) => format!("{} = {}", checkpoint.key(), position),
                    None => format!("{} = (none)", checkpoint.key()),
                }
            }
        };
        Ok(description)
    }

    /// Releases the checkpoint backend; errors are logged
    pub async fn close(&self) {
        if let Err(e) = self.checkpoints.close().await {
            warn!("Failed to close {} checkpoints: {}", self.checkpoints.name(), e);
        }
        info!("Harvester closed");
    }

    fn follower(
        &self,
        table: &str,
        extra_params: &BTreeMap<String, String>,
    ) -> Result<PaginationFollower> {
        let endpoint = Endpoint::new(&self.config.api, extra_params)?;
        let writer = BatchWriter::new(
            Arc::clone(&self.sink),
            table,
            self.flow.schema(),
            Arc::clone(&self.stats),
        );
        Ok(PaginationFollower::new(
            self.api.clone(),
            endpoint,
            writer,
            Arc::clone(&self.stats),
            Duration::from_millis(self.config.crawler.politeness_jitter_ms),
            self.cancel.clone(),
        ))
    }

    async fn run_followers(&self, mode: RunMode) -> Result<RunEnd> {
        let flow_config = &self.config.followers;
        let follower = self.follower(&flow_config.table, &flow_config.extra_params)?;
        let checkpoint = CursorCheckpoint::new(
            Arc::clone(&self.checkpoints),
            flow_config.checkpoint_key.clone(),
        );
        let initial = follower
            .endpoint()
            .start_url(flow_config.user_id, Collection::Followers)?;

        let start = match mode {
            RunMode::Fresh => initial,
            RunMode::Resume => match checkpoint.load().await? {
                CursorPosition::Fresh => initial,
                CursorPosition::At(url) => {
                    info!("Resuming followers stream at {}", url);
                    Url::parse(&url)?
                }
                CursorPosition::Exhausted => {
                    info!(
                        "Followers stream of user {} already exhausted; run with --fresh to start over",
                        flow_config.user_id
                    );
                    return Ok(RunEnd::AlreadyExhausted);
                }
            },
        };

        let target = format!("user {}", flow_config.user_id);
        let outcome = follower.follow(&target, start, Some(&checkpoint)).await;

        Ok(match outcome.state {
            FollowerState::Done => RunEnd::Exhausted,
            FollowerState::Failed => RunEnd::Failed,
            _ => RunEnd::Interrupted,
        })
    }

    async fn run_seeded(&self, mode: RunMode) -> Result<RunEnd> {
        let flow_config = seeded_config(&self.config, self.flow);
        let seeds = self.seeds.as_ref().ok_or_else(|| {
            ConfigError::Validation(format!("the {} flow needs a seed source", self.flow))
        })?;
        let checkpoint = OffsetCheckpoint::new(
            Arc::clone(&self.checkpoints),
            flow_config.checkpoint_key.clone(),
        );

        let initial = OffsetLimit::new(flow_config.start_offset, self.config.crawler.batch_size);
        let mut position = match mode {
            RunMode::Fresh => initial,
            RunMode::Resume => checkpoint.load().await?.unwrap_or(initial),
        };

        let follower = Arc::new(self.follower(&flow_config.table, &flow_config.extra_params)?);
        let pool = WorkerPool::new(self.config.crawler.concurrency as usize, self.cancel.clone());
        let collection = self.flow.collection();
        info!(
            "Fanning out over {} from {} with {} workers",
            seeds.name(),
            position,
            pool.concurrency()
        );

        loop {
            if self.cancel.is_cancelled() {
                return Ok(RunEnd::Interrupted);
            }
            if let Some(max_offset) = self.config.crawler.max_offset {
                if position.offset > max_offset {
                    info!("Seed offset {} passed max-offset {}", position.offset, max_offset);
                    return Ok(RunEnd::OffsetLimit);
                }
            }

            let ids = seeds.fetch_identifiers(position.offset, position.limit).await;
            if ids.is_empty() {
                info!("No more seeds at {}", position);
                return Ok(RunEnd::Exhausted);
            }

            let batch_size = ids.len();
            let follower = Arc::clone(&follower);
            let report = pool
                .run_batch(ids, move |id| {
                    let follower = Arc::clone(&follower);
                    async move { follow_target(&follower, id, collection).await }
                })
                .await;

            if !report.is_complete() {
                warn!(
                    "Batch at {} interrupted ({} of {} targets unsettled); checkpoint not advanced",
                    position, report.interrupted, batch_size
                );
                return Ok(RunEnd::Interrupted);
            }

            position = position.advance();
            checkpoint.save(position).await;
            self.stats.record_batch();
            info!(
                "Batch done: {} targets ({} failed), {} rows; next {}",
                report.total(),
                report.failed,
                report.rows,
                position
            );
        }
    }
}

async fn follow_target(
    follower: &PaginationFollower,
    id: u64,
    collection: Collection,
) -> FollowerOutcome {
    let target = format!("user {}", id);
    match follower.endpoint().start_url(id, collection) {
        Ok(start) => follower.follow(&target, start, None).await,
        Err(e) => {
            error!(id, "Cannot build {} URL: {}", collection, e);
            FollowerOutcome {
                state: FollowerState::Failed,
                pages: 0,
                rows: 0,
            }
        }
    }
}

fn seeded_config(config: &Config, flow: Flow) -> &SeededFlowConfig {
    match flow {
        Flow::Snowball => &config.snowball,
        _ => &config.tracks,
    }
}
