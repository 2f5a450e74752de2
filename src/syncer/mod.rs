//! Syncer components
//!
//! # Pipeline
//!
//! ```text
//! ListingWalker --refs--> WorkerPool --outcomes--> Aggregator --> Sink
//!       |                                              ^
//!       +----------------- commands -------------------+
//! ```
//!
//! The walker registers one listing page at a time with the aggregator,
//! queues its references for the workers and waits until the aggregator has
//! committed the page before fetching the next one.

pub mod aggregator;
pub mod fetcher;
pub mod parser;
pub mod source;
pub mod walker;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use aggregator::{Aggregator, AggregatorHandle, BatchReport, Command};
pub use fetcher::{build_http_client, fetch_bytes, fetch_text, format_user_agent};
pub use parser::{parse_detail, parse_listing, ListingPage};
pub use source::{Endpoints, HttpSource, InscriptionSource};
pub use walker::{ListingWalker, WalkSummary};
pub use worker::{process_ref, WorkerPool};

use crate::config::{Config, SyncerConfig};
use crate::content::ParserRegistry;
use crate::storage::{open_storage, CheckpointStore, SharedStorage, Sink, SqliteStorage};
use crate::{Result, SyncError};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Wires the walker, worker pool and aggregator together
pub struct Syncer<S: ?Sized> {
    config: SyncerConfig,
    endpoints: Endpoints,
    source: Arc<S>,
    registry: Arc<ParserRegistry>,
}

struct Running<S: ?Sized> {
    walker: ListingWalker<S>,
    pool: WorkerPool,
    aggregator: JoinHandle<()>,
    cancel: CancellationToken,
}

impl<S: ?Sized> Running<S> {
    /// Stops every task and waits for them
    async fn shutdown(self) {
        self.cancel.cancel();
        drop(self.walker);
        self.pool.join().await;
        if let Err(e) = self.aggregator.await {
            tracing::error!("Aggregator task failed: {}", e);
        }
    }
}

impl<S> Syncer<S>
where
    S: InscriptionSource + ?Sized + 'static,
{
    pub fn new(
        config: SyncerConfig,
        endpoints: Endpoints,
        source: Arc<S>,
        registry: ParserRegistry,
    ) -> Self {
        Self {
            config,
            endpoints,
            source,
            registry: Arc::new(registry),
        }
    }

    /// Syncs until `cancel` fires
    pub async fn run<K, C>(&self, sink: K, checkpoints: C, cancel: CancellationToken) -> Result<()>
    where
        K: Sink + 'static,
        C: CheckpointStore + 'static,
    {
        let running = self.start(sink, checkpoints, &cancel)?;
        tracing::info!(
            "Syncer running with {} workers against {}",
            running.pool.len(),
            self.endpoints.base()
        );

        running.walker.run().await;
        running.shutdown().await;

        tracing::info!("Syncer stopped");
        Ok(())
    }

    /// Walks the listing once, then stops the workers and the aggregator
    pub async fn sync_once<K, C>(
        &self,
        sink: K,
        checkpoints: C,
        cancel: CancellationToken,
    ) -> Result<WalkSummary>
    where
        K: Sink + 'static,
        C: CheckpointStore + 'static,
    {
        let running = self.start(sink, checkpoints, &cancel)?;
        let result = running.walker.walk().await;
        running.shutdown().await;
        result
    }

    fn start<K, C>(&self, sink: K, checkpoints: C, cancel: &CancellationToken) -> Result<Running<S>>
    where
        K: Sink + 'static,
        C: CheckpointStore + 'static,
    {
        let concurrency = self.config.concurrency as usize;
        let cancel = cancel.child_token();

        let aggregator = Aggregator::new(sink, checkpoints, self.config.checkpoint_key.as_str())?;
        let (work_tx, work_rx) = mpsc::channel(concurrency);
        let (results_tx, results_rx) = mpsc::channel(concurrency);
        let (handle, commands) = AggregatorHandle::channel(1);

        let aggregator = tokio::spawn(aggregator.run(commands, results_rx, cancel.clone()));

        let pool = WorkerPool::spawn(
            concurrency,
            Arc::clone(&self.source),
            Arc::clone(&self.registry),
            work_rx,
            results_tx,
            cancel.clone(),
        );

        let walker = ListingWalker::new(
            Arc::clone(&self.source),
            self.endpoints.clone(),
            handle,
            work_tx,
            self.config.inscription_id_start,
            Duration::from_secs(self.config.poll_interval),
            cancel.clone(),
        );

        Ok(Running {
            walker,
            pool,
            aggregator,
            cancel,
        })
    }
}

/// Builds the HTTP-backed syncer and opens the configured database
fn build(config: &Config) -> Result<(Syncer<HttpSource>, SharedStorage<SqliteStorage>)> {
    let endpoints = Endpoints::new(&config.source.base_url)?;
    let client = build_http_client(&config.user_agent, &config.source).map_err(|source| {
        SyncError::Http {
            url: config.source.base_url.clone(),
            source,
        }
    })?;
    let source = Arc::new(HttpSource::new(client, endpoints.clone()));

    let registry = ParserRegistry::with_defaults();
    tracing::info!("Content parsers: {}", registry.parser_names().join(", "));

    let storage = open_storage(Path::new(&config.output.database_path))?;
    let syncer = Syncer::new(config.syncer.clone(), endpoints, source, registry);
    Ok((syncer, storage))
}

/// Runs the syncer against the configured explorer until `cancel` fires
///
/// # Example
///
/// ```no_run
/// use ord_syncer::config::load_config;
/// use ord_syncer::run_sync;
/// use std::path::Path;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("config.toml"))?;
/// run_sync(&config, CancellationToken::new()).await?;
/// # Ok(())
/// # }
/// ```
pub async fn run_sync(config: &Config, cancel: CancellationToken) -> Result<()> {
    let (syncer, storage) = build(config)?;
    syncer.run(Arc::clone(&storage), storage, cancel).await
}

/// Walks the configured explorer's listing once
pub async fn sync_once(config: &Config, cancel: CancellationToken) -> Result<WalkSummary> {
    let (syncer, storage) = build(config)?;
    syncer.sync_once(Arc::clone(&storage), storage, cancel).await
}
