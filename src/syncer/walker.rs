//! Listing walker
//!
//! Polls the explorer: each walk starts at the checkpoint (or the configured
//! start), follows "next page" links until the last page, and hands every
//! page to the workers as one batch, waiting for it to settle before moving
//! on.

use crate::record::{Batch, RecordRef};
use crate::syncer::aggregator::{AggregatorHandle, BatchReport};
use crate::syncer::parser::parse_listing;
use crate::syncer::source::{Endpoints, InscriptionSource};
use crate::{Result, SyncError};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Totals for one walk of the listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalkSummary {
    pub pages: usize,
    pub refs: usize,
    pub committed: usize,
    pub skipped: usize,
    pub checkpoint: Option<i64>,
}

impl WalkSummary {
    fn add(&mut self, report: &BatchReport) {
        self.pages += 1;
        self.refs += report.size;
        self.committed += report.committed;
        self.skipped += report.skipped;
        self.checkpoint = report.checkpoint;
    }
}

/// Producer side of the syncer
pub struct ListingWalker<S: ?Sized> {
    source: Arc<S>,
    endpoints: Endpoints,
    aggregator: AggregatorHandle,
    queue: mpsc::Sender<RecordRef>,
    start: i64,
    poll_interval: Duration,
    cancel: CancellationToken,
}

impl<S> ListingWalker<S>
where
    S: InscriptionSource + ?Sized,
{
    pub fn new(
        source: Arc<S>,
        endpoints: Endpoints,
        aggregator: AggregatorHandle,
        queue: mpsc::Sender<RecordRef>,
        start: i64,
        poll_interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            source,
            endpoints,
            aggregator,
            queue,
            start,
            poll_interval,
            cancel,
        }
    }

    /// Walks the listing every poll interval until cancelled
    ///
    /// A failed walk is logged; the next one retries from the checkpoint.
    pub async fn run(&self) {
        loop {
            match self.walk().await {
                Ok(summary) => tracing::info!(
                    "Walk finished: {} pages, {} refs, {} committed, checkpoint {:?}",
                    summary.pages,
                    summary.refs,
                    summary.committed,
                    summary.checkpoint
                ),
                Err(SyncError::Shutdown) => break,
                Err(e) => tracing::error!("Walk aborted: {}", e),
            }

            tracing::debug!("Sleeping {:?} before the next walk", self.poll_interval);
            if until_cancelled(&self.cancel, tokio::time::sleep(self.poll_interval))
                .await
                .is_err()
            {
                break;
            }
        }

        tracing::info!("Walker stopped");
    }

    /// Walks the listing once, from the resume point to the last page
    pub async fn walk(&self) -> Result<WalkSummary> {
        let checkpoint = until_cancelled(&self.cancel, self.aggregator.resume()).await??;
        let start = checkpoint.unwrap_or(self.start);
        let mut url = self.endpoints.listing(start)?;
        tracing::info!("Starting walk at {}", url);

        let mut summary = WalkSummary {
            checkpoint,
            ..Default::default()
        };

        loop {
            let html = until_cancelled(&self.cancel, self.source.listing_page(&url)).await??;
            let page = parse_listing(&html)?;

            let report = self.dispatch(Batch::new(url.clone(), page.refs)).await?;
            summary.add(&report);

            let Some(href) = page.next else {
                break;
            };

            let next = self.endpoints.resolve(&href)?;
            if next == url {
                tracing::warn!("Next page link points back to {}", url);
                break;
            }
            url = next;
        }

        Ok(summary)
    }

    /// Queues one batch and waits for it to settle
    async fn dispatch(&self, batch: Batch) -> Result<BatchReport> {
        tracing::info!("Dispatching {} refs from {}", batch.len(), batch.page_source);
        let refs = batch.refs.clone();
        let done = until_cancelled(&self.cancel, self.aggregator.begin(batch)).await??;

        for record_ref in refs {
            until_cancelled(&self.cancel, self.queue.send(record_ref))
                .await?
                .map_err(|_| SyncError::ChannelClosed("work queue"))?;
        }

        until_cancelled(&self.cancel, done)
            .await?
            .map_err(|_| SyncError::ChannelClosed("batch completion"))?
    }
}

/// Runs `future` unless `cancel` fires first
async fn until_cancelled<F: Future>(cancel: &CancellationToken, future: F) -> Result<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(SyncError::Shutdown),
        output = future => Ok(output),
    }
}
