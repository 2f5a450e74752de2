//! Fetch + parse workers
//!
//! Each worker takes one reference at a time from the shared work queue,
//! fetches and parses the detail page, fetches and classifies the content,
//! and hands an `Outcome` to the aggregator.

use crate::content::{accepts_content_type, ParserRegistry};
use crate::record::{Outcome, RecordRef};
use crate::syncer::parser::parse_detail;
use crate::syncer::source::InscriptionSource;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Work queue receiver shared by all workers
pub type SharedQueue = Arc<Mutex<mpsc::Receiver<RecordRef>>>;

/// Fixed set of worker tasks
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `size` workers
    ///
    /// Workers stop when the queue closes, the results channel closes, or
    /// `cancel` fires. A fetch in progress at cancellation is abandoned.
    pub fn spawn<S>(
        size: usize,
        source: Arc<S>,
        registry: Arc<ParserRegistry>,
        queue: mpsc::Receiver<RecordRef>,
        results: mpsc::Sender<Outcome>,
        cancel: CancellationToken,
    ) -> Self
    where
        S: InscriptionSource + ?Sized + 'static,
    {
        let queue: SharedQueue = Arc::new(Mutex::new(queue));

        let handles = (0..size)
            .map(|id| {
                tokio::spawn(run_worker(
                    id,
                    Arc::clone(&source),
                    Arc::clone(&registry),
                    Arc::clone(&queue),
                    results.clone(),
                    cancel.clone(),
                ))
            })
            .collect();

        tracing::info!("Started {} workers", size);
        Self { handles }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Waits for every worker to exit
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                tracing::error!("Worker task failed: {}", e);
            }
        }
        tracing::info!("All workers stopped");
    }
}

async fn run_worker<S>(
    id: usize,
    source: Arc<S>,
    registry: Arc<ParserRegistry>,
    queue: SharedQueue,
    results: mpsc::Sender<Outcome>,
    cancel: CancellationToken,
) where
    S: InscriptionSource + ?Sized,
{
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = async { queue.lock().await.recv().await } => next,
        };

        let Some(record_ref) = next else {
            tracing::debug!("Worker {}: queue closed", id);
            break;
        };

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            outcome = process_ref(source.as_ref(), &registry, &record_ref.uid) => outcome,
        };

        if let Some(error) = &outcome.error {
            tracing::warn!("Worker {}: {} failed: {}", id, outcome.uid, error);
        } else {
            tracing::debug!("Worker {}: processed {} ({:?})", id, outcome.uid, outcome.number);
        }

        let sent = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            sent = results.send(outcome) => sent,
        };

        if sent.is_err() {
            tracing::debug!("Worker {}: results channel closed", id);
            break;
        }
    }

    tracing::debug!("Worker {} stopped", id);
}

/// Fetches, parses and classifies one reference
///
/// Never fails: errors are carried inside the returned `Outcome`. Negative
/// numbers and content types no parser accepts skip the content fetch.
pub async fn process_ref<S>(source: &S, registry: &ParserRegistry, uid: &str) -> Outcome
where
    S: InscriptionSource + ?Sized,
{
    let html = match source.detail_page(uid).await {
        Ok(html) => html,
        Err(e) => return Outcome::failed(uid, None, e),
    };

    let mut record = match parse_detail(uid, &html) {
        Ok(record) => record,
        Err(e) => return Outcome::failed(uid, None, e),
    };

    if record.is_excluded() {
        return Outcome::completed(record);
    }

    let content_type = record.content_type.clone().unwrap_or_default();
    if !accepts_content_type(&content_type) {
        return Outcome::completed(record);
    }

    let Some(id) = record.id.clone() else {
        return Outcome::completed(record);
    };

    let body = match source.content(&id).await {
        Ok(body) => body,
        Err(e) => return Outcome::failed(uid, Some(record), e),
    };

    if let Some(classified) = registry.classify(&content_type, &body, record.content_length) {
        tracing::debug!("{} classified by {}", uid, classified.parser);
        record.content = Some(classified.content);
        record.content_parser = Some(classified.parser.to_string());
    }

    Outcome::completed(record)
}
