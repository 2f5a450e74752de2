//! Result aggregator
//!
//! A single task that owns the active batch, collects worker outcomes for it
//! and, once every reference has reported, commits the batch to the sink in
//! ascending inscription number and advances the checkpoint.
//!
//! # Commit rules
//!
//! 1. Outcomes are put back in ascending order by walking the listing in reverse
//! 2. Numbers must be non-decreasing (negative and unknown numbers are ignored),
//!    otherwise nothing is committed
//! 3. Negative numbers (unstable or cursed) and numbers at or below the
//!    checkpoint are skipped, so the checkpoint never goes negative
//! 4. A failed outcome or a sink error stops the sequence; commits made so far
//!    are kept and the checkpoint moves to the last of them

use crate::record::{Batch, Outcome};
use crate::storage::{CheckpointStore, Sink};
use crate::{Result, SyncError};
use std::collections::{HashMap, HashSet};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use url::Url;

/// Requests from the walker
#[derive(Debug)]
pub enum Command {
    /// Ask for the current checkpoint
    Resume { reply: oneshot::Sender<Option<i64>> },

    /// Register a batch; `done` fires once it has been settled
    Begin {
        batch: Batch,
        done: oneshot::Sender<Result<BatchReport>>,
    },
}

/// Summary of one settled batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub page_source: Url,
    pub size: usize,
    pub committed: usize,
    pub skipped: usize,

    /// Checkpoint after the batch
    pub checkpoint: Option<i64>,
}

impl BatchReport {
    fn empty(batch: &Batch, checkpoint: Option<i64>) -> Self {
        Self {
            page_source: batch.page_source.clone(),
            size: batch.len(),
            committed: 0,
            skipped: 0,
            checkpoint,
        }
    }
}

/// Sending side of the aggregator's command channel
#[derive(Debug, Clone)]
pub struct AggregatorHandle {
    commands: mpsc::Sender<Command>,
}

impl AggregatorHandle {
    /// Creates a handle and the command receiver to pass to [`Aggregator::run`]
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Command>) {
        let (commands, receiver) = mpsc::channel(capacity.max(1));
        (Self { commands }, receiver)
    }

    /// Returns the stored checkpoint, if any
    pub async fn resume(&self) -> Result<Option<i64>> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Resume { reply })
            .await
            .map_err(|_| SyncError::ChannelClosed("aggregator commands"))?;
        response
            .await
            .map_err(|_| SyncError::ChannelClosed("aggregator reply"))
    }

    /// Registers a batch and returns its completion signal
    pub async fn begin(&self, batch: Batch) -> Result<oneshot::Receiver<Result<BatchReport>>> {
        let (done, completion) = oneshot::channel();
        self.commands
            .send(Command::Begin { batch, done })
            .await
            .map_err(|_| SyncError::ChannelClosed("aggregator commands"))?;
        Ok(completion)
    }
}

struct ActiveBatch {
    batch: Batch,
    pending: HashSet<String>,
    outcomes: HashMap<String, Outcome>,
    done: oneshot::Sender<Result<BatchReport>>,
}

/// Ordered committer for worker outcomes
pub struct Aggregator<S, C> {
    sink: S,
    checkpoints: C,
    key: String,
    checkpoint: Option<i64>,
}

impl<S, C> Aggregator<S, C>
where
    S: Sink,
    C: CheckpointStore,
{
    /// Creates an aggregator, loading the checkpoint stored under `key`
    pub fn new(sink: S, checkpoints: C, key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        let checkpoint = checkpoints.get(&key)?;
        tracing::info!("Loaded checkpoint {:?} ({})", checkpoint, key);

        Ok(Self {
            sink,
            checkpoints,
            key,
            checkpoint,
        })
    }

    pub fn checkpoint(&self) -> Option<i64> {
        self.checkpoint
    }

    /// Runs until `cancel` fires or either input channel closes
    ///
    /// A batch still waiting for outcomes at shutdown is dropped without
    /// committing anything.
    pub async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut results: mpsc::Receiver<Outcome>,
        cancel: CancellationToken,
    ) {
        let mut active: Option<ActiveBatch> = None;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!("Aggregator stopping");
                    break;
                }
                command = commands.recv() => {
                    let Some(command) = command else {
                        tracing::debug!("Command channel closed");
                        break;
                    };
                    self.handle_command(command, &mut active);
                }
                outcome = results.recv() => {
                    let Some(outcome) = outcome else {
                        tracing::debug!("Results channel closed");
                        break;
                    };
                    self.accept(outcome, &mut active);
                }
            }
        }

        if let Some(active) = active {
            tracing::warn!(
                "Dropping unfinished batch from {} ({} of {} outcomes)",
                active.batch.page_source,
                active.outcomes.len(),
                active.batch.len()
            );
        }
    }

    fn handle_command(&mut self, command: Command, active: &mut Option<ActiveBatch>) {
        match command {
            Command::Resume { reply } => {
                let _ = reply.send(self.checkpoint);
            }
            Command::Begin { batch, done } => {
                if let Some(current) = active.as_ref() {
                    let _ = done.send(Err(SyncError::BatchInProgress(
                        current.batch.page_source.to_string(),
                    )));
                    return;
                }

                if batch.is_empty() {
                    tracing::info!("Empty batch from {}", batch.page_source);
                    let _ = done.send(Ok(BatchReport::empty(&batch, self.checkpoint)));
                    return;
                }

                tracing::debug!("Batch of {} from {}", batch.len(), batch.page_source);
                let pending = batch.refs.iter().map(|r| r.uid.clone()).collect();
                *active = Some(ActiveBatch {
                    batch,
                    pending,
                    outcomes: HashMap::new(),
                    done,
                });
            }
        }
    }

    fn accept(&mut self, outcome: Outcome, active: &mut Option<ActiveBatch>) {
        let Some(current) = active.as_mut() else {
            tracing::warn!("Dropping outcome for {}: no active batch", outcome.uid);
            return;
        };

        if !current.pending.remove(&outcome.uid) {
            tracing::warn!("Dropping outcome for {}: not pending", outcome.uid);
            return;
        }

        current.outcomes.insert(outcome.uid.clone(), outcome);
        if !current.pending.is_empty() {
            return;
        }

        if let Some(finished) = active.take() {
            let result = self.settle(&finished.batch, finished.outcomes);
            match &result {
                Ok(report) => tracing::info!(
                    "Batch from {}: {} committed, {} skipped, checkpoint {:?}",
                    report.page_source,
                    report.committed,
                    report.skipped,
                    report.checkpoint
                ),
                Err(e) => tracing::error!("Batch from {} failed: {}", finished.batch.page_source, e),
            }
            let _ = finished.done.send(result);
        }
    }

    /// Orders, validates and commits a complete batch
    pub(crate) fn settle(
        &mut self,
        batch: &Batch,
        mut outcomes: HashMap<String, Outcome>,
    ) -> Result<BatchReport> {
        let ordered: Vec<Outcome> = batch
            .refs
            .iter()
            .rev()
            .filter_map(|r| outcomes.remove(&r.uid))
            .collect();

        check_order(&ordered)?;

        // next_known[i]: first known number at or after position i
        let mut next_known = vec![None; ordered.len() + 1];
        for (index, outcome) in ordered.iter().enumerate().rev() {
            next_known[index] = outcome.ordering_number().or(next_known[index + 1]);
        }

        let start = self.checkpoint;
        let mut report = BatchReport::empty(batch, start);
        let mut highest: Option<i64> = None;
        let mut halted: Option<SyncError> = None;
        let covered = |number: i64| start.is_some_and(|checkpoint| number <= checkpoint);

        for (index, outcome) in ordered.into_iter().enumerate() {
            if outcome.is_excluded() {
                report.skipped += 1;
                continue;
            }

            if let Some(error) = outcome.error {
                if next_known[index].is_some_and(covered) {
                    tracing::debug!("Ignoring failed {} below checkpoint", outcome.uid);
                    report.skipped += 1;
                    continue;
                }
                halted = Some(error);
                break;
            }

            let Some(record) = outcome.record else {
                halted = Some(SyncError::parse(outcome.uid, "outcome carries no record"));
                break;
            };

            if covered(record.number) {
                report.skipped += 1;
                continue;
            }

            if let Err(source) = self.sink.commit(&record) {
                halted = Some(SyncError::Sink {
                    number: record.number,
                    source,
                });
                break;
            }

            tracing::debug!("Committed inscription {}", record.number);
            report.committed += 1;
            highest = Some(record.number);
        }

        if let Some(highest) = highest {
            if start.map_or(true, |checkpoint| highest > checkpoint) {
                self.checkpoints.set(&self.key, highest)?;
                self.checkpoint = Some(highest);
            }
        }
        report.checkpoint = self.checkpoint;

        match halted {
            Some(error) => Err(error),
            None => Ok(report),
        }
    }
}

fn check_order(ordered: &[Outcome]) -> Result<()> {
    let mut previous: Option<i64> = None;
    for number in ordered.iter().filter_map(Outcome::ordering_number) {
        if let Some(previous) = previous {
            if number < previous {
                return Err(SyncError::OrderingViolation {
                    previous,
                    current: number,
                });
            }
        }
        previous = Some(number);
    }
    Ok(())
}
