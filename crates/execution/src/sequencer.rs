use std::{fmt, sync::Arc, time::Duration};

use goliath_common::retry::{policies::ExponentialBackoff, Backoff};
use goliath_config::SequencerConfig;
use goliath_primitives::prelude::*;
use goliath_tasks::Shutdown;
use thiserror::Error;
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tracing::*;

use crate::{ErrorSink, ExecutionTask, Executor};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SequencerError {
    #[error("tx {got} enqueued out of order, expected {expected}")]
    OutOfOrder { expected: u64, got: u64 },

    #[error("sequencer no longer accepting txs")]
    Closed,
}

/// A queued task, holding its slot of the queue capacity until it reaches a
/// terminal state.
#[derive(Debug)]
struct QueueEntry {
    task: ExecutionTask,
    _slot: Option<OwnedSemaphorePermit>,
}

/// Producer side of the sequencer's queue.
#[derive(Debug)]
pub struct SequencerHandle {
    queue_tx: mpsc::UnboundedSender<QueueEntry>,
    slots: Option<Arc<Semaphore>>,
    next_index: Option<u64>,
}

impl SequencerHandle {
    /// Appends transactions to the queue, in order.
    ///
    /// Suspends while the queue is at capacity. Each transaction must follow
    /// the previously enqueued one, anything else is rejected without
    /// enqueueing it or any after it.
    pub async fn enqueue(
        &mut self,
        txs: impl IntoIterator<Item = ChainTransaction>,
    ) -> Result<(), SequencerError> {
        for tx in txs {
            let idx = tx.sequence_index;
            if let Some(expected) = self.next_index {
                if idx != expected {
                    return Err(SequencerError::OutOfOrder { expected, got: idx });
                }
            }

            let slot = match &self.slots {
                Some(slots) => Some(
                    slots
                        .clone()
                        .acquire_owned()
                        .await
                        .map_err(|_| SequencerError::Closed)?,
                ),
                None => None,
            };

            let entry = QueueEntry {
                task: ExecutionTask::new(tx),
                _slot: slot,
            };
            self.queue_tx
                .send(entry)
                .map_err(|_| SequencerError::Closed)?;

            trace!(%idx, "enqueued tx");
            self.next_index = Some(idx + 1);
        }

        Ok(())
    }

    /// Sequence index the next enqueued transaction must have, if anything
    /// was enqueued yet.
    pub fn next_index(&self) -> Option<u64> {
        self.next_index
    }
}

/// What was left when the sequencer stopped.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DrainReport {
    /// Tasks that never reached a terminal state, in sequence order.
    pub pending: Vec<ExecutionTask>,

    /// First sequence index not known to be done, if any task was seen.
    pub resume_index: Option<u64>,

    pub succeeded: u64,
    pub failed: u64,
}

enum Completion {
    Done,
    Interrupted,
}

/// Single consumer of the queue, executing one task at a time in sequence
/// order.
pub struct ExecutionSequencer<E, K> {
    executor: E,
    sink: K,
    max_attempts: u32,
    backoff: ExponentialBackoff,
    queue_rx: mpsc::UnboundedReceiver<QueueEntry>,
    slots: Option<Arc<Semaphore>>,

    /// Task interrupted by shutdown while it was being retried.
    interrupted: Option<ExecutionTask>,

    /// Highest index that reached a terminal state.
    last_done: Option<u64>,
    succeeded: u64,
    failed: u64,
}

impl<E, K> fmt::Debug for ExecutionSequencer<E, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionSequencer")
            .field("max_attempts", &self.max_attempts)
            .field("last_done", &self.last_done)
            .field("succeeded", &self.succeeded)
            .field("failed", &self.failed)
            .finish_non_exhaustive()
    }
}

impl<E: Executor, K: ErrorSink> ExecutionSequencer<E, K> {
    pub fn new(executor: E, sink: K, config: &SequencerConfig) -> (Self, SequencerHandle) {
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let slots = config
            .queue_capacity
            .map(|cap| Arc::new(Semaphore::new(cap.max(1))));

        let sequencer = Self {
            executor,
            sink,
            max_attempts: config.max_attempts.max(1),
            backoff: config.retry_backoff.to_policy(),
            queue_rx,
            slots: slots.clone(),
            interrupted: None,
            last_done: None,
            succeeded: 0,
            failed: 0,
        };
        let handle = SequencerHandle {
            queue_tx,
            slots,
            next_index: None,
        };

        (sequencer, handle)
    }

    /// Executes queued tasks until shutdown is signalled, or until the handle
    /// is dropped and the queue is empty.
    ///
    /// A task that is executing when shutdown arrives is finished first.
    pub async fn run_loop(&mut self, shutdown: Shutdown) {
        info!("sequencer started");

        loop {
            if shutdown.should_shutdown() {
                break;
            }

            let entry = tokio::select! {
                biased;
                _ = shutdown.wait_for_shutdown() => break,
                entry = self.queue_rx.recv() => entry,
            };
            let Some(QueueEntry { mut task, _slot }) = entry else {
                info!("producer gone and queue empty");
                break;
            };

            let span = debug_span!("execute", idx = %task.sequence_index());
            let completion = self.process(&mut task, &shutdown).instrument(span).await;
            if let Completion::Interrupted = completion {
                self.interrupted = Some(task);
                break;
            }
        }

        self.close();
        info!(succeeded = %self.succeeded, failed = %self.failed, "sequencer stopped");
    }

    async fn process(&mut self, task: &mut ExecutionTask, shutdown: &Shutdown) -> Completion {
        let idx = task.sequence_index();
        let mut delay = self.backoff.base_delay_ms();
        task.start();

        loop {
            let err = match self.executor.execute(task.transaction()).await {
                Ok(outcome) => {
                    debug!(attempt = %task.attempt(), output_len = %outcome.output().len(), "executed tx");
                    task.succeed();
                    self.succeeded += 1;
                    self.last_done = Some(idx);
                    return Completion::Done;
                }
                Err(err) => err,
            };

            if !err.is_retryable() || task.attempt() >= self.max_attempts {
                warn!(attempt = %task.attempt(), %err, "giving up on tx");
                task.fail();
                self.sink.report(task, &err).await;
                self.failed += 1;
                self.last_done = Some(idx);
                return Completion::Done;
            }

            if shutdown.should_shutdown() {
                debug!(attempt = %task.attempt(), %err, "shutting down, not retrying");
                task.requeue();
                return Completion::Interrupted;
            }

            warn!(attempt = %task.attempt(), %err, %delay, "execution failed, retrying");
            tokio::select! {
                _ = shutdown.wait_for_shutdown() => {
                    task.requeue();
                    return Completion::Interrupted;
                }
                _ = tokio::time::sleep(Duration::from_millis(delay)) => {}
            }
            delay = self.backoff.next_delay_ms(delay);
            task.next_attempt();
        }
    }

    /// Stops accepting transactions. Blocked producers get
    /// [`SequencerError::Closed`].
    fn close(&mut self) {
        self.queue_rx.close();
        if let Some(slots) = &self.slots {
            slots.close();
        }
    }

    /// Stops accepting transactions and returns everything that didn't
    /// reach a terminal state, so it can be resumed later.
    pub fn drain(mut self) -> DrainReport {
        self.close();

        let mut pending: Vec<ExecutionTask> = self.interrupted.take().into_iter().collect();
        while let Ok(entry) = self.queue_rx.try_recv() {
            pending.push(entry.task);
        }

        let resume_index = pending
            .first()
            .map(|task| task.sequence_index())
            .or(self.last_done.map(|idx| idx + 1));

        info!(pending = %pending.len(), ?resume_index, "drained sequencer");
        DrainReport {
            pending,
            resume_index,
            succeeded: self.succeeded,
            failed: self.failed,
        }
    }
}
