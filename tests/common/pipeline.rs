//! Harness running the whole pipeline against the mock chain: watcher feed
//! into the sequencer, executing into a recording executor.

use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use goliath_config::{BackoffConfig, ChainConfig, SequencerConfig};
use goliath_execution::{
    feed_sequencer, DrainReport, ErrorSink, ExecutionError, ExecutionOutcome, ExecutionSequencer,
    ExecutionTask, Executor, PipelineError,
};
use goliath_primitives::prelude::*;
use goliath_tasks::ShutdownSignal;
use goliath_test_utils::{wait_until, MockChain};
use goliath_watcher::ChainWatcher;
use parking_lot::Mutex;
use tokio::{sync::Semaphore, task::JoinHandle};

pub(crate) const WAIT: Duration = Duration::from_secs(5);

fn fast_backoff() -> BackoffConfig {
    BackoffConfig {
        base_delay_ms: 1,
        multiplier: 2,
        multiplier_base: 1,
        max_delay_ms: 10,
    }
}

pub(crate) fn chain_config() -> ChainConfig {
    let mut config = ChainConfig::new("mock://chain");
    config.reconnect_backoff = fast_backoff();
    config
}

pub(crate) fn sequencer_config(queue_capacity: Option<usize>) -> SequencerConfig {
    SequencerConfig {
        queue_capacity,
        max_attempts: 3,
        retry_backoff: fast_backoff(),
    }
}

/// Records every call, failing scripted indices and optionally blocking each
/// call until released.
#[derive(Clone, Debug, Default)]
pub(crate) struct RecordingExecutor {
    calls: Arc<Mutex<Vec<u64>>>,
    failures: Arc<Mutex<HashMap<u64, u32>>>,
    gate: Option<Arc<Semaphore>>,
}

impl RecordingExecutor {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Every call blocks until [`release`](Self::release)d.
    pub(crate) fn gated() -> Self {
        Self {
            gate: Some(Arc::new(Semaphore::new(0))),
            ..Self::default()
        }
    }

    pub(crate) fn release(&self, calls: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(calls);
        }
    }

    pub(crate) fn release_all(&self) {
        self.release(1_000_000);
    }

    /// Makes the next `times` executions of `idx` fail transiently.
    pub(crate) fn fail(&self, idx: u64, times: u32) {
        self.failures.lock().insert(idx, times);
    }

    pub(crate) fn calls(&self) -> Vec<u64> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl Executor for RecordingExecutor {
    async fn execute(&self, tx: &ChainTransaction) -> Result<ExecutionOutcome, ExecutionError> {
        self.calls.lock().push(tx.sequence_index);
        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate closed").forget();
        }

        if let Some(times) = self.failures.lock().get_mut(&tx.sequence_index) {
            if *times > 0 {
                *times -= 1;
                return Err(ExecutionError::Transient(format!(
                    "vm rejected {}",
                    tx.sequence_index
                )));
            }
        }

        Ok(ExecutionOutcome::new(tx.payload.clone()))
    }
}

#[derive(Clone, Debug, Default)]
pub(crate) struct RecordingSink {
    reports: Arc<Mutex<Vec<(u64, u32, ExecutionError)>>>,
}

impl RecordingSink {
    /// Index, attempts and error of each report.
    pub(crate) fn reports(&self) -> Vec<(u64, u32, ExecutionError)> {
        self.reports.lock().clone()
    }
}

#[async_trait]
impl ErrorSink for RecordingSink {
    async fn report(&self, task: &ExecutionTask, error: &ExecutionError) {
        self.reports
            .lock()
            .push((task.sequence_index(), task.attempt(), error.clone()));
    }
}

type Sequencer = ExecutionSequencer<RecordingExecutor, RecordingSink>;

/// A running pipeline.
#[derive(Debug)]
pub(crate) struct Pipeline {
    pub(crate) chain: MockChain,
    pub(crate) exec: RecordingExecutor,
    pub(crate) sink: RecordingSink,
    signal: ShutdownSignal,
    feed: Option<JoinHandle<Result<(), PipelineError>>>,
    sequencer: JoinHandle<Sequencer>,
}

impl Pipeline {
    pub(crate) fn start(
        chain: MockChain,
        exec: RecordingExecutor,
        chain_config: ChainConfig,
        sequencer_config: SequencerConfig,
    ) -> Self {
        let signal = ShutdownSignal::new();
        let sink = RecordingSink::default();

        let retry = chain_config.reconnect_backoff.to_policy();
        let watcher = ChainWatcher::new(chain.clone(), chain_config, signal.subscribe());
        let (mut sequencer, handle) =
            ExecutionSequencer::new(exec.clone(), sink.clone(), &sequencer_config);

        let feed = tokio::spawn(feed_sequencer(watcher, handle, retry, signal.subscribe()));
        let shutdown = signal.subscribe();
        let sequencer = tokio::spawn(async move {
            sequencer.run_loop(shutdown).await;
            sequencer
        });

        Self {
            chain,
            exec,
            sink,
            signal,
            feed: Some(feed),
            sequencer,
        }
    }

    /// Starts with a fresh chain and executor and default settings.
    pub(crate) fn start_default() -> Self {
        Self::start(
            MockChain::new(),
            RecordingExecutor::new(),
            chain_config(),
            sequencer_config(None),
        )
    }

    pub(crate) async fn wait_for_calls(&self, n: usize) {
        wait_until(WAIT, || self.exec.calls().len() >= n).await;
    }

    /// Waits for the feed to stop on its own.
    pub(crate) async fn feed_result(&mut self) -> Result<(), PipelineError> {
        let feed = self.feed.take().expect("feed already joined");
        tokio::time::timeout(WAIT, feed)
            .await
            .expect("feed still running")
            .expect("feed panicked")
    }

    pub(crate) fn shutdown(&self) {
        self.signal.send();
    }

    /// Waits for both loops to exit, returning the feed's result if it
    /// wasn't taken yet and the sequencer's drain report.
    pub(crate) async fn join(mut self) -> (Option<Result<(), PipelineError>>, DrainReport) {
        let feed = match self.feed.take() {
            Some(feed) => Some(
                tokio::time::timeout(WAIT, feed)
                    .await
                    .expect("feed still running")
                    .expect("feed panicked"),
            ),
            None => None,
        };
        let sequencer = tokio::time::timeout(WAIT, self.sequencer)
            .await
            .expect("sequencer still running")
            .expect("sequencer panicked");
        (feed, sequencer.drain())
    }

    pub(crate) async fn stop(self) -> (Option<Result<(), PipelineError>>, DrainReport) {
        self.shutdown();
        self.join().await
    }
}
