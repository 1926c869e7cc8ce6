use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tracing::*;

use crate::{ExecutionError, ExecutionTask};

/// Receives the transactions the sequencer gave up on.
///
/// The task passed in is terminal, carrying the number of attempts made.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ErrorSink: Send + Sync + 'static {
    async fn report(&self, task: &ExecutionTask, error: &ExecutionError);
}

/// Reports failures to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogErrorSink;

#[async_trait]
impl ErrorSink for LogErrorSink {
    async fn report(&self, task: &ExecutionTask, error: &ExecutionError) {
        let tx = task.transaction();
        error!(
            idx = %tx.sequence_index,
            hash = %tx.hash,
            attempts = %task.attempt(),
            height = %tx.observed_at_height,
            %error,
            "transaction failed, skipping"
        );
    }
}
