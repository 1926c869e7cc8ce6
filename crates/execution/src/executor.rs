use std::{collections::BTreeMap, path::PathBuf, process::Stdio, time::Duration};

use async_trait::async_trait;
use goliath_config::ExecutorConfig;
use goliath_primitives::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::process::Command;
use tracing::*;

/// Whatever the executor produced for a transaction. Opaque to the sequencer.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    output: HexBytes,
}

impl ExecutionOutcome {
    pub fn new(output: impl Into<HexBytes>) -> Self {
        Self {
            output: output.into(),
        }
    }

    pub fn output(&self) -> &[u8] {
        self.output.as_slice()
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExecutionError {
    /// Might succeed if attempted again.
    #[error("transient: {0}")]
    Transient(String),

    /// Will never succeed, not retried.
    #[error("permanent: {0}")]
    Permanent(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

impl ExecutionError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Permanent(_))
    }
}

/// Runs the business logic for a single transaction.
///
/// Calls are never concurrent: the sequencer waits for each one to return
/// before handing over the next transaction.
#[async_trait]
pub trait Executor: Send + Sync + 'static {
    async fn execute(&self, tx: &ChainTransaction) -> Result<ExecutionOutcome, ExecutionError>;
}

/// Executes each transaction by running an external VM binary, passing the
/// transaction as JSON in a `--data` argument. Stdout becomes the outcome.
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    binary: PathBuf,
    args: Vec<String>,
    env: BTreeMap<String, String>,
    timeout: Duration,
}

impl ProcessExecutor {
    pub fn new(config: &ExecutorConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            args: config.args.clone(),
            env: config.env.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }
}

#[async_trait]
impl Executor for ProcessExecutor {
    async fn execute(&self, tx: &ChainTransaction) -> Result<ExecutionOutcome, ExecutionError> {
        let data = serde_json::to_string(tx)
            .map_err(|e| ExecutionError::Permanent(format!("encoding tx: {e}")))?;

        let child = Command::new(&self.binary)
            .args(&self.args)
            .arg("--data")
            .arg(&data)
            .envs(&self.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ExecutionError::Permanent(format!("spawning {}: {e}", self.binary.display()))
            })?;

        // Dropping the wait on timeout kills the child.
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(res) => res.map_err(|e| ExecutionError::Transient(format!("waiting for vm: {e}")))?,
            Err(_) => return Err(ExecutionError::Timeout(self.timeout)),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExecutionError::Transient(format!(
                "vm {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        trace!(idx = %tx.sequence_index, len = %output.stdout.len(), "vm finished");
        Ok(ExecutionOutcome::new(output.stdout))
    }
}
