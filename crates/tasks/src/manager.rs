use std::{any::Any, future::Future, panic, sync::Arc, time::Duration};

use futures_util::FutureExt;
use tokio::{runtime::Handle, sync::mpsc};
use tracing::{debug, error, info, warn};

use crate::{
    pending_tasks::PendingTasks,
    shutdown::{Shutdown, ShutdownSignal},
};

/// Reason a critical task brought the process down.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    /// Task panicked, with the panic payload downcasted to string if possible.
    #[error("critical task `{task_name}` panicked{}", fmt_reason(.reason))]
    Panicked {
        task_name: String,
        reason: Option<String>,
    },

    /// Task returned an error.
    #[error("critical task `{task_name}` failed: {error}")]
    Failed { task_name: String, error: String },
}

fn fmt_reason(reason: &Option<String>) -> String {
    reason
        .as_ref()
        .map(|r| format!(": `{r}`"))
        .unwrap_or_default()
}

impl TaskError {
    fn panicked(task_name: &str, error: Box<dyn Any + Send>) -> Self {
        let reason = match error.downcast::<String>() {
            Ok(value) => Some(*value),
            Err(error) => error.downcast::<&str>().ok().map(|v| v.to_string()),
        };

        Self::Panicked {
            task_name: task_name.to_string(),
            reason,
        }
    }

    pub fn task_name(&self) -> &str {
        match self {
            Self::Panicked { task_name, .. } | Self::Failed { task_name, .. } => task_name,
        }
    }
}

/// [`TaskManager`] spawns and tracks the pipeline's long running tasks,
/// watches for task panics and errors and manages graceful shutdown on
/// critical task failures and external signals.
#[derive(Debug)]
pub struct TaskManager {
    /// Tokio's runtime [`Handle`].
    tokio_handle: Handle,
    /// Sender handed to executors for reporting failed tasks.
    failed_tasks_tx: mpsc::UnboundedSender<TaskError>,
    failed_tasks_rx: mpsc::UnboundedReceiver<TaskError>,
    /// Async-capable shutdown signal that can be sent to tasks.
    shutdown_signal: ShutdownSignal,
    /// Tasks that haven't finished, for graceful shutdown.
    pending_tasks: Arc<PendingTasks>,
}

impl TaskManager {
    pub fn new(tokio_handle: Handle) -> Self {
        let (failed_tasks_tx, failed_tasks_rx) = mpsc::unbounded_channel();

        Self {
            tokio_handle,
            failed_tasks_tx,
            failed_tasks_rx,
            shutdown_signal: ShutdownSignal::new(),
            pending_tasks: Arc::default(),
        }
    }

    pub fn executor(&self) -> TaskExecutor {
        TaskExecutor {
            tokio_handle: self.tokio_handle.clone(),
            failed_tasks_tx: self.failed_tasks_tx.clone(),
            shutdown_signal: self.shutdown_signal.clone(),
            pending_tasks: self.pending_tasks.clone(),
        }
    }

    /// Get shutdown signal trigger
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown_signal.clone()
    }

    /// Waits until any task fails, returning `Err(first_failure)`, or until
    /// the shutdown signal is sent, returning `Ok(())`.
    fn wait_for_task_failure(&mut self, shutdown: Shutdown) -> Result<(), TaskError> {
        self.tokio_handle.block_on(async {
            tokio::select! {
                msg = self.failed_tasks_rx.recv() => {
                    match msg {
                        Some(error) => Err(error),
                        None => Ok(())
                    }
                }
                _ = shutdown.wait_for_shutdown() => {
                    Ok(())
                }
            }
        })
    }

    /// Waits for all tasks to complete, returning true.
    /// If timeout is provided, wait until timeout;
    /// return false if tasks have not completed by this time.
    fn wait_for_graceful_shutdown(&self, timeout: Option<Duration>) -> bool {
        let wait = self.pending_tasks.clone().wait_for_zero();
        let done = self.tokio_handle.block_on(async move {
            match timeout {
                Some(t) => tokio::time::timeout(t, wait).await.is_ok(),
                None => {
                    wait.await;
                    true
                }
            }
        });

        if done {
            debug!("gracefully shut down");
        } else {
            debug!(pending = %self.pending_tasks.current(), "graceful shutdown timed out");
        }
        done
    }

    /// Sends the shutdown signal on ctrl-c.
    pub fn start_signal_listeners(&self) {
        let shutdown_signal = self.shutdown_signal();

        self.tokio_handle.spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                error!(%err, "failed to listen for INT");
                return;
            }

            warn!("got INT, initiating shutdown");
            shutdown_signal.send()
        });
    }

    /// Blocks until a task fails or the shutdown signal is sent, then makes
    /// sure every task sees the shutdown and waits for them to wind down.
    pub fn monitor(mut self, shutdown_timeout: Option<Duration>) -> Result<(), TaskError> {
        let res = self.wait_for_task_failure(self.shutdown_signal.subscribe());

        self.shutdown_signal.send();
        let shutdown_in_time = self.wait_for_graceful_shutdown(shutdown_timeout);

        if !shutdown_in_time {
            info!("shutdown timeout expired; forced shutdown");
        }

        res
    }
}

/// A type that can spawn new supervised tasks.
#[derive(Debug, Clone)]
pub struct TaskExecutor {
    tokio_handle: Handle,
    failed_tasks_tx: mpsc::UnboundedSender<TaskError>,
    shutdown_signal: ShutdownSignal,
    pending_tasks: Arc<PendingTasks>,
}

impl TaskExecutor {
    /// Spawns a future in the tokio runtime that is responsible for observing
    /// the [`Shutdown`] passed to the closure and winding itself down.
    /// A panic or an `Err` triggers shutdown.
    pub fn spawn_critical_async_with_shutdown<F>(
        &self,
        name: &'static str,
        async_func: impl FnOnce(Shutdown) -> F,
    ) -> tokio::task::JoinHandle<()>
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let failed_tasks_tx = self.failed_tasks_tx.clone();
        let pending = self.pending_tasks.track();
        let fut = async_func(self.shutdown_signal.subscribe());

        let task = async move {
            let _pending = pending;
            let failure = match panic::AssertUnwindSafe(fut).catch_unwind().await {
                Ok(Ok(())) => {
                    debug!(%name, "critical task exited");
                    None
                }
                Ok(Err(err)) => Some(TaskError::Failed {
                    task_name: name.to_string(),
                    error: format!("{err:#}"),
                }),
                Err(panic) => Some(TaskError::panicked(name, panic)),
            };

            if let Some(task_error) = failure {
                error!(%name, err = %task_error, "critical task failed");
                let _ = failed_tasks_tx.send(task_error);
            }
        };

        info!(%name, "starting critical task");
        self.tokio_handle.spawn(task)
    }
}
