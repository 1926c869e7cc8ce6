//! Goliath executer
//!
//! Follows the chain service and runs every committed transaction through the
//! VM binary, one at a time, in chain order.

mod args;
mod checkpoint;
mod errors;
mod helpers;

use std::time::Duration;

use anyhow::Context;
use args::{Args, EnvArgs};
use checkpoint::ResumeCheckpoint;
use goliath_chain_client::rpc::RpcChainService;
use goliath_common::logging;
use goliath_execution::{feed_sequencer, ExecutionSequencer, LogErrorSink, ProcessExecutor};
use goliath_tasks::{set_panic_hook, TaskManager};
use goliath_watcher::{ChainWatcher, WatcherCursor};
use helpers::{get_config, init_logging};
use tracing::*;

const SHUTDOWN_TIMEOUT_MS: u64 = 5000;

fn main() -> anyhow::Result<()> {
    let args: Args = argh::from_env();
    if let Err(e) = main_inner(args) {
        eprintln!("FATAL ERROR: {e:#}");

        return Err(e);
    }

    Ok(())
}

fn main_inner(args: Args) -> anyhow::Result<()> {
    // Start runtime for async IO tasks.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("goliath-rt")
        .build()
        .context("init: build rt")?;
    let handle = runtime.handle();

    // Init the logging before we do anything else.
    init_logging(handle)?;
    set_panic_hook();

    let config = get_config(&args, &EnvArgs::from_env())?;
    let datadir = config.datadir.clone();

    let task_manager = TaskManager::new(handle.clone());
    let executor = task_manager.executor();
    let shutdown_signal = task_manager.shutdown_signal();

    let mut watcher = ChainWatcher::new(
        RpcChainService::default(),
        config.chain.clone(),
        shutdown_signal.subscribe(),
    );
    let start_index = match checkpoint::load(&datadir)? {
        Some(cp) => {
            info!(resume_index = %cp.resume_index, pending = %cp.pending.len(), "resuming from checkpoint");
            watcher = watcher.with_cursor(WatcherCursor::starting_at(cp.resume_index));
            cp.resume_index
        }
        None => config.chain.start_index,
    };

    let (mut sequencer, seq_handle) = ExecutionSequencer::new(
        ProcessExecutor::new(&config.executor),
        LogErrorSink,
        &config.sequencer,
    );
    let feed_retry = config.chain.reconnect_backoff.to_policy();

    executor.spawn_critical_async_with_shutdown("chain-feed", |shutdown| async move {
        feed_sequencer(watcher, seq_handle, feed_retry, shutdown).await?;
        Ok(())
    });
    executor.spawn_critical_async_with_shutdown("sequencer", |shutdown| async move {
        sequencer.run_loop(shutdown).await;
        let report = sequencer.drain();
        checkpoint::save(&datadir, &ResumeCheckpoint::from_report(report, start_index))?;
        Ok(())
    });

    task_manager.start_signal_listeners();
    let res = task_manager.monitor(Some(Duration::from_millis(SHUTDOWN_TIMEOUT_MS)));
    if let Err(e) = &res {
        error!(task = %e.task_name(), "executer stopped by a failed task");
    }
    logging::finalize();
    res?;

    Ok(())
}
