//! In-order execution of the transactions emitted by the chain watcher.

mod executor;
mod pipeline;
mod sequencer;
mod sink;
mod task;

pub use executor::{ExecutionError, ExecutionOutcome, Executor, ProcessExecutor};
pub use pipeline::{feed_sequencer, PipelineError};
pub use sequencer::{DrainReport, ExecutionSequencer, SequencerError, SequencerHandle};
pub use sink::{ErrorSink, LogErrorSink};
pub use task::{ExecutionTask, TaskState};
