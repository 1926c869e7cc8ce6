use goliath_primitives::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum TaskState {
    /// Waiting in the sequencer's queue.
    Queued,

    /// Handed to the executor, possibly being retried.
    Executing,

    Succeeded,

    /// Attempts exhausted or permanent error. Reported to the error sink.
    Failed,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

/// Attempt-tracked wrapper of a single transaction going through the
/// sequencer.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ExecutionTask {
    transaction: ChainTransaction,

    /// Number of the current attempt, starting at 1.
    attempt: u32,

    state: TaskState,
}

impl ExecutionTask {
    pub fn new(transaction: ChainTransaction) -> Self {
        Self {
            transaction,
            attempt: 1,
            state: TaskState::Queued,
        }
    }

    pub fn transaction(&self) -> &ChainTransaction {
        &self.transaction
    }

    pub fn into_transaction(self) -> ChainTransaction {
        self.transaction
    }

    pub fn sequence_index(&self) -> u64 {
        self.transaction.sequence_index
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub(crate) fn start(&mut self) {
        debug_assert_eq!(self.state, TaskState::Queued, "task: start from {:?}", self.state);
        self.state = TaskState::Executing;
    }

    pub(crate) fn next_attempt(&mut self) {
        debug_assert_eq!(self.state, TaskState::Executing);
        self.attempt += 1;
    }

    pub(crate) fn succeed(&mut self) {
        debug_assert_eq!(self.state, TaskState::Executing);
        self.state = TaskState::Succeeded;
    }

    pub(crate) fn fail(&mut self) {
        debug_assert_eq!(self.state, TaskState::Executing);
        self.state = TaskState::Failed;
    }

    /// Puts an interrupted task back, keeping its attempt count.
    pub(crate) fn requeue(&mut self) {
        debug_assert_eq!(self.state, TaskState::Executing);
        self.state = TaskState::Queued;
    }
}

#[cfg(test)]
mod tests {
    use goliath_test_utils::make_tx;

    use super::*;

    #[test]
    fn test_retry_lifecycle() {
        let mut task = ExecutionTask::new(make_tx(7));
        assert_eq!(task.state(), TaskState::Queued);
        assert_eq!(task.attempt(), 1);
        assert_eq!(task.sequence_index(), 7);

        task.start();
        task.next_attempt();
        task.next_attempt();
        task.fail();
        assert_eq!(task.attempt(), 3);
        assert!(task.state().is_terminal());
    }

    #[test]
    fn test_requeue_keeps_attempts() {
        let mut task = ExecutionTask::new(make_tx(1));
        task.start();
        task.next_attempt();
        task.requeue();
        assert_eq!(task.state(), TaskState::Queued);
        assert_eq!(task.attempt(), 2);
        assert!(!task.state().is_terminal());
    }
}
