use serde::{Deserialize, Serialize};

/// How much of the chain's transaction log has been emitted downstream.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct WatcherCursor {
    /// Number of transactions already emitted, which is also the sequence
    /// index of the next one to emit. Never decreases.
    last_confirmed_sequence_index: u64,

    /// Height of the latest header the emitted range was observed at.
    last_height: u64,
}

impl WatcherCursor {
    /// Cursor for a watcher that hasn't emitted anything before `index`.
    pub fn starting_at(index: u64) -> Self {
        Self {
            last_confirmed_sequence_index: index,
            last_height: 0,
        }
    }

    pub fn last_confirmed_sequence_index(&self) -> u64 {
        self.last_confirmed_sequence_index
    }

    /// Sequence index of the next transaction to emit.
    pub fn next_index(&self) -> u64 {
        self.last_confirmed_sequence_index
    }

    pub fn last_height(&self) -> u64 {
        self.last_height
    }

    /// Moves past a fully fetched range ending at `end`.
    pub(crate) fn advance(&mut self, end: u64, height: u64) {
        debug_assert!(end >= self.last_confirmed_sequence_index, "cursor: moving backwards");
        self.last_confirmed_sequence_index = end;
        self.observe_height(height);
    }

    /// Records a header that brought nothing new.
    pub(crate) fn observe_height(&mut self, height: u64) {
        self.last_height = self.last_height.max(height);
    }
}
