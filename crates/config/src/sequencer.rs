use serde::{Deserialize, Serialize};

use crate::chain::BackoffConfig;

/// Default value for `max_attempts` in [`SequencerConfig`].
const DEFAULT_MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SequencerConfig {
    /// Max number of transactions held by the sequencer, counting the one
    /// being executed. Enqueueing beyond this suspends the producer.
    /// Unbounded if unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue_capacity: Option<usize>,

    /// Execution attempts per transaction before it is reported as failed.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Backoff between execution attempts of the same transaction.
    #[serde(default = "BackoffConfig::execution_retry")]
    pub retry_backoff: BackoffConfig,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: None,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_backoff: BackoffConfig::execution_retry(),
        }
    }
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}
