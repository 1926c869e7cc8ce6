use std::{collections::BTreeMap, path::PathBuf};

use serde::{Deserialize, Serialize};

/// Default value for `timeout_ms` in [`ExecutorConfig`].
const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// How transactions are handed to the external VM binary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Path to the VM binary invoked once per transaction.
    pub binary: PathBuf,

    /// Extra args passed before the transaction data.
    #[serde(default)]
    pub args: Vec<String>,

    /// Extra env vars set for the VM process.
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Deadline for a single execution, in millis.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}
