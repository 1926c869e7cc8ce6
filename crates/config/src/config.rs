use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    chain::{ChainConfig, InvalidBackoff},
    executor::ExecutorConfig,
    sequencer::SequencerConfig,
};

/// Default value for `datadir` in [`Config`].
const DEFAULT_DATADIR: &str = "goliath-data";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    /// Where the resume checkpoint is kept.
    #[serde(default = "default_datadir")]
    pub datadir: PathBuf,

    pub chain: ChainConfig,

    #[serde(default)]
    pub sequencer: SequencerConfig,

    pub executor: ExecutorConfig,
}

fn default_datadir() -> PathBuf {
    DEFAULT_DATADIR.into()
}

/// A value that deserialized fine but can't be run with.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InvalidConfig {
    #[error("{section}: {source}")]
    Backoff {
        section: &'static str,
        #[source]
        source: InvalidBackoff,
    },
}

impl Config {
    pub fn validate(&self) -> Result<(), InvalidConfig> {
        let backoffs = [
            ("chain.reconnect_backoff", &self.chain.reconnect_backoff),
            ("sequencer.retry_backoff", &self.sequencer.retry_backoff),
        ];
        for (section, backoff) in backoffs {
            backoff
                .validate()
                .map_err(|source| InvalidConfig::Backoff { section, source })?;
        }
        Ok(())
    }
}
