//! Configuration for the executer service, as loaded from its TOML file.

pub mod chain;
pub mod config;
pub mod executor;
pub mod sequencer;

pub use chain::{BackoffConfig, ChainConfig, InvalidBackoff};
pub use config::{Config, InvalidConfig};
pub use executor::ExecutorConfig;
pub use sequencer::SequencerConfig;
