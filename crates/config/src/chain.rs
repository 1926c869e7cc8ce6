use goliath_common::retry::policies::ExponentialBackoff;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default value for `fetch_batch_limit` in [`ChainConfig`].
const DEFAULT_FETCH_BATCH_LIMIT: u64 = 1000;

/// Default value for `fetch_concurrency` in [`ChainConfig`].
const DEFAULT_FETCH_CONCURRENCY: usize = 8;

/// Settings for following the chain service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChainConfig {
    /// Endpoint of the chain service, ie. `ws://127.0.0.1:49000`.
    pub endpoint: String,

    /// Sequence index to start watching from when there is no resume
    /// checkpoint.
    #[serde(default)]
    pub start_index: u64,

    /// Max number of transactions to fetch for a single batch.
    #[serde(default = "default_fetch_batch_limit")]
    pub fetch_batch_limit: u64,

    /// Max number of transaction fetches in flight at once.
    #[serde(default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,

    /// Give up connecting after this many failed attempts. Retries forever if
    /// unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_connect_attempts: Option<u32>,

    /// Backoff between connection attempts.
    #[serde(default = "BackoffConfig::reconnect")]
    pub reconnect_backoff: BackoffConfig,
}

impl ChainConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            start_index: 0,
            fetch_batch_limit: DEFAULT_FETCH_BATCH_LIMIT,
            fetch_concurrency: DEFAULT_FETCH_CONCURRENCY,
            max_connect_attempts: None,
            reconnect_backoff: BackoffConfig::reconnect(),
        }
    }
}

fn default_fetch_batch_limit() -> u64 {
    DEFAULT_FETCH_BATCH_LIMIT
}

fn default_fetch_concurrency() -> usize {
    DEFAULT_FETCH_CONCURRENCY
}

/// Exponential backoff parameters. The multiplier is expressed as the ratio
/// `multiplier / multiplier_base` to avoid floats.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BackoffConfig {
    pub base_delay_ms: u64,
    pub multiplier: u64,
    pub multiplier_base: u64,
    pub max_delay_ms: u64,
}

impl BackoffConfig {
    /// 200ms doubling up to 5s.
    pub fn reconnect() -> Self {
        Self {
            base_delay_ms: 200,
            multiplier: 2,
            multiplier_base: 1,
            max_delay_ms: 5_000,
        }
    }

    /// Rejects parameters that wouldn't back off, ie. zero or shrinking
    /// delays.
    pub fn validate(&self) -> Result<(), InvalidBackoff> {
        if self.base_delay_ms == 0 {
            return Err(InvalidBackoff::ZeroBaseDelay);
        }
        if self.multiplier_base == 0 {
            return Err(InvalidBackoff::ZeroMultiplierBase);
        }
        if self.multiplier < self.multiplier_base {
            return Err(InvalidBackoff::ShrinkingMultiplier {
                multiplier: self.multiplier,
                multiplier_base: self.multiplier_base,
            });
        }
        if self.max_delay_ms < self.base_delay_ms {
            return Err(InvalidBackoff::MaxBelowBase {
                base: self.base_delay_ms,
                max: self.max_delay_ms,
            });
        }
        Ok(())
    }

    /// Expects a config that passed [`validate`](Self::validate).
    pub fn to_policy(&self) -> ExponentialBackoff {
        ExponentialBackoff::new(self.base_delay_ms, self.multiplier, self.multiplier_base)
            .with_max_delay_ms(self.max_delay_ms)
    }

    /// 100ms doubling up to 2s.
    pub fn execution_retry() -> Self {
        Self {
            base_delay_ms: 100,
            multiplier: 2,
            multiplier_base: 1,
            max_delay_ms: 2_000,
        }
    }
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum InvalidBackoff {
    #[error("base_delay_ms must be above 0")]
    ZeroBaseDelay,

    #[error("multiplier_base must be above 0")]
    ZeroMultiplierBase,

    #[error("multiplier {multiplier}/{multiplier_base} would shrink delays")]
    ShrinkingMultiplier { multiplier: u64, multiplier_base: u64 },

    #[error("max_delay_ms {max} is below base_delay_ms {base}")]
    MaxBelowBase { base: u64, max: u64 },
}

#[cfg(test)]
mod tests {
    use goliath_common::retry::Backoff;

    use super::*;

    #[test]
    fn test_reconnect_policy() {
        let policy = BackoffConfig::reconnect().to_policy();
        assert_eq!(policy.base_delay_ms(), 200);
        assert_eq!(policy.next_delay_ms(200), 400);
        assert_eq!(policy.next_delay_ms(4_000), 5_000);
        assert_eq!(policy.max_delay_ms(), 5_000);
    }

    #[test]
    fn test_backoff_validation() {
        assert_eq!(BackoffConfig::reconnect().validate(), Ok(()));
        assert_eq!(BackoffConfig::execution_retry().validate(), Ok(()));

        let base = BackoffConfig::reconnect();
        let constant = BackoffConfig {
            multiplier: 1,
            multiplier_base: 1,
            ..base
        };
        assert_eq!(constant.validate(), Ok(()));

        let cases = [
            (
                BackoffConfig {
                    base_delay_ms: 0,
                    ..base
                },
                InvalidBackoff::ZeroBaseDelay,
            ),
            (
                BackoffConfig {
                    multiplier_base: 0,
                    ..base
                },
                InvalidBackoff::ZeroMultiplierBase,
            ),
            (
                BackoffConfig {
                    multiplier: 0,
                    ..base
                },
                InvalidBackoff::ShrinkingMultiplier {
                    multiplier: 0,
                    multiplier_base: 1,
                },
            ),
            (
                BackoffConfig {
                    max_delay_ms: 50,
                    ..base
                },
                InvalidBackoff::MaxBelowBase { base: 200, max: 50 },
            ),
        ];
        for (config, expected) in cases {
            assert_eq!(config.validate(), Err(expected), "{config:?}");
        }
    }
}
