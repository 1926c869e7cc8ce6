use super::Backoff;

/// Configuration for exponential retry backoff.
///
/// This struct defines how delays should increase between retry attempts
/// using a fixed-point multiplier. It avoids floating-point math by
/// expressing the multiplier as a ratio (`multiplier / multiplier_base`).
/// Delays never exceed `max_delay_ms`.
///
/// # Example
///
/// ```
/// use goliath_common::retry::{policies::ExponentialBackoff, Backoff};
///
/// // Starts at 200ms, doubles each retry and stays at 5s once reached:
/// // 200ms → 400ms → 800ms → ... → 5000ms → 5000ms
/// let backoff = ExponentialBackoff::new(200, 2, 1).with_max_delay_ms(5_000);
/// assert_eq!(backoff.next_delay_ms(4_000), 5_000);
/// ```
#[derive(Clone, Debug)]
pub struct ExponentialBackoff {
    /// Initial delay before the first retry, in milliseconds.
    base_delay_ms: u64,

    /// Numerator of the backoff multiplier (e.g., `150` for 1.5x).
    multiplier: u64,

    /// Denominator of the backoff multiplier (e.g., `100` for 1.5x).
    multiplier_base: u64,

    /// Upper bound on any single delay, in milliseconds.
    max_delay_ms: u64,
}

impl ExponentialBackoff {
    pub fn new(base_delay_ms: u64, multiplier: u64, multiplier_base: u64) -> Self {
        assert!(multiplier_base != 0);
        Self {
            base_delay_ms,
            multiplier,
            multiplier_base,
            max_delay_ms: u64::MAX,
        }
    }

    pub fn with_max_delay_ms(mut self, max_delay_ms: u64) -> Self {
        self.max_delay_ms = max_delay_ms;
        self
    }

    pub fn max_delay_ms(&self) -> u64 {
        self.max_delay_ms
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            base_delay_ms: 200,
            multiplier: 2,
            multiplier_base: 1,
            max_delay_ms: 5_000,
        }
    }
}

impl Backoff for ExponentialBackoff {
    fn base_delay_ms(&self) -> u64 {
        self.base_delay_ms.min(self.max_delay_ms)
    }

    fn next_delay_ms(&self, curr_delay_ms: u64) -> u64 {
        (curr_delay_ms.saturating_mul(self.multiplier) / self.multiplier_base)
            .min(self.max_delay_ms)
    }
}
