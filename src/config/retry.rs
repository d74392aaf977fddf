use std::time::Duration;

use config::ConfigError;
use rand::Rng;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Basic retry policy template
#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct BackoffPolicy {
    /// Backoff base (unit: milliseconds)
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Maximum backoff time (unit: milliseconds)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Random extra delay as a fraction of the computed delay, in `[0, 1]`
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter: default_jitter(),
        }
    }
}

impl BackoffPolicy {
    pub fn validate(&self) -> Result<()> {
        if self.base_delay_ms == 0 || self.base_delay_ms > self.max_delay_ms {
            return Err(Error::Config(ConfigError::Message(format!(
                "backoff base_delay_ms ({}) must be in 1..=max_delay_ms ({})",
                self.base_delay_ms, self.max_delay_ms
            ))));
        }

        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(Error::Config(ConfigError::Message(
                "backoff jitter must be within [0, 1]".into(),
            )));
        }

        Ok(())
    }

    /// Delay before retry number `attempt` (0-based): doubles each time, capped
    /// at `max_delay_ms`, then stretched by up to `jitter`.
    pub fn delay_for(
        &self,
        attempt: u32,
    ) -> Duration {
        let exp = self.base_delay_ms.saturating_mul(1u64.checked_shl(attempt.min(63)).unwrap_or(u64::MAX));
        let capped = exp.min(self.max_delay_ms);

        let extra = if self.jitter > 0.0 {
            let factor = rand::thread_rng().gen_range(0.0..=self.jitter);
            (capped as f64 * factor) as u64
        } else {
            0
        };

        Duration::from_millis(capped.saturating_add(extra))
    }
}

fn default_base_delay_ms() -> u64 {
    100
}
fn default_max_delay_ms() -> u64 {
    30_000
}
fn default_jitter() -> f64 {
    0.1
}
