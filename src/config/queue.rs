use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Re-delivery policy for keys whose reconcile failed.
///
/// The effective delay is the larger of the per-key exponential backoff and
/// the overall token bucket wait.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RateLimiterConfig {
    /// First retry delay for a key (unit: milliseconds)
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Upper bound of the per-key backoff (unit: milliseconds)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Sustained re-delivery rate across all keys
    #[serde(default = "default_qps")]
    pub qps: f64,

    /// Re-deliveries allowed in a burst before `qps` applies
    #[serde(default = "default_burst")]
    pub burst: u32,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            qps: default_qps(),
            burst: default_burst(),
        }
    }
}

impl RateLimiterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.base_delay_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "queue.base_delay_ms must be greater than 0".into(),
            )));
        }

        if self.base_delay_ms > self.max_delay_ms {
            return Err(Error::Config(ConfigError::Message(format!(
                "queue.base_delay_ms ({}) must not exceed queue.max_delay_ms ({})",
                self.base_delay_ms, self.max_delay_ms
            ))));
        }

        if !(self.qps > 0.0 && self.qps.is_finite()) {
            return Err(Error::Config(ConfigError::Message(
                "queue.qps must be a positive number".into(),
            )));
        }

        if self.burst == 0 {
            return Err(Error::Config(ConfigError::Message("queue.burst must be at least 1".into())));
        }

        Ok(())
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

fn default_base_delay_ms() -> u64 {
    5
}
// 1000s
fn default_max_delay_ms() -> u64 {
    1_000_000
}
fn default_qps() -> f64 {
    10.0
}
fn default_burst() -> u32 {
    100
}
