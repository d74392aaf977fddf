use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Per-controller behaviour of the engine
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ControllerConfig {
    /// Name used in logs and metric labels
    #[serde(default = "default_name")]
    pub name: String,

    /// Failures tolerated per key before it is dropped and reported.
    /// Credential-sensitive controllers typically raise this to 20.
    #[serde(default = "default_max_requeue_attempts")]
    pub max_requeue_attempts: u32,

    /// Period for re-delivering every cached object as an update (0 = never)
    #[serde(default)]
    pub resync_period_ms: u64,

    /// Worker count used by the demo binary; library callers pass it to `run`
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            max_requeue_attempts: default_max_requeue_attempts(),
            resync_period_ms: 0,
            workers: default_workers(),
        }
    }
}

impl ControllerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Config(ConfigError::Message("controller.name must not be empty".into())));
        }

        if self.workers == 0 {
            return Err(Error::Config(ConfigError::Message(
                "controller.workers must be at least 1".into(),
            )));
        }

        Ok(())
    }

    pub fn resync_period(&self) -> Option<Duration> {
        (self.resync_period_ms > 0).then(|| Duration::from_millis(self.resync_period_ms))
    }
}

fn default_name() -> String {
    "controller".to_string()
}
fn default_max_requeue_attempts() -> u32 {
    5
}
fn default_workers() -> usize {
    1
}
