use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use super::BackoffPolicy;
use crate::Error;
use crate::Result;

/// Informer settings shared by every watch registered on an engine
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WatchConfig {
    /// How often `run` re-checks `has_synced` while gating worker startup
    #[serde(default = "default_sync_poll_interval_ms")]
    pub sync_poll_interval_ms: u64,

    /// Backoff between re-list attempts after a list or watch failure
    #[serde(default)]
    pub relist_backoff: BackoffPolicy,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            sync_poll_interval_ms: default_sync_poll_interval_ms(),
            relist_backoff: BackoffPolicy::default(),
        }
    }
}

impl WatchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.sync_poll_interval_ms < 1 {
            return Err(Error::Config(ConfigError::Message(
                "watch.sync_poll_interval_ms must be at least 1ms".into(),
            )));
        }
        self.relist_backoff.validate()
    }

    pub fn sync_poll_interval(&self) -> Duration {
        Duration::from_millis(self.sync_poll_interval_ms)
    }
}

fn default_sync_poll_interval_ms() -> u64 {
    100
}
