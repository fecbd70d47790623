use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;
use tracing::warn;

use crate::Error;
use crate::Result;

/// Tunables of the sync transport, facade and lanes.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Name of the inter-context channel every transport joins
    ///
    /// Transports only hear each other when they use the same name.
    ///
    /// **Default**: "data-sync"
    #[serde(default = "default_channel_name")]
    pub channel_name: String,

    /// Period of the full-refresh ticker in milliseconds
    ///
    /// Every tick broadcasts a `data-refresh` message, which wakes all
    /// wildcard subscribers in every context.
    ///
    /// **Default**: 30000 (30 seconds)
    #[serde(default = "default_refresh_interval_ms")]
    pub refresh_interval_ms: u64,

    /// How long the facade reports "in progress" after a sync signal
    ///
    /// Presentation only; not tied to any fetch completing.
    ///
    /// **Default**: 1000 (1 second)
    #[serde(default = "default_syncing_window_ms")]
    pub syncing_window_ms: u64,

    /// Frames buffered per inter-context channel
    ///
    /// A receiver that falls further behind loses frames and triggers a
    /// wildcard refresh instead.
    ///
    /// **Default**: 256
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Mutation events buffered by the shared store feed
    ///
    /// **Default**: 256
    #[serde(default = "default_store_event_capacity")]
    pub store_event_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            channel_name: default_channel_name(),
            refresh_interval_ms: default_refresh_interval_ms(),
            syncing_window_ms: default_syncing_window_ms(),
            channel_capacity: default_channel_capacity(),
            store_event_capacity: default_store_event_capacity(),
        }
    }
}

impl SyncConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn syncing_window(&self) -> Duration {
        Duration::from_millis(self.syncing_window_ms)
    }

    /// Validates sync configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.channel_name.trim().is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "channel_name must not be empty".into(),
            )));
        }

        if self.refresh_interval_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "refresh_interval_ms must be greater than 0".into(),
            )));
        }

        if self.refresh_interval_ms < 1000 {
            warn!(
                "refresh_interval_ms ({}) is below one second; every tick wakes all wildcard subscribers",
                self.refresh_interval_ms
            );
        }

        if self.syncing_window_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "syncing_window_ms must be greater than 0".into(),
            )));
        }

        if self.syncing_window_ms > self.refresh_interval_ms {
            warn!(
                "syncing_window_ms ({}) exceeds refresh_interval_ms ({}); the facade will report syncing permanently",
                self.syncing_window_ms, self.refresh_interval_ms
            );
        }

        if self.channel_capacity == 0 {
            return Err(Error::Config(ConfigError::Message(
                "channel_capacity must be greater than 0".into(),
            )));
        }

        if self.store_event_capacity == 0 {
            return Err(Error::Config(ConfigError::Message(
                "store_event_capacity must be greater than 0".into(),
            )));
        }

        Ok(())
    }
}

fn default_channel_name() -> String {
    "data-sync".to_string()
}

const fn default_refresh_interval_ms() -> u64 {
    30_000
}

const fn default_syncing_window_ms() -> u64 {
    1_000
}

const fn default_channel_capacity() -> usize {
    256
}

const fn default_store_event_capacity() -> usize {
    256
}
