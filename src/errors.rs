//! Error hierarchy for the data-sync subsystem
//!
//! Nothing in the notification path is fatal. Lane failures are produced as
//! [`ChannelError`] values, logged at the call site and then dropped; only
//! configuration loading hands errors back to the caller.

use config::ConfigError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration loading or validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Inter-context channel failures
    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// Wire encoding of a sync message failed
    #[error("Sync message codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ChannelError {
    /// The hub no longer hands out ports
    #[error("Channel hub is shut down")]
    HubClosed,

    /// Channel names must contain at least one non-whitespace character
    #[error("Invalid channel name: {0:?}")]
    InvalidName(String),

    /// Posting through a port that was already closed
    #[error("Channel port {port_id} is closed")]
    PortClosed { port_id: u64 },

    /// Nobody is listening on the channel, not even the sender
    #[error("No receivers attached to channel {channel}")]
    NoPeers { channel: String },
}
