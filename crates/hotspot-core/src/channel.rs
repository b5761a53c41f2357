//! The privileged actuation channel.
//!
//! Starting, stopping and reconfiguring the access point requires elevated
//! rights that the daemon does not hold itself. An [`ActuationChannel`]
//! brokers those calls and reports whether it is currently usable.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::Result;
use crate::types::{AccessPointConfiguration, Capabilities};

/// Connection state of the privileged channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChannelState {
    /// Not reachable.
    #[default]
    Disconnected,
    /// Handshake in progress.
    Connecting,
    /// Ready to actuate.
    Connected,
}

/// Elevated operations on the access point.
///
/// Start and stop are expected to be idempotent: starting an access point
/// that is already up is a successful no-op. All operations fail with
/// [`crate::HotspotError::ChannelUnavailable`] when the channel is down.
#[async_trait]
pub trait ActuationChannel: Send + Sync {
    /// Current connection state. May suspend indefinitely if the broker
    /// hangs; callers do not impose a timeout.
    async fn connection_state(&self) -> ChannelState;

    /// What the radio supports.
    async fn capabilities(&self) -> Result<Capabilities>;

    /// The configuration the access point is currently running with.
    async fn current_configuration(&self) -> Result<AccessPointConfiguration>;

    /// Start the access point. `force` starts it even if another owner
    /// stopped it last.
    async fn start_access_point(&self, force: bool) -> Result<()>;

    /// Stop the access point. `force` stops it even if another owner
    /// started it.
    async fn stop_access_point(&self, force: bool) -> Result<()>;

    /// Persist and apply `configuration`. Returns `false` if the access
    /// point refused it.
    async fn apply_configuration(&self, configuration: &AccessPointConfiguration) -> Result<bool>;
}
