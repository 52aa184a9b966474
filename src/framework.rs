//! Seam to the device framework that exposes state to external consumers.
//!
//! The framework receives a registration per admitted device, gets state
//! pushed through the returned [`DeviceHandle`], and forwards control intents
//! back through the [`CommandHandler`] it was given.

use crate::error::Result;
use crate::types::{Capabilities, DeviceIdentity, PlaybackCommand, PlaybackState, Volume, VolumeCommand};
use async_trait::async_trait;
use std::sync::Arc;

/// Registers devices with the external framework
pub trait DeviceFramework: Send + Sync {
    fn register_device(
        &self,
        identity: &DeviceIdentity,
        capabilities: Capabilities,
        commands: Arc<dyn CommandHandler>,
    ) -> Result<Arc<dyn DeviceHandle>>;
}

/// Publishes state for one registered device
///
/// Publishes for one device never overlap and arrive in the order the session
/// recorded them. They run outside the session's state lock, so a handle may
/// read [`SessionManager::snapshot`](crate::SessionManager::snapshot) while
/// handling one; it should not block, since the status loops wait on it.
pub trait DeviceHandle: Send + Sync {
    fn publish_volume_state(&self, volume: Volume) -> Result<()>;

    fn publish_playback_state(&self, state: PlaybackState) -> Result<()>;
}

/// Receives control intents for one registered device
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn on_volume_command(&self, command: VolumeCommand) -> Result<()>;

    async fn on_playback_command(&self, command: PlaybackCommand) -> Result<()>;
}
