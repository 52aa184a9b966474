//! Rust library for keeping a fleet of Google Cast receivers in sync
//!
//! This library turns discovery events for Cast devices into long-lived control
//! sessions, and mirrors each device's volume and playback state into an
//! external device framework. It supports:
//!
//! - Deduplicating devices reported by mDNS and UPnP discovery
//! - Heartbeat, virtual connection and receiver status on the receiver session
//! - Following the media application session the receiver creates on demand
//! - Volume and mute control, play and pause
//! - State updates driven only by the device's status pushes
//!
//! # Quick Start
//!
//! ```no_run
//! use cast_fleet::{
//!     Capabilities, CommandHandler, DeviceFramework, DeviceHandle, DeviceIdentity,
//!     DiscoverySource, Fleet, PlaybackState, Volume, VolumeCommand, DEFAULT_CAST_PORT,
//! };
//! use std::sync::Arc;
//!
//! struct PrintHandle(String);
//!
//! impl DeviceHandle for PrintHandle {
//!     fn publish_volume_state(&self, volume: Volume) -> cast_fleet::Result<()> {
//!         println!("{}: volume {:?}", self.0, volume);
//!         Ok(())
//!     }
//!
//!     fn publish_playback_state(&self, state: PlaybackState) -> cast_fleet::Result<()> {
//!         println!("{}: {}", self.0, state);
//!         Ok(())
//!     }
//! }
//!
//! struct PrintFramework;
//!
//! impl DeviceFramework for PrintFramework {
//!     fn register_device(
//!         &self,
//!         identity: &DeviceIdentity,
//!         _capabilities: Capabilities,
//!         _commands: Arc<dyn CommandHandler>,
//!     ) -> cast_fleet::Result<Arc<dyn DeviceHandle>> {
//!         Ok(Arc::new(PrintHandle(identity.friendly_name.clone())))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let fleet = Fleet::new(Arc::new(PrintFramework));
//!
//!     let attributes: std::collections::HashMap<String, String> = [("id", "4a1b2c3d4e5f60718293a4b5c6d7e8f9"), ("fn", "Living Room")]
//!         .into_iter()
//!         .map(|(k, v)| (k.to_string(), v.to_string()))
//!         .collect();
//!     fleet
//!         .on_discovered("192.168.1.40".parse()?, DEFAULT_CAST_PORT, DiscoverySource::Mdns, &attributes)
//!         .await?;
//!
//!     if let Some(session) = fleet.session("4a1b2c3d4e5f60718293a4b5c6d7e8f9").await {
//!         session.apply_volume(VolumeCommand::level(0.4)).await?;
//!     }
//!
//!     fleet.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! The library is organized into several layers:
//!
//! - **Registry**: `Fleet`, admission and deduplication of devices
//! - **Session**: `SessionManager`, one per device, owning the status loops
//! - **Sync / Outbound**: pure status mapping and command shaping
//! - **Controllers**: heartbeat, virtual connection, receiver and media requests
//! - **Connection**: TLS transport, request/reply matching and push broadcast
//! - **Frame / Protocol**: wire framing and JSON message structures

mod client;
mod config;
mod connection;
pub mod controllers;
mod error;
mod frame;
mod framework;
mod identity;
mod outbound;
mod protocol;
mod registry;
mod session;
mod subscription;
pub mod sync;
mod types;

#[cfg(test)]
mod test_fixtures;

// Public exports
pub use client::{Connector, TlsConnector};
pub use config::{MediaSessionPolicy, SessionConfig, DEFAULT_CAST_PORT};
pub use connection::{Connection, Transport};
pub use error::{CastError, Result};
pub use frame::CastCodec;
pub use framework::{CommandHandler, DeviceFramework, DeviceHandle};
pub use identity::resolve as resolve_identity;
pub use outbound::{playback_action, volume_payload, PlaybackAction};
pub use protocol::{
    AppNamespace, Application, CastMessage, EndpointPair, MediaStatusEntry, ReceiverStatus,
    Request, VolumePayload, DEFAULT_RECEIVER_ID, DEFAULT_SENDER_ID, NS_CONNECTION, NS_HEARTBEAT,
    NS_MEDIA, NS_RECEIVER,
};
pub use registry::Fleet;
pub use session::{SessionManager, SessionSnapshot};
pub use subscription::Incoming;
pub use types::{
    Capabilities, DeviceId, DeviceIdentity, DiscoverySource, MediaSessionId, PlaybackCommand,
    PlaybackState, Volume, VolumeCommand,
};
