use crate::client::{Connector, TlsConnector};
use crate::config::SessionConfig;
use crate::error::Result;
use crate::framework::DeviceFramework;
use crate::identity;
use crate::session::SessionManager;
use crate::types::{Capabilities, DeviceId, DeviceIdentity, DiscoverySource};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Set of active device sessions, one per device id
///
/// Discovery transports call [`on_discovered`](Self::on_discovered) or
/// [`add`](Self::add) concurrently; admission runs under a single lock so a
/// device reported by both transports gets exactly one session.
///
/// # Example
///
/// ```no_run
/// use cast_fleet::{DiscoverySource, Fleet, DEFAULT_CAST_PORT};
/// # use cast_fleet::{CommandHandler, DeviceFramework, DeviceHandle, DeviceIdentity, Capabilities, PlaybackState, Volume};
/// # use std::sync::Arc;
/// # struct Framework;
/// # struct Handle;
/// # impl DeviceHandle for Handle {
/// #     fn publish_volume_state(&self, _: Volume) -> cast_fleet::Result<()> { Ok(()) }
/// #     fn publish_playback_state(&self, _: PlaybackState) -> cast_fleet::Result<()> { Ok(()) }
/// # }
/// # impl DeviceFramework for Framework {
/// #     fn register_device(&self, _: &DeviceIdentity, _: Capabilities, _: Arc<dyn CommandHandler>)
/// #         -> cast_fleet::Result<Arc<dyn DeviceHandle>> { Ok(Arc::new(Handle)) }
/// # }
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let fleet = Fleet::new(Arc::new(Framework));
///
///     let attributes: std::collections::HashMap<String, String> = [("id", "4a1b2c3d4e5f60718293a4b5c6d7e8f9"), ("fn", "Living Room")]
///         .into_iter()
///         .map(|(k, v)| (k.to_string(), v.to_string()))
///         .collect();
///     let created = fleet
///         .on_discovered("192.168.1.40".parse()?, DEFAULT_CAST_PORT, DiscoverySource::Mdns, &attributes)
///         .await?;
///     println!("new device: {}", created);
///     Ok(())
/// }
/// ```
pub struct Fleet {
    sessions: Mutex<HashMap<DeviceId, Arc<SessionManager>>>,
    connector: Arc<dyn Connector>,
    framework: Arc<dyn DeviceFramework>,
    config: SessionConfig,
}

impl Fleet {
    /// Create a fleet that connects to devices over TLS with default settings
    pub fn new(framework: Arc<dyn DeviceFramework>) -> Self {
        Self::with_connector(framework, Arc::new(TlsConnector), SessionConfig::default())
    }

    pub fn with_connector(
        framework: Arc<dyn DeviceFramework>,
        connector: Arc<dyn Connector>,
        config: SessionConfig,
    ) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            connector,
            framework,
            config,
        }
    }

    /// Entry point for discovery transports
    ///
    /// Resolves the raw attributes to an identity and admits the device.
    pub async fn on_discovered(
        &self,
        host: IpAddr,
        port: u16,
        source: DiscoverySource,
        attributes: &HashMap<String, String>,
    ) -> Result<bool> {
        let identity = identity::resolve(source, attributes)?;
        self.add(host, port, identity).await
    }

    /// Admit a device, returning whether a new session was created
    ///
    /// Re-discovery of a known id is silent and returns `false`. If the
    /// connection or session bring-up fails the device is not recorded, so a
    /// later discovery event retries it.
    pub async fn add(&self, host: IpAddr, port: u16, identity: DeviceIdentity) -> Result<bool> {
        let mut sessions = self.sessions.lock().await;

        if sessions.contains_key(&identity.id) {
            tracing::debug!(
                "Ignoring repeat discovery of {} via {}",
                identity.id,
                identity.discovery_source
            );
            return Ok(false);
        }

        tracing::info!(
            "Found new cast device {} ({}) at {}:{} via {}",
            identity.friendly_name,
            identity.id,
            host,
            port,
            identity.discovery_source
        );

        let transport = self.connector.connect(host, port).await?;

        let session = match SessionManager::start(identity.clone(), transport.clone(), self.config.clone()).await {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!("Failed to start session for {}: {}", identity.id, e);
                transport.close().await;
                return Err(e);
            }
        };

        let capabilities = Capabilities {
            volume: true,
            playback: self.config.playback_capability,
        };
        let handle = match self
            .framework
            .register_device(&identity, capabilities, session.commands())
        {
            Ok(handle) => handle,
            Err(e) => {
                tracing::warn!("Failed to register {}: {}", identity.id, e);
                session.shutdown().await;
                return Err(e);
            }
        };
        session.attach(handle);

        sessions.insert(identity.id, session);
        Ok(true)
    }

    /// Session for a device id
    pub async fn session(&self, id: &str) -> Option<Arc<SessionManager>> {
        self.sessions.lock().await.get(id).cloned()
    }

    /// Ids of every admitted device
    pub async fn device_ids(&self) -> Vec<DeviceId> {
        self.sessions.lock().await.keys().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }

    /// Shut down every session
    pub async fn shutdown(&self) {
        let sessions: Vec<_> = self.sessions.lock().await.drain().map(|(_, s)| s).collect();
        for session in sessions {
            session.shutdown().await;
        }
    }
}
