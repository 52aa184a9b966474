use crate::config::SessionConfig;
use crate::connection::Transport;
use crate::controllers::{HeartbeatController, MediaController, ReceiverController, VirtualConnection};
use crate::error::{CastError, Result};
use crate::framework::{CommandHandler, DeviceHandle};
use crate::outbound::{self, PlaybackAction};
use crate::protocol::{EndpointPair, MediaStatusEntry, ReceiverStatus};
use crate::subscription::Incoming;
use crate::sync::{self, MediaBinding};
use crate::types::{DeviceIdentity, MediaSessionId, PlaybackCommand, PlaybackState, Volume, VolumeCommand};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Published state plus the handle it is published through
#[derive(Default)]
struct SessionState {
    /// `None` until the first status report has been synchronized
    volume: Option<Volume>,
    playback: Option<PlaybackState>,
    handle: Option<Arc<dyn DeviceHandle>>,
}

/// Point-in-time view of a session's synchronized state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionSnapshot {
    pub volume: Volume,
    pub playback: PlaybackState,
    pub media_session_id: Option<MediaSessionId>,
}

/// Control session with one Cast device
///
/// Owns the receiver and media controllers, keeps the published volume and
/// playback state in step with the device's status pushes, and applies
/// volume/playback commands. State only ever changes in response to what the
/// device reports; command replies are discarded.
pub struct SessionManager {
    identity: DeviceIdentity,
    transport: Arc<dyn Transport>,
    endpoints: EndpointPair,
    receiver: ReceiverController,
    media: MediaController,
    config: SessionConfig,
    state: Mutex<SessionState>,
    /// Held across each publish so the framework sees updates in the order they
    /// were recorded; the state lock itself is released before calling the handle
    publish_lock: Mutex<()>,
    /// Serializes receiver status handling between the seed request and the push loop
    sync_lock: tokio::sync::Mutex<()>,
    cancel: CancellationToken,
}

impl SessionManager {
    /// Bring up a session on an already-connected transport
    ///
    /// Heartbeat, virtual connection and controller setup failures are
    /// returned; a failed or late initial status request is only logged.
    pub async fn start(
        identity: DeviceIdentity,
        transport: Arc<dyn Transport>,
        config: SessionConfig,
    ) -> Result<Arc<Self>> {
        let span = tracing::info_span!("cast_device", id = %identity.id);
        let endpoints = EndpointPair::new(config.sender_id.clone(), config.receiver_id.clone());
        let cancel = CancellationToken::new();

        let bring_up = async {
            HeartbeatController::new(transport.clone(), endpoints.clone(), config.heartbeat_interval)
                .start(cancel.child_token())
                .await?;
            VirtualConnection::new(transport.clone(), endpoints.clone())
                .connect()
                .await
        };
        if let Err(e) = bring_up.instrument(span.clone()).await {
            cancel.cancel();
            return Err(e);
        }

        let session = Arc::new(Self {
            receiver: ReceiverController::new(transport.clone(), endpoints.clone()),
            media: MediaController::new(transport.clone(), endpoints.clone()),
            identity,
            transport,
            endpoints,
            config,
            state: Mutex::new(SessionState::default()),
            publish_lock: Mutex::new(()),
            sync_lock: tokio::sync::Mutex::new(()),
            cancel,
        });

        let receiver_updates = session.receiver.incoming();
        tokio::spawn(
            session
                .clone()
                .run_receiver_loop(receiver_updates)
                .instrument(span.clone()),
        );

        async {
            match session.receiver.get_status(session.config.status_timeout).await {
                Ok(status) => {
                    if let Err(e) = session.handle_receiver_status(status).await {
                        tracing::warn!("Failed to synchronize initial status: {}", e);
                    }
                }
                Err(e) => tracing::warn!("Initial status request failed: {}", e),
            }
        }
        .instrument(span.clone())
        .await;

        let media_updates = session.media.incoming();
        tokio::spawn(session.clone().run_media_loop(media_updates).instrument(span));

        tracing::info!(
            "Session started for {} ({})",
            session.identity.friendly_name,
            session.identity.id
        );
        Ok(session)
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    /// Current synchronized state
    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.lock();
        SessionSnapshot {
            volume: state.volume.unwrap_or_default(),
            playback: state.playback.unwrap_or_default(),
            media_session_id: self.media.media_session_id(),
        }
    }

    /// Transport id the media controller is bound to
    pub fn media_destination(&self) -> Option<String> {
        self.media.destination()
    }

    /// Token that stops this session's background tasks when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop background tasks and close the control channel
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down session for {}", self.identity.id);
        self.cancel.cancel();
        if let Err(e) = VirtualConnection::new(self.transport.clone(), self.endpoints.clone())
            .close()
            .await
        {
            tracing::debug!("Failed to close virtual connection: {}", e);
        }
        self.transport.close().await;
    }

    /// Start publishing through `handle`, beginning with the current state
    pub fn attach(&self, handle: Arc<dyn DeviceHandle>) {
        let _publishing = self.publish_lock.lock();
        let (volume, playback) = {
            let mut state = self.state.lock();
            state.handle = Some(handle.clone());
            (state.volume, state.playback)
        };

        if let Some(volume) = volume {
            if let Err(e) = handle.publish_volume_state(volume) {
                tracing::warn!("Failed to publish volume for {}: {}", self.identity.id, e);
            }
        }
        if let Some(playback) = playback.filter(|_| self.config.playback_capability) {
            if let Err(e) = handle.publish_playback_state(playback) {
                tracing::warn!("Failed to publish playback for {}: {}", self.identity.id, e);
            }
        }
    }

    /// Command handler the device framework can hold without keeping the session alive
    pub fn commands(self: &Arc<Self>) -> Arc<dyn CommandHandler> {
        Arc::new(SessionCommands {
            session: Arc::downgrade(self),
        })
    }

    /// Send a volume change to the device
    ///
    /// The published volume changes only once the device pushes a status
    /// report reflecting the new value.
    pub async fn apply_volume(&self, command: VolumeCommand) -> Result<()> {
        tracing::info!("Applying volume {:?} to {}", command, self.identity.id);

        let payload = outbound::volume_payload(&command);
        if payload.is_empty() {
            tracing::debug!("Ignoring empty volume command");
            return Ok(());
        }

        self.receiver
            .set_volume(&payload, self.config.volume_timeout)
            .await?;
        Ok(())
    }

    /// Send play or pause to the bound media session
    ///
    /// With no media session bound the request goes to the receiver endpoint
    /// and whatever the device answers is returned.
    pub async fn apply_playback(&self, command: PlaybackCommand) -> Result<()> {
        let wait = self.config.playback_timeout;
        let action = outbound::playback_action(command);
        tracing::info!("Applying {:?} to {}", action, self.identity.id);

        match action {
            PlaybackAction::Play => self.media.play(wait).await?,
            PlaybackAction::Pause => self.media.pause(wait).await?,
        };
        Ok(())
    }

    async fn run_receiver_loop(self: Arc<Self>, mut updates: Incoming<ReceiverStatus>) {
        loop {
            let update = tokio::select! {
                _ = self.cancel.cancelled() => break,
                update = updates.recv() => update,
            };
            match update {
                Ok(status) => {
                    if let Err(e) = self.handle_receiver_status(status).await {
                        tracing::warn!("Failed to synchronize receiver status: {}", e);
                    }
                }
                Err(CastError::ConnectionClosed) => {
                    tracing::info!("Receiver status channel closed");
                    break;
                }
                Err(e) => tracing::warn!("Failed to synchronize receiver status: {}", e),
            }
        }
    }

    async fn run_media_loop(self: Arc<Self>, mut updates: Incoming<Vec<MediaStatusEntry>>) {
        loop {
            let update = tokio::select! {
                _ = self.cancel.cancelled() => break,
                update = updates.recv_with_source() => update,
            };
            let result = match update {
                Ok((source, entries)) => self.handle_media_status(&source, &entries),
                Err(CastError::ConnectionClosed) => {
                    tracing::info!("Media status channel closed");
                    break;
                }
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                tracing::warn!("Failed to synchronize media status: {}", e);
            }
        }
    }

    async fn handle_receiver_status(&self, status: ReceiverStatus) -> Result<()> {
        let _guard = self.sync_lock.lock().await;

        let current = self.media.destination();
        let outcome = sync::synchronize(
            &status,
            current.as_deref(),
            self.config.media_session_policy,
        )?;
        self.publish_volume(outcome.volume);

        match outcome.binding {
            MediaBinding::Unchanged => Ok(()),
            MediaBinding::Rebind(transport_id) => self.bind_media_session(transport_id).await,
            MediaBinding::Release => {
                self.release_media_session(current).await;
                Ok(())
            }
        }
    }

    /// Connect to an application's session and point the media controller at it
    async fn bind_media_session(&self, transport_id: String) -> Result<()> {
        tracing::info!("Binding media session on {}", transport_id);

        VirtualConnection::new(self.transport.clone(), self.endpoints.with_receiver(&transport_id))
            .connect()
            .await?;
        self.media.set_destination(Some(transport_id.clone()));

        match self.media.get_status(self.config.status_timeout).await {
            Ok(entries) => self.handle_media_status(&transport_id, &entries),
            Err(e) => {
                tracing::warn!("Media status request failed: {}", e);
                Ok(())
            }
        }
    }

    async fn release_media_session(&self, previous: Option<String>) {
        if let Some(previous) = previous {
            tracing::info!("Media session on {} went away", previous);
            if let Err(e) = VirtualConnection::new(self.transport.clone(), self.endpoints.with_receiver(previous))
                .close()
                .await
            {
                tracing::debug!("Failed to close media virtual connection: {}", e);
            }
        }
        self.media.set_destination(None);
        self.publish_playback(PlaybackState::Inactive);
    }

    fn handle_media_status(&self, source: &str, entries: &[MediaStatusEntry]) -> Result<()> {
        if let Some(entry) = entries.first() {
            self.media.set_media_session_id(source, entry.media_session_id);
        }
        let playback = sync::playback_state(entries)?;
        self.publish_playback(playback);
        Ok(())
    }

    fn publish_volume(&self, volume: Volume) {
        let _publishing = self.publish_lock.lock();
        let handle = {
            let mut state = self.state.lock();
            state.volume = Some(volume);
            state.handle.clone()
        };

        if let Some(handle) = handle {
            if let Err(e) = handle.publish_volume_state(volume) {
                tracing::warn!("Failed to publish volume for {}: {}", self.identity.id, e);
            }
        }
    }

    fn publish_playback(&self, playback: PlaybackState) {
        let _publishing = self.publish_lock.lock();
        let handle = {
            let mut state = self.state.lock();
            state.playback = Some(playback);
            state.handle.clone()
        };
        if !self.config.playback_capability {
            return;
        }

        if let Some(handle) = handle {
            if let Err(e) = handle.publish_playback_state(playback) {
                tracing::warn!("Failed to publish playback for {}: {}", self.identity.id, e);
            }
        }
    }
}

/// Forwards framework control intents to a session
struct SessionCommands {
    session: Weak<SessionManager>,
}

#[async_trait]
impl CommandHandler for SessionCommands {
    async fn on_volume_command(&self, command: VolumeCommand) -> Result<()> {
        let session = self.session.upgrade().ok_or(CastError::ConnectionClosed)?;
        session.apply_volume(command).await
    }

    async fn on_playback_command(&self, command: PlaybackCommand) -> Result<()> {
        let session = self.session.upgrade().ok_or(CastError::ConnectionClosed)?;
        session.apply_playback(command).await
    }
}
