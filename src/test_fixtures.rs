//! Shared fakes for session and registry tests.

use crate::client::Connector;
use crate::connection::Transport;
use crate::error::{CastError, Result};
use crate::framework::{CommandHandler, DeviceFramework, DeviceHandle};
use crate::protocol::{CastMessage, Request, NS_MEDIA, NS_RECEIVER};
use crate::types::{Capabilities, DeviceIdentity, PlaybackState, Volume};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// In-memory device answering requests from canned status payloads
pub struct FakeTransport {
    sent: Mutex<Vec<Request>>,
    push_tx: Mutex<Option<broadcast::Sender<CastMessage>>>,
    /// `status` body returned for receiver `GET_STATUS` and `SET_VOLUME`
    receiver_status: Mutex<Value>,
    /// `status` body returned for media requests
    media_status: Mutex<Value>,
    /// Leave receiver `GET_STATUS` unanswered
    pub stall_receiver_status: AtomicBool,
    /// Fail every send, as a dead socket would
    pub fail_sends: AtomicBool,
    pub closed: AtomicBool,
}

impl FakeTransport {
    pub fn new(receiver_status: Value) -> Arc<Self> {
        let (push_tx, _) = broadcast::channel(64);
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            push_tx: Mutex::new(Some(push_tx)),
            receiver_status: Mutex::new(receiver_status),
            media_status: Mutex::new(json!([])),
            stall_receiver_status: AtomicBool::new(false),
            fail_sends: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        })
    }

    pub fn set_media_status(&self, status: Value) {
        *self.media_status.lock() = status;
    }

    /// Every request sent so far
    pub fn sent(&self) -> Vec<Request> {
        self.sent.lock().clone()
    }

    /// Requests matching a namespace and message type
    pub fn sent_of(&self, namespace: &str, message_type: &str) -> Vec<Request> {
        self.sent()
            .into_iter()
            .filter(|r| r.namespace == namespace && r.message_type() == message_type)
            .collect()
    }

    /// Deliver an unsolicited status message
    pub fn push(&self, source: &str, namespace: &str, message_type: &str, status: Value) {
        let msg = CastMessage {
            source_id: source.to_string(),
            destination_id: "*".to_string(),
            namespace: namespace.to_string(),
            payload: json!({"type": message_type, "requestId": 0, "status": status}).to_string(),
        };
        if let Some(tx) = self.push_tx.lock().as_ref() {
            let _ = tx.send(msg);
        }
    }

    /// Drop the push channel as a closing connection would
    pub fn hang_up(&self) {
        self.push_tx.lock().take();
    }

    fn reply(request: &Request, message_type: &str, status: Value) -> CastMessage {
        CastMessage {
            source_id: request.endpoints.receiver.clone(),
            destination_id: request.endpoints.sender.clone(),
            namespace: request.namespace.clone(),
            payload: json!({"type": message_type, "requestId": 1, "status": status}).to_string(),
        }
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send(&self, request: Request) -> Result<()> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(CastError::ConnectionClosed);
        }
        self.sent.lock().push(request);
        Ok(())
    }

    async fn request(&self, request: Request, wait: Duration) -> Result<CastMessage> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(CastError::ConnectionClosed);
        }
        self.sent.lock().push(request.clone());

        match (request.namespace.as_str(), request.message_type()) {
            (NS_RECEIVER, "GET_STATUS") if self.stall_receiver_status.load(Ordering::SeqCst) => {
                tokio::time::sleep(wait).await;
                Err(CastError::Timeout)
            }
            (NS_RECEIVER, _) => {
                let status = self.receiver_status.lock().clone();
                Ok(Self::reply(&request, "RECEIVER_STATUS", status))
            }
            (NS_MEDIA, _) => {
                let status = self.media_status.lock().clone();
                Ok(Self::reply(&request, "MEDIA_STATUS", status))
            }
            _ => Err(CastError::Timeout),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<CastMessage> {
        match self.push_tx.lock().as_ref() {
            Some(tx) => tx.subscribe(),
            None => broadcast::channel(1).1,
        }
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.hang_up();
    }
}

/// Connector handing out fake transports and counting connection attempts
pub struct FakeConnector {
    pub connects: AtomicUsize,
    pub fail: AtomicBool,
    /// Hand out transports whose sends fail, so session bring-up fails
    pub fail_sessions: AtomicBool,
    receiver_status: Value,
    pub transports: Mutex<Vec<Arc<FakeTransport>>>,
}

impl FakeConnector {
    pub fn new(receiver_status: Value) -> Arc<Self> {
        Arc::new(Self {
            connects: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
            fail_sessions: AtomicBool::new(false),
            receiver_status,
            transports: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self, _host: IpAddr, _port: u16) -> Result<Arc<dyn Transport>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        // widen the admission window so racing callers overlap
        tokio::time::sleep(Duration::from_millis(20)).await;
        if self.fail.load(Ordering::SeqCst) {
            return Err(CastError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            )));
        }
        let transport = FakeTransport::new(self.receiver_status.clone());
        transport
            .fail_sends
            .store(self.fail_sessions.load(Ordering::SeqCst), Ordering::SeqCst);
        self.transports.lock().push(transport.clone());
        Ok(transport)
    }
}

/// Handle recording everything published through it
#[derive(Default)]
pub struct RecordingHandle {
    pub volumes: Mutex<Vec<Volume>>,
    pub playback: Mutex<Vec<PlaybackState>>,
}

impl RecordingHandle {
    pub fn last_volume(&self) -> Option<Volume> {
        self.volumes.lock().last().copied()
    }

    pub fn last_playback(&self) -> Option<PlaybackState> {
        self.playback.lock().last().copied()
    }
}

impl DeviceHandle for RecordingHandle {
    fn publish_volume_state(&self, volume: Volume) -> Result<()> {
        self.volumes.lock().push(volume);
        Ok(())
    }

    fn publish_playback_state(&self, state: PlaybackState) -> Result<()> {
        self.playback.lock().push(state);
        Ok(())
    }
}

/// Framework recording registrations
#[derive(Default)]
pub struct RecordingFramework {
    pub registered: Mutex<Vec<(DeviceIdentity, Capabilities)>>,
    pub handles: Mutex<Vec<Arc<RecordingHandle>>>,
    pub commands: Mutex<Vec<Arc<dyn CommandHandler>>>,
    pub fail: AtomicBool,
}

impl DeviceFramework for RecordingFramework {
    fn register_device(
        &self,
        identity: &DeviceIdentity,
        capabilities: Capabilities,
        commands: Arc<dyn CommandHandler>,
    ) -> Result<Arc<dyn DeviceHandle>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(CastError::Framework("registration refused".to_string()));
        }
        let handle = Arc::new(RecordingHandle::default());
        self.registered.lock().push((identity.clone(), capabilities));
        self.handles.lock().push(handle.clone());
        self.commands.lock().push(commands);
        Ok(handle)
    }
}

/// Receiver status body with a volume and optional applications
pub fn receiver_status(level: f64, muted: bool, applications: Value) -> Value {
    json!({
        "applications": applications,
        "volume": {"level": level, "muted": muted}
    })
}

/// Application entry speaking the media namespace
pub fn media_app(transport_id: &str) -> Value {
    json!({
        "appId": "CC1AD845",
        "displayName": "Default Media Receiver",
        "sessionId": format!("session-{}", transport_id),
        "statusText": "Ready To Cast",
        "transportId": transport_id,
        "namespaces": [{"name": NS_MEDIA}, {"name": "urn:x-cast:com.google.cast.debug"}]
    })
}

pub fn identity(id: &str) -> DeviceIdentity {
    DeviceIdentity {
        id: id.to_string(),
        friendly_name: format!("Test {}", id),
        discovery_source: crate::types::DiscoverySource::Mdns,
    }
}

/// Poll `condition` until it holds or two seconds pass
pub async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
