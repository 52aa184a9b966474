use crate::connection::Transport;
use crate::error::Result;
use crate::protocol::{CastMessage, EndpointPair, MediaStatusEntry, Request, NS_MEDIA};
use crate::subscription::Incoming;
use crate::types::MediaSessionId;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Where media requests currently go
#[derive(Debug, Default)]
struct MediaTarget {
    /// Transport id of the bound application session
    destination: Option<String>,
    /// Last media session id and the transport id that reported it
    media_session: Option<(String, MediaSessionId)>,
}

/// Controller for a media application session
///
/// Starts unbound. Until [`set_destination`](Self::set_destination) binds it to
/// an application's transport id, requests go to the receiver's own endpoint,
/// which rejects or ignores them.
///
/// Media status can arrive before the receiver report that announces its
/// session, so the media session id is kept per reporting transport and only
/// applies once the controller is bound to that transport.
pub struct MediaController {
    transport: Arc<dyn Transport>,
    /// Sender id plus the receiver endpoint used while unbound
    fallback: EndpointPair,
    target: Mutex<MediaTarget>,
}

impl MediaController {
    pub fn new(transport: Arc<dyn Transport>, fallback: EndpointPair) -> Self {
        Self {
            transport,
            fallback,
            target: Mutex::new(MediaTarget::default()),
        }
    }

    /// The bound application transport id, if any
    pub fn destination(&self) -> Option<String> {
        self.target.lock().destination.clone()
    }

    /// Rebind to a new application session, or unbind with `None`
    ///
    /// A media session id reported by another transport is dropped.
    pub fn set_destination(&self, destination: Option<String>) {
        let mut target = self.target.lock();
        let reported_elsewhere = target
            .media_session
            .as_ref()
            .is_some_and(|(source, _)| Some(source) != destination.as_ref());
        if reported_elsewhere {
            target.media_session = None;
        }
        target.destination = destination;
    }

    /// Media session id of the bound application session, if it has reported one
    pub fn media_session_id(&self) -> Option<MediaSessionId> {
        let target = self.target.lock();
        match (&target.destination, &target.media_session) {
            (Some(destination), Some((source, id))) if source == destination => Some(*id),
            _ => None,
        }
    }

    /// Record the media session id reported by `source`
    pub fn set_media_session_id(&self, source: &str, id: MediaSessionId) {
        self.target.lock().media_session = Some((source.to_string(), id));
    }

    /// Endpoint pair requests are currently sent on
    pub fn endpoints(&self) -> EndpointPair {
        match self.destination() {
            Some(destination) => self.fallback.with_receiver(destination),
            None => self.fallback.clone(),
        }
    }

    /// Request the media status list of the bound session
    pub async fn get_status(&self, wait: Duration) -> Result<Vec<MediaStatusEntry>> {
        let request = Request::new(self.endpoints(), NS_MEDIA, "GET_STATUS");
        let reply = self.transport.request(request, wait).await?;
        reply.decode_status()
    }

    pub async fn play(&self, wait: Duration) -> Result<CastMessage> {
        self.transport.request(self.playback_request("PLAY"), wait).await
    }

    pub async fn pause(&self, wait: Duration) -> Result<CastMessage> {
        self.transport.request(self.playback_request("PAUSE"), wait).await
    }

    /// Stream of unsolicited `MEDIA_STATUS` pushes
    pub fn incoming(&self) -> Incoming<Vec<MediaStatusEntry>> {
        Incoming::new(self.transport.subscribe(), NS_MEDIA, "MEDIA_STATUS")
    }

    fn playback_request(&self, message_type: &str) -> Request {
        let request = Request::new(self.endpoints(), NS_MEDIA, message_type);
        match self.media_session_id() {
            Some(id) => request.with_field("mediaSessionId", Value::from(id)),
            None => request,
        }
    }
}
