use crate::error::{CastError, Result};
use crate::types::MediaSessionId;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Namespace for virtual connection setup and teardown
pub const NS_CONNECTION: &str = "urn:x-cast:com.google.cast.tp.connection";
/// Namespace for keep-alive pings
pub const NS_HEARTBEAT: &str = "urn:x-cast:com.google.cast.tp.heartbeat";
/// Namespace of the receiver's top-level control session
pub const NS_RECEIVER: &str = "urn:x-cast:com.google.cast.receiver";
/// Namespace an application session advertises when it accepts media control
pub const NS_MEDIA: &str = "urn:x-cast:com.google.cast.media";

/// Sender id used for every request this library makes
pub const DEFAULT_SENDER_ID: &str = "sender-0";
/// Well-known id of the receiver's own endpoint
pub const DEFAULT_RECEIVER_ID: &str = "receiver-0";

/// Reply types that signal a failed request
const ERROR_TYPES: [&str; 4] = [
    "INVALID_REQUEST",
    "LOAD_FAILED",
    "LOAD_CANCELLED",
    "INVALID_PLAYER_STATE",
];

/// Sender/receiver address pair of a virtual connection
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EndpointPair {
    pub sender: String,
    pub receiver: String,
}

impl EndpointPair {
    pub fn new(sender: impl Into<String>, receiver: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            receiver: receiver.into(),
        }
    }

    /// Same sender, different receiver
    pub fn with_receiver(&self, receiver: impl Into<String>) -> Self {
        Self::new(self.sender.clone(), receiver)
    }
}

/// A message as carried on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CastMessage {
    pub source_id: String,
    pub destination_id: String,
    pub namespace: String,
    /// UTF-8 JSON payload
    pub payload: String,
}

/// The fields every JSON payload shares
#[derive(Debug, Deserialize)]
struct Header {
    #[serde(rename = "type")]
    message_type: Option<String>,
    #[serde(rename = "requestId")]
    request_id: Option<u32>,
    reason: Option<String>,
}

impl CastMessage {
    fn header(&self) -> Option<Header> {
        serde_json::from_str(&self.payload).ok()
    }

    /// The payload's `type` field
    pub fn message_type(&self) -> Option<String> {
        self.header().and_then(|h| h.message_type)
    }

    /// The payload's `requestId`, if non-zero
    pub fn request_id(&self) -> Option<u32> {
        self.header()
            .and_then(|h| h.request_id)
            .filter(|id| *id != 0)
    }

    /// Reason for a failed request, if this message is an error reply
    pub fn rejection(&self) -> Option<String> {
        let header = self.header()?;
        let message_type = header.message_type?;
        if ERROR_TYPES.contains(&message_type.as_str()) {
            Some(header.reason.unwrap_or(message_type))
        } else {
            None
        }
    }

    /// Decode the `status` field of a status message
    ///
    /// Missing or malformed fields are reported as synchronization errors.
    pub fn decode_status<T: DeserializeOwned>(&self) -> Result<T> {
        let envelope: StatusEnvelope<T> = serde_json::from_str(&self.payload).map_err(|e| {
            CastError::Sync(format!("{} payload on {}: {}", self.namespace, self.source_id, e))
        })?;
        Ok(envelope.status)
    }
}

#[derive(Debug, Deserialize)]
struct StatusEnvelope<T> {
    status: T,
}

/// Outbound request on a virtual connection
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub endpoints: EndpointPair,
    pub namespace: String,
    pub payload: Map<String, Value>,
}

impl Request {
    /// Create a new request with the given message type
    pub fn new(endpoints: EndpointPair, namespace: impl Into<String>, message_type: &str) -> Self {
        let mut payload = Map::new();
        payload.insert("type".to_string(), Value::String(message_type.to_string()));
        Self {
            endpoints,
            namespace: namespace.into(),
            payload,
        }
    }

    /// Add a payload field
    pub fn with_field(mut self, key: &str, value: Value) -> Self {
        self.payload.insert(key.to_string(), value);
        self
    }

    /// The payload's `type` field
    pub fn message_type(&self) -> &str {
        self.payload
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    /// Serialize into a wire message, stamping `requestId` when given
    pub fn into_message(mut self, request_id: Option<u32>) -> Result<CastMessage> {
        if let Some(id) = request_id {
            self.payload.insert("requestId".to_string(), Value::from(id));
        }
        Ok(CastMessage {
            source_id: self.endpoints.sender,
            destination_id: self.endpoints.receiver,
            namespace: self.namespace,
            payload: serde_json::to_string(&self.payload)?,
        })
    }
}

/// Receiver-level status report
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReceiverStatus {
    #[serde(default)]
    pub applications: Vec<Application>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<VolumePayload>,
}

/// An application session running on the receiver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    /// Endpoint id the application's session is reachable on
    pub transport_id: String,
    #[serde(default)]
    pub namespaces: Vec<AppNamespace>,
}

impl Application {
    /// Whether the session speaks the given namespace
    pub fn supports(&self, namespace: &str) -> bool {
        self.namespaces.iter().any(|ns| ns.name == namespace)
    }
}

/// Namespace entry advertised by an application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppNamespace {
    pub name: String,
}

/// Volume sub-state, used both in status reports and in `SET_VOLUME`
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VolumePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub muted: Option<bool>,
}

impl VolumePayload {
    pub fn is_empty(&self) -> bool {
        self.level.is_none() && self.muted.is_none()
    }
}

/// One entry of a media status list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaStatusEntry {
    pub media_session_id: MediaSessionId,
    pub player_state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idle_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message(payload: Value) -> CastMessage {
        CastMessage {
            source_id: DEFAULT_RECEIVER_ID.to_string(),
            destination_id: "*".to_string(),
            namespace: NS_RECEIVER.to_string(),
            payload: payload.to_string(),
        }
    }

    #[test]
    fn decodes_receiver_status_report() {
        let msg = message(json!({
            "requestId": 0,
            "type": "RECEIVER_STATUS",
            "status": {
                "applications": [{
                    "appId": "CC1AD845",
                    "displayName": "Default Media Receiver",
                    "namespaces": [{"name": NS_MEDIA}, {"name": "urn:x-cast:com.google.cast.debug"}],
                    "sessionId": "7E2FF513-CDF6-9A91-2B28-3E3DE7BAC174",
                    "statusText": "Ready To Cast",
                    "transportId": "web-5"
                }],
                "volume": {"level": 0.35, "muted": false}
            }
        }));

        assert_eq!(msg.message_type().as_deref(), Some("RECEIVER_STATUS"));
        assert_eq!(msg.request_id(), None);

        let status: ReceiverStatus = msg.decode_status().unwrap();
        assert_eq!(status.applications.len(), 1);
        assert!(status.applications[0].supports(NS_MEDIA));
        assert_eq!(status.applications[0].transport_id, "web-5");
        assert_eq!(status.volume.unwrap().level, Some(0.35));
    }

    #[test]
    fn malformed_status_is_sync_error() {
        let msg = message(json!({"type": "RECEIVER_STATUS", "status": {"applications": "nope"}}));
        let result: Result<ReceiverStatus> = msg.decode_status();
        assert!(matches!(result, Err(CastError::Sync(_))));
    }

    #[test]
    fn error_reply_is_rejection() {
        let msg = message(json!({"type": "INVALID_REQUEST", "reason": "INVALID_COMMAND", "requestId": 3}));
        assert_eq!(msg.rejection().as_deref(), Some("INVALID_COMMAND"));
        assert_eq!(msg.request_id(), Some(3));

        let ok = message(json!({"type": "RECEIVER_STATUS", "requestId": 3, "status": {}}));
        assert_eq!(ok.rejection(), None);
    }

    #[test]
    fn request_stamps_request_id() {
        let msg = Request::new(EndpointPair::new(DEFAULT_SENDER_ID, DEFAULT_RECEIVER_ID), NS_RECEIVER, "GET_STATUS")
            .into_message(Some(7))
            .unwrap();
        assert_eq!(msg.source_id, DEFAULT_SENDER_ID);
        assert_eq!(msg.destination_id, DEFAULT_RECEIVER_ID);
        let payload: Value = serde_json::from_str(&msg.payload).unwrap();
        assert_eq!(payload, json!({"type": "GET_STATUS", "requestId": 7}));
    }
}
