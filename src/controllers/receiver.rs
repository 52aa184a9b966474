use crate::connection::Transport;
use crate::error::Result;
use crate::protocol::{CastMessage, EndpointPair, ReceiverStatus, Request, VolumePayload, NS_RECEIVER};
use crate::subscription::Incoming;
use std::sync::Arc;
use std::time::Duration;

/// Controller for the receiver's top-level session
pub struct ReceiverController {
    transport: Arc<dyn Transport>,
    endpoints: EndpointPair,
}

impl ReceiverController {
    pub fn new(transport: Arc<dyn Transport>, endpoints: EndpointPair) -> Self {
        Self {
            transport,
            endpoints,
        }
    }

    /// Request the current receiver status
    pub async fn get_status(&self, wait: Duration) -> Result<ReceiverStatus> {
        let request = Request::new(self.endpoints.clone(), NS_RECEIVER, "GET_STATUS");
        let reply = self.transport.request(request, wait).await?;
        reply.decode_status()
    }

    /// Send a `SET_VOLUME` request
    ///
    /// The reply is returned as-is; callers that track state should rely on
    /// status pushes instead.
    pub async fn set_volume(&self, volume: &VolumePayload, wait: Duration) -> Result<CastMessage> {
        let request = Request::new(self.endpoints.clone(), NS_RECEIVER, "SET_VOLUME")
            .with_field("volume", serde_json::to_value(volume)?);
        self.transport.request(request, wait).await
    }

    /// Stream of unsolicited `RECEIVER_STATUS` pushes
    pub fn incoming(&self) -> Incoming<ReceiverStatus> {
        Incoming::new(self.transport.subscribe(), NS_RECEIVER, "RECEIVER_STATUS")
    }
}
