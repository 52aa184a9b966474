use crate::connection::Transport;
use crate::error::Result;
use crate::protocol::{EndpointPair, Request, NS_CONNECTION};
use serde_json::json;
use std::sync::Arc;

/// Opens and closes a virtual connection between two endpoints
///
/// The device ignores any request on an endpoint pair until it has seen a
/// `CONNECT` for that pair. Neither message gets a reply.
pub struct VirtualConnection {
    transport: Arc<dyn Transport>,
    endpoints: EndpointPair,
}

impl VirtualConnection {
    pub fn new(transport: Arc<dyn Transport>, endpoints: EndpointPair) -> Self {
        Self {
            transport,
            endpoints,
        }
    }

    pub async fn connect(&self) -> Result<()> {
        tracing::debug!(
            "Opening virtual connection {} -> {}",
            self.endpoints.sender,
            self.endpoints.receiver
        );
        let request = Request::new(self.endpoints.clone(), NS_CONNECTION, "CONNECT")
            .with_field("origin", json!({}));
        self.transport.send(request).await
    }

    pub async fn close(&self) -> Result<()> {
        let request = Request::new(self.endpoints.clone(), NS_CONNECTION, "CLOSE");
        self.transport.send(request).await
    }
}
