use crate::error::{CastError, Result};
use crate::protocol::CastMessage;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use tokio::sync::broadcast;

/// Typed stream of status pushes for one namespace and message type
///
/// Wraps the connection's push broadcast, skipping messages that belong to
/// other namespaces or message types and decoding the `status` field of the rest.
pub struct Incoming<T> {
    rx: broadcast::Receiver<CastMessage>,
    namespace: &'static str,
    message_type: &'static str,
    _status: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> Incoming<T> {
    pub(crate) fn new(
        rx: broadcast::Receiver<CastMessage>,
        namespace: &'static str,
        message_type: &'static str,
    ) -> Self {
        Self {
            rx,
            namespace,
            message_type,
            _status: PhantomData,
        }
    }

    /// Receive the next status push
    ///
    /// Returns `ConnectionClosed` once the connection has been torn down.
    /// Lag and decode failures are returned as errors but leave the stream usable.
    pub async fn recv(&mut self) -> Result<T> {
        self.recv_with_source().await.map(|(_, status)| status)
    }

    /// Receive the next status push along with the id of the endpoint that sent it
    pub async fn recv_with_source(&mut self) -> Result<(String, T)> {
        loop {
            let msg = self.rx.recv().await.map_err(|e| match e {
                broadcast::error::RecvError::Closed => CastError::ConnectionClosed,
                broadcast::error::RecvError::Lagged(n) => {
                    CastError::ChannelError(format!("Lagged by {} messages", n))
                }
            })?;

            if msg.namespace != self.namespace {
                continue;
            }
            if msg.message_type().as_deref() != Some(self.message_type) {
                continue;
            }
            let status = msg.decode_status()?;
            return Ok((msg.source_id, status));
        }
    }
}
