use crate::connection::Transport;
use crate::error::Result;
use crate::protocol::{EndpointPair, Request, NS_HEARTBEAT};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Keeps the underlying transport alive with PING/PONG exchanges
pub struct HeartbeatController {
    transport: Arc<dyn Transport>,
    endpoints: EndpointPair,
    interval: Duration,
}

impl HeartbeatController {
    pub fn new(transport: Arc<dyn Transport>, endpoints: EndpointPair, interval: Duration) -> Self {
        Self {
            transport,
            endpoints,
            interval,
        }
    }

    /// Send the first PING and keep the exchange running in the background
    ///
    /// Only the first PING can fail; afterwards the task runs until `cancel`
    /// fires or the transport goes away.
    pub async fn start(self, cancel: CancellationToken) -> Result<()> {
        self.transport.send(self.ping()).await?;

        let mut pushes = self.transport.subscribe();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            // the first tick completes immediately and the initial PING is already out
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = self.transport.send(self.ping()).await {
                            tracing::debug!("Heartbeat stopped: {}", e);
                            break;
                        }
                    }
                    msg = pushes.recv() => match msg {
                        Ok(msg) if msg.namespace == NS_HEARTBEAT
                            && msg.message_type().as_deref() == Some("PING") =>
                        {
                            let pong = Request::new(self.endpoints.clone(), NS_HEARTBEAT, "PONG");
                            if let Err(e) = self.transport.send(pong).await {
                                tracing::debug!("Heartbeat stopped: {}", e);
                                break;
                            }
                        }
                        Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        }
        .in_current_span());

        Ok(())
    }

    fn ping(&self) -> Request {
        Request::new(self.endpoints.clone(), NS_HEARTBEAT, "PING")
    }
}
