use crate::error::{CastError, Result};
use crate::frame::CastCodec;
use crate::protocol::{CastMessage, Request};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, oneshot, Mutex};
use tokio::time::timeout;
use tokio_native_tls::native_tls;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;

/// Capacity of the push broadcast; slow subscribers see `ChannelError` past this
const PUSH_CHANNEL_CAPACITY: usize = 100;

/// Message-level access to one device
///
/// Requests are matched to replies by `requestId`; everything the device
/// sends that does not answer a pending request is broadcast to subscribers.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request without waiting for a reply
    async fn send(&self, request: Request) -> Result<()>;

    /// Send a request and wait up to `wait` for the matching reply
    async fn request(&self, request: Request, wait: Duration) -> Result<CastMessage>;

    /// Subscribe to unsolicited messages
    fn subscribe(&self) -> broadcast::Receiver<CastMessage>;

    /// Tear the connection down; subscribers observe channel closure
    async fn close(&self);
}

/// Connection bookkeeping shared with the reader task
struct ConnectionState {
    /// Pending requests waiting for replies
    pending_requests: HashMap<u32, oneshot::Sender<CastMessage>>,
    /// Channel for sending outgoing messages
    out_tx: mpsc::UnboundedSender<CastMessage>,
}

/// TLS connection to a Cast device
pub struct Connection {
    state: Arc<Mutex<ConnectionState>>,
    /// Taken by the reader task on exit so subscribers see the channel close
    push_tx: Arc<parking_lot::Mutex<Option<broadcast::Sender<CastMessage>>>>,
    next_request_id: AtomicU32,
    shutdown: CancellationToken,
}

impl Connection {
    /// Connect to a device over TLS
    ///
    /// Cast devices present self-signed certificates, so certificate and
    /// hostname verification are disabled.
    pub async fn connect(host: IpAddr, port: u16) -> Result<Self> {
        tracing::info!("Connecting to {}:{}", host, port);

        let tcp = TcpStream::connect((host, port)).await?;
        let connector = native_tls::TlsConnector::builder()
            .danger_accept_invalid_certs(true)
            .danger_accept_invalid_hostnames(true)
            .build()?;
        let tls = tokio_native_tls::TlsConnector::from(connector)
            .connect(&host.to_string(), tcp)
            .await?;

        Ok(Self::from_stream(tls))
    }

    /// Run the protocol over an already-established byte stream
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let (mut write, mut read) = Framed::new(stream, CastCodec::default()).split();

        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<CastMessage>();
        let (push_tx, _) = broadcast::channel(PUSH_CHANNEL_CAPACITY);
        let push_tx = Arc::new(parking_lot::Mutex::new(Some(push_tx)));
        let shutdown = CancellationToken::new();

        let state = Arc::new(Mutex::new(ConnectionState {
            pending_requests: HashMap::new(),
            out_tx,
        }));

        // Forward outgoing messages to the socket; anything queued before
        // shutdown is still written
        let write_shutdown = shutdown.clone();
        tokio::spawn(async move {
            loop {
                let msg = tokio::select! {
                    biased;
                    msg = out_rx.recv() => match msg {
                        Some(msg) => msg,
                        None => break,
                    },
                    _ = write_shutdown.cancelled() => break,
                };
                if let Err(e) = write.send(msg).await {
                    tracing::error!("Failed to send message: {}", e);
                    break;
                }
            }
            let _ = write.close().await;
        });

        // Receive and dispatch incoming messages
        let state_clone = state.clone();
        let push_clone = push_tx.clone();
        let read_shutdown = shutdown.clone();
        tokio::spawn(async move {
            loop {
                let msg_result = tokio::select! {
                    _ = read_shutdown.cancelled() => break,
                    msg = read.next() => msg,
                };
                match msg_result {
                    Some(Ok(msg)) => Self::dispatch(&state_clone, &push_clone, msg).await,
                    // undecodable frames are skipped by the codec, so this is the socket or the framing
                    Some(Err(e)) => {
                        tracing::error!("Cast channel error: {}", e);
                        break;
                    }
                    None => {
                        tracing::info!("Cast connection closed by device");
                        break;
                    }
                }
            }

            // Connection closed: fail pending requests and close push subscribers
            state_clone.lock().await.pending_requests.clear();
            push_clone.lock().take();
            read_shutdown.cancel();
        });

        Self {
            state,
            push_tx,
            next_request_id: AtomicU32::new(1),
            shutdown,
        }
    }

    /// Route an incoming message to its waiting request or to subscribers
    async fn dispatch(
        state: &Arc<Mutex<ConnectionState>>,
        push_tx: &parking_lot::Mutex<Option<broadcast::Sender<CastMessage>>>,
        msg: CastMessage,
    ) {
        tracing::debug!(
            "Received {} -> {} [{}]: {}",
            msg.source_id,
            msg.destination_id,
            msg.namespace,
            msg.payload
        );

        if let Some(request_id) = msg.request_id() {
            let mut state = state.lock().await;
            if let Some(tx) = state.pending_requests.remove(&request_id) {
                let _ = tx.send(msg);
                return;
            }
        }

        if let Some(tx) = push_tx.lock().as_ref() {
            let _ = tx.send(msg);
        }
    }

    fn allocate_request_id(&self) -> u32 {
        loop {
            let id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
            // zero marks unsolicited messages
            if id != 0 {
                return id;
            }
        }
    }
}

#[async_trait]
impl Transport for Connection {
    async fn send(&self, request: Request) -> Result<()> {
        let msg = request.into_message(None)?;
        tracing::debug!("Sending (no reply): [{}] {}", msg.namespace, msg.payload);

        let state = self.state.lock().await;
        state
            .out_tx
            .send(msg)
            .map_err(|_| CastError::ConnectionClosed)
    }

    async fn request(&self, request: Request, wait: Duration) -> Result<CastMessage> {
        let request_id = self.allocate_request_id();
        let msg = request.into_message(Some(request_id))?;
        let (tx, rx) = oneshot::channel();

        // Register the pending request
        {
            let mut state = self.state.lock().await;
            state.pending_requests.insert(request_id, tx);

            tracing::debug!("Sending: [{}] {}", msg.namespace, msg.payload);
            if state.out_tx.send(msg).is_err() {
                state.pending_requests.remove(&request_id);
                return Err(CastError::ConnectionClosed);
            }
        }

        let reply = match timeout(wait, rx).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => return Err(CastError::ConnectionClosed),
            Err(_) => {
                self.state.lock().await.pending_requests.remove(&request_id);
                return Err(CastError::Timeout);
            }
        };

        if let Some(reason) = reply.rejection() {
            return Err(CastError::Rejected { reason });
        }

        Ok(reply)
    }

    fn subscribe(&self) -> broadcast::Receiver<CastMessage> {
        match self.push_tx.lock().as_ref() {
            Some(tx) => tx.subscribe(),
            // already torn down: hand out a receiver that is closed
            None => broadcast::channel(1).1,
        }
    }

    async fn close(&self) {
        self.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{EndpointPair, DEFAULT_RECEIVER_ID, DEFAULT_SENDER_ID, NS_CONNECTION, NS_RECEIVER};
    use serde_json::{json, Value};
    use tokio::io::{AsyncWriteExt, DuplexStream};

    /// Device side of an in-memory connection
    fn device() -> (Connection, Framed<DuplexStream, CastCodec>) {
        let (ours, theirs) = tokio::io::duplex(64 * 1024);
        (
            Connection::from_stream(ours),
            Framed::new(theirs, CastCodec::default()),
        )
    }

    fn reply_to(request: &CastMessage, payload: Value) -> CastMessage {
        CastMessage {
            source_id: request.destination_id.clone(),
            destination_id: request.source_id.clone(),
            namespace: request.namespace.clone(),
            payload: payload.to_string(),
        }
    }

    #[tokio::test]
    async fn request_is_matched_to_reply_and_pushes_are_broadcast() {
        let (conn, mut dev) = device();
        let mut pushes = conn.subscribe();

        let device_task = tokio::spawn(async move {
            let req = dev.next().await.unwrap().unwrap();
            let body: Value = serde_json::from_str(&req.payload).unwrap();
            assert_eq!(body["type"], "GET_STATUS");
            let id = body["requestId"].as_u64().unwrap();

            // an unsolicited push arrives before the reply
            dev.send(reply_to(&req, json!({"type": "RECEIVER_STATUS", "requestId": 0, "status": {}})))
                .await
                .unwrap();
            dev.send(reply_to(&req, json!({"type": "RECEIVER_STATUS", "requestId": id, "status": {"applications": []}})))
                .await
                .unwrap();
            dev
        });

        let reply = conn
            .request(
                Request::new(EndpointPair::new(DEFAULT_SENDER_ID, DEFAULT_RECEIVER_ID), NS_RECEIVER, "GET_STATUS"),
                Duration::from_secs(2),
            )
            .await
            .unwrap();
        assert!(reply.request_id().is_some());

        let push = pushes.recv().await.unwrap();
        assert_eq!(push.request_id(), None);
        let _dev = device_task.await.unwrap();
    }

    #[tokio::test]
    async fn error_reply_surfaces_as_rejected() {
        let (conn, mut dev) = device();
        tokio::spawn(async move {
            let req = dev.next().await.unwrap().unwrap();
            let body: Value = serde_json::from_str(&req.payload).unwrap();
            dev.send(reply_to(&req, json!({"type": "INVALID_REQUEST", "reason": "INVALID_COMMAND", "requestId": body["requestId"]})))
                .await
                .unwrap();
            dev
        });

        let result = conn
            .request(
                Request::new(EndpointPair::new(DEFAULT_SENDER_ID, DEFAULT_RECEIVER_ID), NS_RECEIVER, "SET_VOLUME"),
                Duration::from_secs(2),
            )
            .await;
        assert!(matches!(result, Err(CastError::Rejected { reason }) if reason == "INVALID_COMMAND"));
    }

    #[tokio::test(start_paused = true)]
    async fn unanswered_request_times_out() {
        let (conn, _dev) = device();
        let result = conn
            .request(
                Request::new(EndpointPair::new(DEFAULT_SENDER_ID, DEFAULT_RECEIVER_ID), NS_RECEIVER, "GET_STATUS"),
                Duration::from_secs(5),
            )
            .await;
        assert!(matches!(result, Err(CastError::Timeout)));
        assert!(conn.state.lock().await.pending_requests.is_empty());
    }

    #[tokio::test]
    async fn device_hangup_closes_subscribers() {
        let (conn, dev) = device();
        let mut pushes = conn.subscribe();
        drop(dev);

        assert!(matches!(
            pushes.recv().await,
            Err(broadcast::error::RecvError::Closed)
        ));
        // late subscribers are closed too
        assert!(matches!(
            conn.subscribe().recv().await,
            Err(broadcast::error::RecvError::Closed)
        ));
    }

    #[tokio::test]
    async fn undecodable_frame_does_not_end_connection() {
        let (conn, mut dev) = device();
        let mut pushes = conn.subscribe();

        // a frame whose source_id is not UTF-8
        dev.get_mut().write_all(&[0, 0, 0, 3, 0x12, 0x01, 0xff]).await.unwrap();
        dev.send(CastMessage {
            source_id: DEFAULT_RECEIVER_ID.to_string(),
            destination_id: "*".to_string(),
            namespace: NS_RECEIVER.to_string(),
            payload: json!({"type": "RECEIVER_STATUS", "requestId": 0, "status": {}}).to_string(),
        })
        .await
        .unwrap();

        let push = pushes.recv().await.unwrap();
        assert_eq!(push.message_type().as_deref(), Some("RECEIVER_STATUS"));
    }

    #[tokio::test]
    async fn messages_queued_before_close_are_written() {
        let (conn, mut dev) = device();
        let endpoints = EndpointPair::new(DEFAULT_SENDER_ID, DEFAULT_RECEIVER_ID);

        conn.send(Request::new(endpoints, NS_CONNECTION, "CLOSE")).await.unwrap();
        conn.close().await;

        let msg = dev.next().await.unwrap().unwrap();
        assert_eq!(msg.namespace, NS_CONNECTION);
        assert_eq!(msg.message_type().as_deref(), Some("CLOSE"));
        assert!(dev.next().await.is_none());
    }
}
