use crate::connection::{Connection, Transport};
use crate::error::Result;
use async_trait::async_trait;
use std::net::IpAddr;
use std::sync::Arc;

/// Opens control-channel clients to devices
///
/// The fleet registry goes through this trait so admission can be exercised
/// without a network.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, host: IpAddr, port: u16) -> Result<Arc<dyn Transport>>;
}

/// Connects to devices over TLS
///
/// # Example
///
/// ```no_run
/// use cast_fleet::{Connector, TlsConnector, Transport, DEFAULT_CAST_PORT};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = TlsConnector
///         .connect("192.168.1.40".parse()?, DEFAULT_CAST_PORT)
///         .await?;
///     let mut pushes = client.subscribe();
///     while let Ok(msg) = pushes.recv().await {
///         println!("{} [{}]: {}", msg.source_id, msg.namespace, msg.payload);
///     }
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct TlsConnector;

#[async_trait]
impl Connector for TlsConnector {
    async fn connect(&self, host: IpAddr, port: u16) -> Result<Arc<dyn Transport>> {
        let connection = Connection::connect(host, port).await?;
        Ok(Arc::new(connection))
    }
}
