use thiserror::Error;

/// Result type for Cast operations
pub type Result<T> = std::result::Result<T, CastError>;

/// Errors that can occur when talking to Cast receivers
#[derive(Error, Debug)]
pub enum CastError {
    /// I/O error on the underlying socket
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS handshake or configuration error
    #[error("TLS error: {0}")]
    Tls(#[from] tokio_native_tls::native_tls::Error),

    /// Connection was closed unexpectedly
    #[error("Connection closed")]
    ConnectionClosed,

    /// Request timed out waiting for response
    #[error("Request timeout")]
    Timeout,

    /// Device answered a request with an error message type
    #[error("Request rejected: {reason}")]
    Rejected {
        /// Reason reported by the device, or the reply type when absent
        reason: String,
    },

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Status payload was missing fields or malformed
    #[error("Status synchronization failed: {0}")]
    Sync(String),

    /// Discovery attributes could not be resolved to a device identity
    #[error("Discovery error: {0}")]
    Discovery(String),

    /// Push channel receive error
    #[error("Channel error: {0}")]
    ChannelError(String),

    /// Device framework refused a registration or state publish
    #[error("Device framework error: {0}")]
    Framework(String),
}
