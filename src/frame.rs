//! Length-prefixed protobuf framing for `CastMessage`.
//!
//! Each frame is a big-endian u32 length followed by a protobuf-encoded
//! `extensions.api.cast_channel.CastMessage`.

use crate::error::{CastError, Result};
use crate::protocol::CastMessage;
use bytes::{Bytes, BytesMut};
use prost::Message;
use tokio_util::codec::{Decoder, Encoder, LengthDelimitedCodec};

/// Largest frame the receiver is allowed to send
const MAX_FRAME_LEN: usize = 64 * 1024;

const PROTOCOL_CASTV2_1_0: i32 = 0;
const PAYLOAD_STRING: i32 = 0;

/// `extensions.api.cast_channel.CastMessage` as it appears on the wire
#[derive(Clone, PartialEq, prost::Message)]
struct WireMessage {
    #[prost(int32, required, tag = "1")]
    protocol_version: i32,
    #[prost(string, required, tag = "2")]
    source_id: String,
    #[prost(string, required, tag = "3")]
    destination_id: String,
    #[prost(string, required, tag = "4")]
    namespace: String,
    #[prost(int32, required, tag = "5")]
    payload_type: i32,
    #[prost(string, optional, tag = "6")]
    payload_utf8: Option<String>,
    #[prost(bytes = "vec", optional, tag = "7")]
    payload_binary: Option<Vec<u8>>,
}

impl From<CastMessage> for WireMessage {
    fn from(message: CastMessage) -> Self {
        Self {
            protocol_version: PROTOCOL_CASTV2_1_0,
            source_id: message.source_id,
            destination_id: message.destination_id,
            namespace: message.namespace,
            payload_type: PAYLOAD_STRING,
            payload_utf8: Some(message.payload),
            payload_binary: None,
        }
    }
}

impl From<WireMessage> for CastMessage {
    /// Binary payloads are not used by any namespace this library speaks and come through empty
    fn from(wire: WireMessage) -> Self {
        Self {
            source_id: wire.source_id,
            destination_id: wire.destination_id,
            namespace: wire.namespace,
            payload: wire.payload_utf8.unwrap_or_default(),
        }
    }
}

/// Codec turning a byte stream into `CastMessage`s and back
///
/// A frame whose body is not a valid message is logged and skipped; only
/// errors in the length framing itself end the stream.
pub struct CastCodec {
    frames: LengthDelimitedCodec,
}

impl Default for CastCodec {
    fn default() -> Self {
        Self {
            frames: LengthDelimitedCodec::builder()
                .big_endian()
                .length_field_length(4)
                .max_frame_length(MAX_FRAME_LEN)
                .new_codec(),
        }
    }
}

impl Decoder for CastCodec {
    type Item = CastMessage;
    type Error = CastError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<CastMessage>> {
        while let Some(frame) = self.frames.decode(src)? {
            match WireMessage::decode(frame) {
                Ok(wire) => return Ok(Some(wire.into())),
                Err(e) => tracing::warn!("Skipping undecodable cast frame: {}", e),
            }
        }
        Ok(None)
    }
}

impl Encoder<CastMessage> for CastCodec {
    type Error = CastError;

    fn encode(&mut self, item: CastMessage, dst: &mut BytesMut) -> Result<()> {
        let body = WireMessage::from(item).encode_to_vec();
        self.frames.encode(Bytes::from(body), dst)?;
        Ok(())
    }
}
