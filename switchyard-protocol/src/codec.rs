//! Message codec capability and frame buffering.
//!
//! The server never interprets message bytes itself. It hands each frame
//! payload to a `Codec`, which yields the routing identifiers and a decoded
//! payload, and hands results back to the same codec for encoding.

use crate::error::{CodecError, ProtocolError};
use crate::frame::Frame;
use crate::id::{MethodId, ServiceId};
use bytes::{Bytes, BytesMut};

/// A message after decoding, ready for dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedMessage<P> {
    pub service: ServiceId,
    pub method: MethodId,
    pub payload: P,
}

impl<P> DecodedMessage<P> {
    pub fn new(service: ServiceId, method: MethodId, payload: P) -> Self {
        Self {
            service,
            method,
            payload,
        }
    }
}

/// Converts between raw message bytes and routed, structured values.
///
/// One codec instance is shared by every connection, so implementations must
/// not keep per-message state.
pub trait Codec: Send + Sync + 'static {
    /// The decoded payload type handed to handlers and returned by them.
    type Payload: Send + 'static;

    /// Decodes one inbound message.
    fn decode(&self, message: &[u8]) -> Result<DecodedMessage<Self::Payload>, CodecError>;

    /// Encodes a handler result addressed to `service`/`method`.
    fn encode(
        &self,
        service: ServiceId,
        method: MethodId,
        payload: &Self::Payload,
    ) -> Result<Bytes, CodecError>;
}

/// Accumulates bytes read from a stream and splits them into frames.
pub struct FrameDecoder {
    buffer: BytesMut,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(8192),
        }
    }

    /// Appends data to the internal buffer.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Attempts to decode the next frame from the buffer.
    pub fn decode_frame(&mut self) -> Result<Option<Frame>, ProtocolError> {
        Frame::decode(&mut self.buffer)
    }

    /// Returns the number of bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Clears the internal buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Reference codec: routing header followed by a JSON body.
pub mod json {
    use super::*;
    use crate::id::ID_LEN;
    use bytes::BufMut;
    use serde_json::Value;

    /// Length of the routing header (service id + method id).
    pub const HEADER_LEN: usize = ID_LEN * 2;

    /// Codec for messages laid out as `service(3) | method(3) | json`.
    ///
    /// An empty body decodes to `Value::Null`.
    #[derive(Debug, Clone)]
    pub struct JsonCodec {
        max_message_size: usize,
    }

    impl JsonCodec {
        pub fn new() -> Self {
            Self {
                max_message_size: crate::MAX_PAYLOAD_SIZE as usize,
            }
        }

        /// Caps the size of encoded messages.
        pub fn with_max_message_size(mut self, size: usize) -> Self {
            self.max_message_size = size;
            self
        }
    }

    impl Default for JsonCodec {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Codec for JsonCodec {
        type Payload = Value;

        fn decode(&self, message: &[u8]) -> Result<DecodedMessage<Value>, CodecError> {
            if message.len() < HEADER_LEN {
                return Err(CodecError::MessageTooShort {
                    len: message.len(),
                    min: HEADER_LEN,
                });
            }

            let service = ServiceId::new([message[0], message[1], message[2]]);
            let method = MethodId::new([message[3], message[4], message[5]]);
            let body = &message[HEADER_LEN..];
            let payload = if body.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(body)?
            };

            Ok(DecodedMessage::new(service, method, payload))
        }

        fn encode(
            &self,
            service: ServiceId,
            method: MethodId,
            payload: &Value,
        ) -> Result<Bytes, CodecError> {
            let body = serde_json::to_vec(payload)?;
            let size = HEADER_LEN + body.len();
            if size > self.max_message_size {
                return Err(CodecError::PayloadTooLarge {
                    size,
                    max: self.max_message_size,
                });
            }

            let mut buf = BytesMut::with_capacity(size);
            buf.put_slice(service.as_bytes());
            buf.put_slice(method.as_bytes());
            buf.put_slice(&body);
            Ok(buf.freeze())
        }
    }
}
