//! # switchyard-protocol
//!
//! Wire protocol for switchyard.
//!
//! This crate provides:
//! - Binary framing with length prefix and CRC32C validation
//! - Fixed-width service and method identifiers
//! - The `Codec` capability the server uses to decode and encode messages
//! - A reference JSON codec

pub mod codec;
pub mod error;
pub mod frame;
pub mod id;
pub mod reply;

pub use codec::json::JsonCodec;
pub use codec::{Codec, DecodedMessage, FrameDecoder};
pub use error::{CodecError, ProtocolError};
pub use frame::{Frame, FrameFlags, FRAME_HEADER_SIZE, MAGIC};
pub use id::{MethodId, ServiceId, ID_LEN};
pub use reply::Reply;

/// Protocol version supported by this implementation.
pub const PROTOCOL_VERSION: u16 = 1;

/// Default port for the switchyard server.
pub const DEFAULT_PORT: u16 = 7500;

/// Maximum frame payload size (16 MiB).
pub const MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;
