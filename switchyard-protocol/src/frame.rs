//! Binary frame format.
//!
//! Every message on the wire is carried in exactly one frame:
//!
//! ```text
//! +--------+---------+--------+-------------+--------+
//! | magic  | version | flags  | payload_len | crc32c |
//! | 4 bytes| 2 bytes |2 bytes |   4 bytes   | 4 bytes|
//! +--------+---------+--------+-------------+--------+
//! | payload                                          |
//! | payload_len bytes                                |
//! +--------------------------------------------------+
//! ```
//!
//! A frame with the `ERROR` flag carries a UTF-8 error description written by
//! the server without going through the codec.

use crate::error::ProtocolError;
use crate::MAX_PAYLOAD_SIZE;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Magic bytes identifying switchyard frames: "SWYD"
pub const MAGIC: [u8; 4] = *b"SWYD";

/// Size of the fixed frame header in bytes (4+2+2+4+4 = 16).
pub const FRAME_HEADER_SIZE: usize = 16;

/// Frame flags bitfield.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameFlags(u16);

impl FrameFlags {
    /// CRC32C checksum is present and valid.
    pub const CRC_PRESENT: u16 = 1 << 0;
    /// Payload is a raw error description rather than codec output.
    pub const ERROR: u16 = 1 << 1;

    /// Valid flags mask for protocol version 1.
    const VALID_V1_MASK: u16 = 0x0003;

    pub fn new() -> Self {
        Self(0)
    }

    pub fn with_crc(mut self) -> Self {
        self.0 |= Self::CRC_PRESENT;
        self
    }

    pub fn with_error(mut self) -> Self {
        self.0 |= Self::ERROR;
        self
    }

    pub fn has_crc(&self) -> bool {
        self.0 & Self::CRC_PRESENT != 0
    }

    pub fn is_error(&self) -> bool {
        self.0 & Self::ERROR != 0
    }

    pub fn bits(&self) -> u16 {
        self.0
    }

    pub fn from_bits(bits: u16) -> Result<Self, ProtocolError> {
        if bits & !Self::VALID_V1_MASK != 0 {
            return Err(ProtocolError::InvalidFlags(bits));
        }
        Ok(Self(bits))
    }
}

/// A parsed frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Protocol version.
    pub version: u16,
    /// Frame flags.
    pub flags: FrameFlags,
    /// Frame payload.
    pub payload: Bytes,
}

impl Frame {
    /// Creates a frame carrying a codec-encoded message.
    pub fn new(payload: Bytes) -> Self {
        Self {
            version: crate::PROTOCOL_VERSION,
            flags: FrameFlags::new().with_crc(),
            payload,
        }
    }

    /// Creates a frame carrying a raw error description.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            version: crate::PROTOCOL_VERSION,
            flags: FrameFlags::new().with_crc().with_error(),
            payload: Bytes::from(message.into()),
        }
    }

    /// Returns whether the payload is a raw error description.
    pub fn is_error(&self) -> bool {
        self.flags.is_error()
    }

    /// Encodes the frame into bytes.
    pub fn encode(&self) -> Result<BytesMut, ProtocolError> {
        let payload_len = self.payload.len() as u32;
        if self.payload.len() > MAX_PAYLOAD_SIZE as usize {
            return Err(ProtocolError::FrameTooLarge {
                size: payload_len,
                max: MAX_PAYLOAD_SIZE,
            });
        }

        let mut buf = BytesMut::with_capacity(FRAME_HEADER_SIZE + self.payload.len());

        buf.put_slice(&MAGIC);
        buf.put_u16(self.version);
        buf.put_u16(self.flags.bits());
        buf.put_u32(payload_len);

        let crc = if self.flags.has_crc() {
            crc32c::crc32c(&self.payload)
        } else {
            0
        };
        buf.put_u32(crc);

        buf.put_slice(&self.payload);

        Ok(buf)
    }

    /// Splits one frame off the front of `buf`.
    ///
    /// Returns `Ok(None)` while the frame is incomplete, leaving `buf`
    /// untouched. Header errors are reported as soon as the header is
    /// buffered, before the payload arrives.
    pub fn decode(buf: &mut BytesMut) -> Result<Option<Self>, ProtocolError> {
        let Some(header) = Header::parse(buf)? else {
            return Ok(None);
        };

        let total_len = FRAME_HEADER_SIZE + header.payload_len as usize;
        if buf.len() < total_len {
            return Ok(None);
        }

        buf.advance(FRAME_HEADER_SIZE);
        let payload = buf.split_to(header.payload_len as usize).freeze();

        if header.flags.has_crc() {
            let actual = crc32c::crc32c(&payload);
            if actual != header.crc {
                return Err(ProtocolError::CrcMismatch {
                    expected: header.crc,
                    actual,
                });
            }
        }

        Ok(Some(Self {
            version: header.version,
            flags: header.flags,
            payload,
        }))
    }
}

struct Header {
    version: u16,
    flags: FrameFlags,
    payload_len: u32,
    crc: u32,
}

impl Header {
    fn parse(buf: &[u8]) -> Result<Option<Self>, ProtocolError> {
        if buf.len() < FRAME_HEADER_SIZE {
            return Ok(None);
        }
        let mut header = &buf[..FRAME_HEADER_SIZE];

        let mut magic = [0u8; 4];
        header.copy_to_slice(&mut magic);
        if magic != MAGIC {
            return Err(ProtocolError::InvalidMagic(magic));
        }

        let version = header.get_u16();
        if version != crate::PROTOCOL_VERSION {
            return Err(ProtocolError::UnsupportedVersion(version));
        }

        let flags = FrameFlags::from_bits(header.get_u16())?;

        let payload_len = header.get_u32();
        if payload_len > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::FrameTooLarge {
                size: payload_len,
                max: MAX_PAYLOAD_SIZE,
            });
        }

        Ok(Some(Self {
            version,
            flags,
            payload_len,
            crc: header.get_u32(),
        }))
    }
}
