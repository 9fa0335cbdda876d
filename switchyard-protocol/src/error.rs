//! Protocol and codec error types.

use thiserror::Error;

/// Framing errors. Any of these leaves the byte stream unsynchronised.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid magic bytes: expected 'SWYD', got {0:?}")]
    InvalidMagic([u8; 4]),

    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u16),

    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: u32, max: u32 },

    #[error("CRC mismatch: expected {expected:#x}, got {actual:#x}")]
    CrcMismatch { expected: u32, actual: u32 },

    #[error("invalid frame flags: {0:#x}")]
    InvalidFlags(u16),

    #[error("invalid identifier length: expected {expected} bytes, got {actual}")]
    InvalidIdLength { expected: usize, actual: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by a `Codec` while turning bytes into routed messages or back.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("message too short: {len} bytes (need at least {min})")]
    MessageTooShort { len: usize, min: usize },

    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Custom(String),
}

impl CodecError {
    /// Creates a codec error carrying a free-form message.
    pub fn custom(message: impl Into<String>) -> Self {
        CodecError::Custom(message.into())
    }
}
