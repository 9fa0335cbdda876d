//! Client error types.

use thiserror::Error;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] switchyard_protocol::ProtocolError),

    #[error("codec error: {0}")]
    Codec(#[from] switchyard_protocol::CodecError),

    #[error("not connected")]
    NotConnected,

    #[error("connection closed")]
    ConnectionClosed,

    #[error("request timeout")]
    Timeout,

    /// The server answered with a raw error frame.
    #[error("server error: {0}")]
    Remote(String),
}

impl ClientError {
    /// Returns whether the connection can still be used after this error.
    ///
    /// The server keeps a session open after reporting a raw error, so only
    /// transport failures make the connection unusable.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ClientError::Remote(_) | ClientError::Codec(_))
    }
}
