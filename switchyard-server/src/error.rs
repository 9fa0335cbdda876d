//! Server error types.

use switchyard_protocol::{MethodId, ServiceId};
use thiserror::Error;

/// Server errors.
///
/// Only `Io` from binding ever reaches the caller of `Server::run`; the rest
/// end a single session.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] switchyard_protocol::ProtocolError),

    #[error("server shutting down")]
    ShuttingDown,
}

/// Registration and routing errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("service {0} already registered")]
    DuplicateService(ServiceId),

    #[error("unknown service {0}")]
    UnknownService(ServiceId),

    #[error("unknown method {method} for service {service}")]
    UnknownMethod { service: ServiceId, method: MethodId },
}

/// Error returned by a handler. Its message is sent to the peer verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}
