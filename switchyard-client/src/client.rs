//! High-level client API.

use crate::connection::{Connection, ConnectionConfig};
use crate::error::ClientError;
use std::sync::Arc;
use switchyard_protocol::{Codec, DecodedMessage, MethodId, Reply, ServiceId};

/// Codec-aware client for a switchyard server.
///
/// Requests are encoded with the same codec the server uses; a raw error
/// reply surfaces as [`ClientError::Remote`].
pub struct Client<C: Codec> {
    conn: Arc<Connection>,
    codec: C,
}

impl<C: Codec> Client<C> {
    /// Creates a new client with the given configuration.
    pub fn new(config: ConnectionConfig, codec: C) -> Self {
        Self {
            conn: Arc::new(Connection::new(config)),
            codec,
        }
    }

    /// Connects to the server.
    pub async fn connect(&self) -> Result<(), ClientError> {
        self.conn.connect().await
    }

    /// Returns whether the client is connected.
    pub fn is_connected(&self) -> bool {
        self.conn.is_connected()
    }

    /// Closes the connection.
    pub async fn close(&self) -> Result<(), ClientError> {
        self.conn.close().await
    }

    /// Returns the underlying connection.
    pub fn connection(&self) -> Arc<Connection> {
        self.conn.clone()
    }

    /// Returns the codec used for requests and replies.
    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Calls `method` on `service` and returns the decoded reply.
    pub async fn call(
        &self,
        service: impl Into<ServiceId>,
        method: impl Into<MethodId>,
        payload: &C::Payload,
    ) -> Result<C::Payload, ClientError> {
        Ok(self.call_routed(service, method, payload).await?.payload)
    }

    /// Like [`Client::call`], but keeps the routing identifiers the server
    /// addressed its reply to.
    pub async fn call_routed(
        &self,
        service: impl Into<ServiceId>,
        method: impl Into<MethodId>,
        payload: &C::Payload,
    ) -> Result<DecodedMessage<C::Payload>, ClientError> {
        let service = service.into();
        let method = method.into();
        let message = self.codec.encode(service, method, payload)?;

        tracing::debug!("Calling {}/{}", service, method);
        match self.conn.request(message).await? {
            Reply::Encoded(bytes) => Ok(self.codec.decode(&bytes)?),
            Reply::Raw(message) => Err(ClientError::Remote(message)),
        }
    }
}
