//! Connection management.

use crate::error::ClientError;
use bytes::Bytes;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use switchyard_protocol::{Frame, FrameDecoder, Reply};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;

/// Default read buffer size (8 KiB).
pub const DEFAULT_READ_BUFFER_SIZE: usize = 8 * 1024;

/// Minimum read buffer size (1 KiB).
pub const MIN_READ_BUFFER_SIZE: usize = 1024;

/// Maximum read buffer size (1 MiB).
pub const MAX_READ_BUFFER_SIZE: usize = 1024 * 1024;

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Server address.
    pub addr: SocketAddr,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Time allowed for a reply to arrive.
    pub request_timeout: Duration,
    /// Read buffer size for socket reads.
    pub read_buffer_size: usize,
}

impl ConnectionConfig {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.clamp(MIN_READ_BUFFER_SIZE, MAX_READ_BUFFER_SIZE);
        self
    }
}

struct Transport {
    stream: TcpStream,
    decoder: FrameDecoder,
}

/// A connection to a switchyard server.
///
/// The server answers messages strictly in order, so one request is in
/// flight at a time; concurrent callers queue on the transport lock.
pub struct Connection {
    config: ConnectionConfig,
    transport: Mutex<Option<Transport>>,
    connected: AtomicBool,
}

impl Connection {
    /// Creates a new connection (not yet connected).
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            config,
            transport: Mutex::new(None),
            connected: AtomicBool::new(false),
        }
    }

    /// Connects to the server.
    pub async fn connect(&self) -> Result<(), ClientError> {
        tracing::debug!("Connecting to {}...", self.config.addr);

        let stream = tokio::time::timeout(
            self.config.connect_timeout,
            TcpStream::connect(self.config.addr),
        )
        .await
        .map_err(|_| {
            tracing::debug!("Connection timeout");
            ClientError::Timeout
        })?
        .map_err(|e| {
            tracing::debug!("Connection failed: {}", e);
            ClientError::Io(e)
        })?;

        stream.set_nodelay(true).ok();

        *self.transport.lock().await = Some(Transport {
            stream,
            decoder: FrameDecoder::new(),
        });
        self.connected.store(true, Ordering::SeqCst);

        Ok(())
    }

    /// Returns whether the connection is established.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Sends one encoded message and waits for the server's reply.
    pub async fn request(&self, message: Bytes) -> Result<Reply, ClientError> {
        self.exchange(Frame::new(message)).await
    }

    /// Sends an arbitrary frame and waits for the reply.
    pub async fn request_frame(&self, frame: Frame) -> Result<Reply, ClientError> {
        self.exchange(frame).await
    }

    async fn exchange(&self, frame: Frame) -> Result<Reply, ClientError> {
        if !self.is_connected() {
            return Err(ClientError::NotConnected);
        }

        let mut guard = self.transport.lock().await;
        let transport = guard.as_mut().ok_or(ClientError::NotConnected)?;

        let result = self.exchange_on(transport, frame).await;
        if let Err(ref e) = result {
            if !e.is_recoverable() {
                tracing::debug!("Dropping connection to {}: {}", self.config.addr, e);
                *guard = None;
                self.connected.store(false, Ordering::SeqCst);
            }
        }
        result
    }

    async fn exchange_on(
        &self,
        transport: &mut Transport,
        frame: Frame,
    ) -> Result<Reply, ClientError> {
        let encoded = frame.encode()?;
        transport.stream.write_all(&encoded).await?;
        tracing::trace!("Sent frame ({} bytes)", encoded.len());

        let buffer_size = self.config.read_buffer_size;
        tokio::time::timeout(self.config.request_timeout, async {
            let mut buf = vec![0u8; buffer_size];
            loop {
                if let Some(frame) = transport.decoder.decode_frame()? {
                    return Ok(Reply::from_frame(frame));
                }

                let n = transport.stream.read(&mut buf).await?;
                if n == 0 {
                    return Err(ClientError::ConnectionClosed);
                }
                transport.decoder.extend(&buf[..n]);
            }
        })
        .await
        .map_err(|_| ClientError::Timeout)?
    }

    /// Closes the connection.
    pub async fn close(&self) -> Result<(), ClientError> {
        self.connected.store(false, Ordering::SeqCst);
        if let Some(mut transport) = self.transport.lock().await.take() {
            transport.stream.shutdown().await.ok();
        }
        Ok(())
    }
}
