//! Connection sessions.
//!
//! A session owns one connection and runs the read, dispatch, respond loop:
//!
//! ```text
//! Reading -> Dispatching -> Responding -> Reading ... -> Closed
//! ```
//!
//! Decode, routing, handler and encode failures are answered with a raw error
//! frame and the loop continues. A failed read or write closes the session.

use crate::error::{DispatchError, ServerError};
use crate::metrics::Metrics;
use crate::registry::Registry;
use crate::server::ServerStats;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};
use switchyard_protocol::{Codec, Frame, FrameDecoder, ProtocolError, Reply, ServiceId};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for the next message.
    Reading,
    /// Decoding, resolving and invoking a handler.
    Dispatching,
    /// Writing the reply.
    Responding,
    /// Connection released; no further reads or writes.
    Closed,
}

/// How one message was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Ok,
    DecodeError,
    UnknownService,
    UnknownMethod,
    HandlerError,
    EncodeError,
}

impl Outcome {
    /// Label used in metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Ok => "ok",
            Outcome::DecodeError => "decode_error",
            Outcome::UnknownService => "unknown_service",
            Outcome::UnknownMethod => "unknown_method",
            Outcome::HandlerError => "handler_error",
            Outcome::EncodeError => "encode_error",
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Outcome::Ok)
    }
}

/// Result of dispatching one message.
#[derive(Debug)]
pub struct Dispatched {
    pub reply: Reply,
    pub outcome: Outcome,
    /// The target service, when the message could be decoded.
    pub service: Option<ServiceId>,
}

impl Dispatched {
    fn failed(message: String, outcome: Outcome, service: Option<ServiceId>) -> Self {
        Self {
            reply: Reply::Raw(message),
            outcome,
            service,
        }
    }
}

/// Decodes, routes and invokes one message, producing the reply to send.
///
/// Never fails: every error becomes a `Reply::Raw`.
pub async fn dispatch<C: Codec>(
    codec: &C,
    registry: &Registry<C::Payload>,
    message: &[u8],
) -> Dispatched {
    let decoded = match codec.decode(message) {
        Ok(decoded) => decoded,
        Err(e) => {
            return Dispatched::failed(
                format!("decode error: {}", e),
                Outcome::DecodeError,
                None,
            )
        }
    };

    let service = decoded.service;
    let method = decoded.method;

    let handler = match registry.resolve(service, method) {
        Ok(handler) => handler,
        Err(e) => {
            let outcome = match e {
                DispatchError::UnknownMethod { .. } => Outcome::UnknownMethod,
                _ => Outcome::UnknownService,
            };
            return Dispatched::failed(e.to_string(), outcome, Some(service));
        }
    };

    // Handlers are synchronous; run them off the async workers so a slow one
    // only holds up its own session.
    let payload = decoded.payload;
    let result = match tokio::task::spawn_blocking(move || handler(payload)).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => {
            return Dispatched::failed(e.to_string(), Outcome::HandlerError, Some(service))
        }
        Err(e) => {
            return Dispatched::failed(
                format!("handler for {}/{} failed: {}", service, method, e),
                Outcome::HandlerError,
                Some(service),
            )
        }
    };

    match codec.encode(service, method, &result) {
        Ok(bytes) => Dispatched {
            reply: Reply::Encoded(bytes),
            outcome: Outcome::Ok,
            service: Some(service),
        },
        Err(e) => Dispatched::failed(
            format!("encode error: {}", e),
            Outcome::EncodeError,
            Some(service),
        ),
    }
}

/// A client session bound to one connection.
pub struct Session<S, C: Codec> {
    /// Unique session ID.
    pub id: String,

    /// Remote address.
    pub remote_addr: SocketAddr,

    stream: S,
    codec: Arc<C>,
    registry: Arc<Registry<C::Payload>>,
    decoder: FrameDecoder,
    state: SessionState,

    /// Closes the session when no data arrives for this long.
    idle_timeout: Option<Duration>,

    /// Messages handled so far.
    message_count: u64,

    stats: Option<Arc<ServerStats>>,
    metrics: Option<Arc<Metrics>>,
}

impl<S, C> Session<S, C>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
    C: Codec,
{
    /// Creates a new session over `stream`.
    pub fn new(
        stream: S,
        remote_addr: SocketAddr,
        codec: Arc<C>,
        registry: Arc<Registry<C::Payload>>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            remote_addr,
            stream,
            codec,
            registry,
            decoder: FrameDecoder::new(),
            state: SessionState::Reading,
            idle_timeout: None,
            message_count: 0,
            stats: None,
            metrics: None,
        }
    }

    /// Sets the idle timeout.
    pub fn with_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Sets the server statistics to update.
    pub fn with_stats(mut self, stats: Arc<ServerStats>) -> Self {
        self.stats = Some(stats);
        self
    }

    /// Sets the metrics instance.
    pub fn with_metrics(mut self, metrics: Option<Arc<Metrics>>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Returns the session state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Returns the number of messages handled.
    pub fn message_count(&self) -> u64 {
        self.message_count
    }

    /// Runs the session until the connection fails, the peer disconnects or
    /// the server shuts down. The stream is shut down before returning.
    pub async fn run(
        &mut self,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        let result = self.serve(shutdown).await;
        self.state = SessionState::Closed;
        let _ = self.stream.shutdown().await;
        tracing::debug!(
            "[{}] Session {} closed after {} message(s)",
            self.remote_addr,
            self.id,
            self.message_count
        );
        result
    }

    async fn serve(&mut self, shutdown: &mut broadcast::Receiver<()>) -> Result<(), ServerError> {
        let mut buf = [0u8; 8192];

        loop {
            loop {
                match self.decoder.decode_frame() {
                    Ok(Some(frame)) => self.handle_frame(frame).await?,
                    Ok(None) => break,
                    // The corrupt frame was consumed whole; the stream is still aligned
                    Err(e @ ProtocolError::CrcMismatch { .. }) => {
                        self.state = SessionState::Dispatching;
                        let dispatched = Dispatched::failed(
                            format!("decode error: {}", e),
                            Outcome::DecodeError,
                            None,
                        );
                        self.respond(dispatched, Instant::now()).await?;
                    }
                    // Header errors leave the next frame boundary unknown
                    Err(e) => return Err(e.into()),
                }
            }

            self.state = SessionState::Reading;
            let idle_timeout = self.idle_timeout;
            tokio::select! {
                result = read_chunk(&mut self.stream, &mut buf, idle_timeout) => {
                    match result {
                        Ok(0) => {
                            tracing::debug!("[{}] Connection closed by client", self.remote_addr);
                            return Ok(());
                        }
                        Ok(n) => {
                            tracing::trace!("[{}] Received {} bytes", self.remote_addr, n);
                            self.decoder.extend(&buf[..n]);
                        }
                        Err(e) if e.kind() == io::ErrorKind::TimedOut => {
                            tracing::debug!("[{}] Idle timeout", self.remote_addr);
                            return Ok(());
                        }
                        Err(e) => {
                            tracing::debug!("[{}] Read error: {}", self.remote_addr, e);
                            return Err(ServerError::Io(e));
                        }
                    }
                }
                _ = shutdown.recv() => {
                    tracing::debug!("[{}] Shutdown signal received", self.remote_addr);
                    return Err(ServerError::ShuttingDown);
                }
            }
        }
    }

    async fn handle_frame(&mut self, frame: Frame) -> Result<(), ServerError> {
        self.state = SessionState::Dispatching;
        let started = Instant::now();

        let dispatched = if frame.is_error() {
            Dispatched::failed(
                "decode error: error frames are only sent by the server".to_string(),
                Outcome::DecodeError,
                None,
            )
        } else {
            dispatch(self.codec.as_ref(), &*self.registry, &frame.payload).await
        };

        self.respond(dispatched, started).await
    }

    async fn respond(
        &mut self,
        dispatched: Dispatched,
        started: Instant,
    ) -> Result<(), ServerError> {
        self.message_count += 1;
        self.record(&dispatched, started.elapsed());

        self.state = SessionState::Responding;
        self.write_reply(dispatched.reply).await
    }

    /// Writes one reply. Any failure here is terminal for the session.
    async fn write_reply(&mut self, reply: Reply) -> Result<(), ServerError> {
        let bytes = match reply.into_frame().encode() {
            Ok(bytes) => bytes,
            Err(e) => Frame::error(format!("encode error: {}", e)).encode()?,
        };

        tracing::trace!("[{}] Writing {} bytes", self.remote_addr, bytes.len());
        if let Err(e) = self.stream.write_all(&bytes).await {
            tracing::debug!("[{}] Write error: {}", self.remote_addr, e);
            return Err(ServerError::Io(e));
        }
        Ok(())
    }

    fn record(&self, dispatched: &Dispatched, elapsed: Duration) {
        let outcome = dispatched.outcome;
        tracing::debug!(
            "[{}] Message {} handled: {} ({:?})",
            self.remote_addr,
            self.message_count,
            outcome.as_str(),
            elapsed
        );

        if let Some(ref stats) = self.stats {
            stats.messages_total.fetch_add(1, Ordering::Relaxed);
            if !outcome.is_ok() {
                stats.errors_total.fetch_add(1, Ordering::Relaxed);
            }
        }

        if let Some(ref metrics) = self.metrics {
            metrics
                .messages_total
                .with_label_values(&[outcome.as_str()])
                .inc();
            if let (true, Some(service)) = (outcome.is_ok(), dispatched.service) {
                metrics
                    .dispatch_duration
                    .with_label_values(&[&service.to_string()])
                    .observe(elapsed.as_secs_f64());
            }
        }
    }
}

/// Reads one chunk, failing with `TimedOut` if `timeout` elapses first.
async fn read_chunk<S: AsyncRead + Unpin>(
    stream: &mut S,
    buf: &mut [u8],
    timeout: Option<Duration>,
) -> io::Result<usize> {
    match timeout {
        Some(timeout) => tokio::time::timeout(timeout, stream.read(buf))
            .await
            .unwrap_or_else(|_| Err(io::Error::from(io::ErrorKind::TimedOut))),
        None => stream.read(buf).await,
    }
}
