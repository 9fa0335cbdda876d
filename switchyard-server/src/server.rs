//! TCP dispatch server.

use crate::error::{DispatchError, ServerError};
use crate::metrics::Metrics;
use crate::registry::Registry;
use crate::service::ServiceDescription;
use crate::session::Session;
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use switchyard_protocol::Codec;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

/// Server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Idle connection timeout (`None` waits forever).
    pub idle_timeout: Option<Duration>,
    /// Maximum concurrent connections (0 = unlimited).
    pub max_connections: usize,
    /// Metrics instance (if metrics are enabled).
    pub metrics: Option<Arc<Metrics>>,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("bind_addr", &self.bind_addr)
            .field("idle_timeout", &self.idle_timeout)
            .field("max_connections", &self.max_connections)
            .field("metrics_enabled", &self.metrics.is_some())
            .finish()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], switchyard_protocol::DEFAULT_PORT)),
            idle_timeout: None,
            max_connections: 0, // unlimited
            metrics: None,
        }
    }
}

impl ServerConfig {
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            ..Default::default()
        }
    }

    /// Sets the idle timeout.
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// Sets the connection limit.
    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the metrics instance.
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Returns whether metrics are enabled.
    pub fn metrics_enabled(&self) -> bool {
        self.metrics.is_some()
    }

    fn at_capacity(&self, active: u64) -> bool {
        self.max_connections > 0 && active >= self.max_connections as u64
    }
}

/// Server statistics.
#[derive(Debug, Default)]
pub struct ServerStats {
    pub connections_total: AtomicU64,
    pub connections_active: AtomicU64,
    pub connections_rejected: AtomicU64,
    pub messages_total: AtomicU64,
    /// Messages answered with a raw error.
    pub errors_total: AtomicU64,
}

/// Message dispatch server.
///
/// Owns the service registry and the codec; every accepted connection gets
/// its own task running a `Session`.
pub struct Server<C: Codec> {
    config: ServerConfig,
    codec: Arc<C>,
    registry: Arc<Registry<C::Payload>>,
    stats: Arc<ServerStats>,
    shutdown: broadcast::Sender<()>,
    running: AtomicBool,
    local_addr: Mutex<Option<SocketAddr>>,
}

impl<C: Codec> Server<C> {
    /// Creates a new server using `codec` for every connection.
    pub fn new(config: ServerConfig, codec: C) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            codec: Arc::new(codec),
            registry: Arc::new(Registry::new()),
            stats: Arc::new(ServerStats::default()),
            shutdown: shutdown_tx,
            running: AtomicBool::new(false),
            local_addr: Mutex::new(None),
        }
    }

    /// Registers a service with the server's registry.
    pub fn register_service(
        &self,
        description: ServiceDescription<C::Payload>,
    ) -> Result<(), DispatchError> {
        let id = description.id();
        self.registry.register(description)?;
        tracing::info!("Service registered: {}", id);

        if let Some(ref metrics) = self.config.metrics {
            metrics.services_registered.set(self.registry.len() as f64);
        }
        Ok(())
    }

    /// Returns the service registry.
    pub fn registry(&self) -> &Arc<Registry<C::Payload>> {
        &self.registry
    }

    /// Returns the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Binds the configured address and serves until shutdown.
    ///
    /// Only a bind failure is returned; connection failures stay inside their
    /// sessions.
    pub async fn run(&self) -> Result<(), ServerError> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener).await
    }

    /// Serves connections from an already bound listener until shutdown.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        let mut shutdown_rx = self.shutdown.subscribe();
        let local_addr = listener.local_addr()?;
        *self.local_addr.lock() = Some(local_addr);
        self.running.store(true, Ordering::SeqCst);
        tracing::info!(
            "Server listening on {} ({} service(s) registered)",
            local_addr,
            self.registry.len()
        );

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((tcp_stream, addr)) => {
                            let active = self.stats.connections_active.load(Ordering::Relaxed);
                            if self.config.at_capacity(active) {
                                tracing::warn!("Connection limit reached, rejecting {}", addr);
                                self.stats.connections_rejected.fetch_add(1, Ordering::Relaxed);
                                if let Some(ref metrics) = self.config.metrics {
                                    metrics.connections_rejected_total.inc();
                                }
                                continue;
                            }

                            self.stats.connections_total.fetch_add(1, Ordering::Relaxed);
                            self.stats.connections_active.fetch_add(1, Ordering::Relaxed);

                            if let Some(ref metrics) = self.config.metrics {
                                metrics.connections_total.inc();
                                metrics.connections_active.inc();
                            }

                            tcp_stream.set_nodelay(true).ok();

                            let mut session = Session::new(
                                tcp_stream,
                                addr,
                                self.codec.clone(),
                                self.registry.clone(),
                            )
                            .with_idle_timeout(self.config.idle_timeout)
                            .with_stats(self.stats.clone())
                            .with_metrics(self.config.metrics.clone());

                            let stats = self.stats.clone();
                            let metrics = self.config.metrics.clone();
                            let mut conn_shutdown = self.shutdown.subscribe();

                            tokio::spawn(async move {
                                tracing::info!("Client connected: {} (session {})", addr, session.id);

                                if let Err(e) = session.run(&mut conn_shutdown).await {
                                    tracing::debug!("Connection {} error: {}", addr, e);
                                }

                                stats.connections_active.fetch_sub(1, Ordering::Relaxed);
                                if let Some(ref metrics) = metrics {
                                    metrics.connections_active.dec();
                                }

                                tracing::info!("Client disconnected: {}", addr);
                            });
                        }
                        Err(e) => {
                            tracing::error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    tracing::info!("Server shutting down");
                    break;
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Initiates server shutdown. Live sessions are closed as well.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(());
    }

    /// Returns a receiver notified on shutdown.
    pub fn subscribe_shutdown(&self) -> broadcast::Receiver<()> {
        self.shutdown.subscribe()
    }

    /// Returns whether the server is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Returns the address being served, once the listener is bound.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock()
    }

    /// Returns server statistics.
    pub fn stats(&self) -> &ServerStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchyard_protocol::{JsonCodec, MethodId, ServiceId};

    fn test_server() -> Server<JsonCodec> {
        let config = ServerConfig::new("127.0.0.1:0".parse().unwrap());
        Server::new(config, JsonCodec::new())
    }

    #[tokio::test]
    async fn test_server_basic() {
        let server = test_server();
        assert!(!server.is_running());
        assert!(server.registry().is_empty());
    }

    #[tokio::test]
    async fn test_register_service_rejects_duplicates() {
        let metrics = Arc::new(Metrics::new().unwrap());
        let config = ServerConfig::default().with_metrics(metrics.clone());
        let server = Server::new(config, JsonCodec::new());

        server
            .register_service(ServiceDescription::new([1, 0, 0]).with_method([0, 0, 1], Ok))
            .unwrap();
        let err = server
            .register_service(ServiceDescription::new([1, 0, 0]))
            .unwrap_err();

        assert_eq!(err, DispatchError::DuplicateService(ServiceId::new([1, 0, 0])));
        assert!(server
            .registry()
            .resolve(ServiceId::new([1, 0, 0]), MethodId::new([0, 0, 1]))
            .is_ok());
        assert_eq!(metrics.services_registered.get(), 1.0);
    }

    #[tokio::test]
    async fn test_bind_failure_is_returned() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = Server::new(ServerConfig::new(addr), JsonCodec::new());
        let result = server.run().await;
        assert!(matches!(result, Err(ServerError::Io(_))));
        assert!(!server.is_running());
    }

    #[tokio::test]
    async fn test_shutdown_stops_serve() {
        let server = Arc::new(test_server());
        assert_eq!(server.local_addr(), None);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = {
            let server = server.clone();
            tokio::spawn(async move { server.serve(listener).await })
        };

        while !server.is_running() {
            tokio::task::yield_now().await;
        }
        assert_eq!(server.local_addr(), Some(addr));
        server.shutdown();

        handle.await.unwrap().unwrap();
        assert!(!server.is_running());
    }

    #[test]
    fn test_capacity() {
        let config = ServerConfig::default();
        assert!(!config.at_capacity(10_000));

        let config = config.with_max_connections(2);
        assert!(!config.at_capacity(1));
        assert!(config.at_capacity(2));
    }
}
