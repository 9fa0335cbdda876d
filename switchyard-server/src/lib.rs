//! # switchyard-server
//!
//! Message dispatch server for switchyard.
//!
//! This crate provides:
//! - TCP connection handling with async I/O, one task per connection
//! - A service registry mapping service identifiers to method tables
//! - Sessions that decode, route, invoke and reply through a pluggable codec
//! - Configuration loading and Prometheus metrics
//! - A built-in `system` service for JSON-payload servers

pub mod config;
pub mod error;
pub mod metrics;
pub mod registry;
pub mod server;
pub mod service;
pub mod session;
pub mod system;

pub use config::{Config, MetricsConfig, NetworkConfig};
pub use error::{DispatchError, HandlerError, ServerError};
pub use metrics::Metrics;
pub use registry::Registry;
pub use server::{Server, ServerConfig, ServerStats};
pub use service::{Handler, ServiceDescription};
pub use session::{Outcome, Session, SessionState};
