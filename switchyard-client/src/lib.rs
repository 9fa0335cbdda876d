//! # switchyard-client
//!
//! Client library for switchyard.
//!
//! This crate provides:
//! - Async TCP connections speaking the switchyard frame format
//! - Codec-aware calls that return decoded results or the server's raw error

pub mod client;
pub mod connection;
pub mod error;

pub use client::Client;
pub use connection::{Connection, ConnectionConfig};
pub use error::ClientError;
