//! # Transport Layer
//!
//! Moves wire frames between clients and the responder registry.
//!
//! ## Components
//! - **Server**: TCP accept loop, connection limit, graceful shutdown
//! - **Connection**: per-connection read/dispatch/reply loop
//! - **Environment**: state shared by all connections of a server
//! - **Client**: framed TCP client for commands, legacy queries and inserts
//!
//! ## Concurrency
//! Each connection runs on its own task and handles one request at a time.
//! Connections share only the environment, which is read-only apart from
//! atomic counters.

pub mod client;
pub mod connection;
pub mod environment;
pub mod server;

pub use client::Client;
pub use connection::{Connection, ConnectionState};
pub use environment::ServerEnvironment;
pub use server::Server;
