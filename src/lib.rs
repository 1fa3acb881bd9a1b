//! # docwire
//!
//! Server side of a document-database wire protocol.
//!
//! Accepts TCP connections, splits the byte stream into length-prefixed
//! frames, decodes OP_QUERY, OP_MSG and OP_INSERT bodies into a canonical
//! query document, routes each query to the first registered responder whose
//! predicate accepts it and writes the result back in the reply format of the
//! request's opcode.
//!
//! ## Layers
//! - [`core`]: frame header, field readers, async exact reads, document codec
//! - [`protocol`]: per-opcode decoding and encoding, responder registry, built-ins
//! - [`transport`]: TCP server, connection loop, client
//! - [`config`], [`error`], [`utils`]: configuration, errors, logging, metrics, timeouts
//!
//! ## Example
//! ```no_run
//! use docwire::config::DocwireConfig;
//! use docwire::protocol::builtin::{register_defaults, ServerInfo};
//! use docwire::protocol::registry::ResponderRegistry;
//! use docwire::transport::Server;
//!
//! # async fn demo() -> docwire::Result<()> {
//! let config = DocwireConfig::from_env()?;
//! let mut registry = ResponderRegistry::new();
//! register_defaults(&mut registry, ServerInfo::from_transport(&config.transport));
//!
//! Server::new(&config, registry, ()).run().await
//! # }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod transport;
pub mod utils;

pub use config::DocwireConfig;
pub use error::{HandlerError, ProtocolError, Result};
pub use protocol::{DecodedRequest, RequestMeta, ResponderRegistry};
pub use transport::{Client, Server};
