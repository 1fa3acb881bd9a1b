//! # Protocol Layer
//!
//! Turns request bodies into a canonical `(query, meta)` pair, picks the
//! responder that answers them and encodes the reply in the format the
//! request's opcode expects.
//!
//! ## Components
//! - **OpCode / Operation**: opcode table and the per-opcode decode/encode strategy
//! - **OP_QUERY, OP_MSG, OP_INSERT**: body decoders and request/reply encoders
//! - **Registry**: ordered predicate/handler pairs, first match wins
//! - **Predicates**: ready-made query matchers
//! - **Built-ins**: handshake, ping, buildInfo and endSessions responders
//!
//! ## Example
//! ```rust
//! use bson::doc;
//! use docwire::protocol::predicate::first_key_is;
//! use docwire::protocol::registry::ResponderRegistry;
//! use docwire::protocol::request::RequestMeta;
//!
//! let mut registry = ResponderRegistry::<()>::new();
//! registry.register(first_key_is("ping"), |_, _, _| Ok(doc! { "ok": 1.0 }));
//!
//! let reply = registry
//!     .dispatch(&doc! { "ping": 1 }, &RequestMeta::default(), &())
//!     .unwrap();
//! assert_eq!(reply.get_f64("ok").unwrap(), 1.0);
//! ```

pub mod builtin;
pub mod op_insert;
pub mod op_msg;
pub mod op_query;
pub mod opcode;
pub mod operation;
pub mod predicate;
pub mod registry;
pub mod request;


pub use opcode::OpCode;
pub use operation::Operation;
pub use registry::{Responder, ResponderRegistry};
pub use request::{DecodedRequest, RequestMeta};
