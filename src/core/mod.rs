//! # Core Protocol Components
//!
//! Low-level framing, field readers and the document codec boundary.
//!
//! ## Components
//! - **Frame**: 16-byte header, frame construction, integer and C-string readers
//! - **Reader**: exact-length async reads that report early EOF as a closed connection
//! - **Codec**: Tokio codec for framing over byte streams
//! - **Document**: order-preserving document encode/decode over `bson`
//!
//! ## Wire Format
//! ```text
//! [length(4)] [requestId(4)] [responseTo(4)] [opCode(4)] [body(length - 16)]
//! ```
//! All integers are little-endian.
//!
//! ## Safety
//! - Maximum message size: 48MB by default (prevents memory exhaustion)
//! - Length validation before allocation

pub mod codec;
pub mod document;
pub mod frame;
pub mod reader;
