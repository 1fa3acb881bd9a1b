//! # Error Types
//!
//! Error handling for the wire protocol layer.
//!
//! Every failure a connection can run into is a variant of [`ProtocolError`].
//! The variants fall into two groups:
//!
//! ## Connection-fatal
//! - **Stream errors**: the peer closed the stream, I/O failed, a read timed out
//!   or the server is shutting down
//! - **Malformed input**: bad header, oversized frame, truncated or corrupt
//!   document, bad section kind, checksum size mismatch
//! - **Unsupported opcode**: a frame whose opcode has no decoder
//!
//! ## Request-scoped
//! - **No matching responder**: nothing registered recognizes the query
//! - **Handler failure**: the matched responder returned a [`HandlerError`]
//! - **Document too large**: a document exceeds the advertised
//!   `maxBsonObjectSize`
//!
//! Request-scoped errors are answered with an error document and the
//! connection keeps running. See [`ProtocolError::is_request_scoped`].
//!
//! ## Example Usage
//! ```rust
//! use docwire::error::{HandlerError, ProtocolError};
//!
//! let err = ProtocolError::Handler(HandlerError::internal("backend offline"));
//! assert!(err.is_request_scoped());
//! assert!(!ProtocolError::ConnectionClosed.is_request_scoped());
//! ```

use bson::{doc, Document};
use serde::{Deserialize, Serialize};
use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Frame validation errors
    pub const ERR_MISSING_NUL: &str = "C-string is missing its NUL terminator";
    pub const ERR_INVALID_UTF8: &str = "C-string is not valid UTF-8";
    pub const ERR_TRUNCATED_INT: &str = "Not enough bytes for an integer field";

    /// Document errors
    pub const ERR_TRUNCATED_DOCUMENT: &str = "Document length exceeds available bytes";
    pub const ERR_DOCUMENT_TOO_SHORT: &str = "Document length below minimum of 5 bytes";
    pub const ERR_MISSING_DOCUMENT: &str = "Message carries no document";

    /// OP_MSG section errors
    pub const ERR_UNKNOWN_SECTION: &str = "Unknown OP_MSG section kind";
    pub const ERR_SECTION_OVERRUN: &str = "OP_MSG section runs past the message boundary";
    pub const ERR_CHECKSUM_SIZE: &str = "OP_MSG checksum flag set but 4 checksum bytes are not present";
    pub const ERR_TRAILING_BYTES: &str = "Bytes left over after OP_MSG section parsing";

    /// Handler error code names
    pub const CODE_NAME_INTERNAL: &str = "InternalError";
    pub const CODE_NAME_COMMAND_NOT_FOUND: &str = "CommandNotFound";
    pub const CODE_NAME_BAD_VALUE: &str = "BadValue";
    pub const CODE_NAME_OBJECT_TOO_LARGE: &str = "BSONObjectTooLarge";
}

/// Error code reported for an unrecognized command.
pub const CODE_COMMAND_NOT_FOUND: i32 = 59;
/// Error code reported for an internal handler failure.
pub const CODE_INTERNAL: i32 = 1;
/// Error code reported for invalid command arguments.
pub const CODE_BAD_VALUE: i32 = 2;
/// Error code reported for a document above the advertised size limit.
pub const CODE_OBJECT_TOO_LARGE: i32 = 10334;

// ProtocolError is the primary error type for all protocol operations
#[derive(Error, Debug, Serialize, Deserialize)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    #[serde(skip_serializing, skip_deserializing)]
    Io(#[from] io::Error),

    #[error("Document decode error: {0}")]
    #[serde(skip_serializing, skip_deserializing)]
    Document(#[from] bson::de::Error),

    #[error("Document encode error: {0}")]
    #[serde(skip_serializing, skip_deserializing)]
    DocumentEncode(#[from] bson::ser::Error),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Connection cancelled by server shutdown")]
    Cancelled,

    #[error("Invalid message header")]
    InvalidHeader,

    #[error("Message too large: {0} bytes")]
    OversizedFrame(usize),

    #[error("Malformed message: {0}")]
    Malformed(String),

    #[error("Unsupported opcode: {0}")]
    UnsupportedOpcode(i32),

    #[error("Document of {size} bytes exceeds the {max} byte limit")]
    DocumentTooLarge { size: usize, max: usize },

    #[error("No responder matched query for command '{0}'")]
    NoMatchingResponder(String),

    #[error("Handler failed: {0}")]
    Handler(#[from] HandlerError),

    #[error("Timeout occurred")]
    Timeout,

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl ProtocolError {
    /// Build a [`ProtocolError::Malformed`] from a static message.
    pub fn malformed(msg: &str) -> Self {
        ProtocolError::Malformed(msg.to_string())
    }

    /// Whether the error concerns a single request and can be answered while
    /// the connection keeps running.
    pub fn is_request_scoped(&self) -> bool {
        matches!(
            self,
            ProtocolError::NoMatchingResponder(_)
                | ProtocolError::Handler(_)
                | ProtocolError::DocumentTooLarge { .. }
        )
    }

    /// Whether the error means the peer went away rather than misbehaved.
    pub fn is_disconnect(&self) -> bool {
        matches!(
            self,
            ProtocolError::ConnectionClosed | ProtocolError::Cancelled
        )
    }

    /// Error document sent back to the client for request-scoped errors.
    ///
    /// Returns `None` for connection-fatal errors, which are never answered.
    pub fn to_reply_document(&self) -> Option<Document> {
        match self {
            ProtocolError::NoMatchingResponder(command) => Some(
                HandlerError::command_not_found(format!("no such command: '{command}'"))
                    .to_document(),
            ),
            ProtocolError::Handler(err) => Some(err.to_document()),
            ProtocolError::DocumentTooLarge { size, max } => Some(
                HandlerError::new(
                    CODE_OBJECT_TOO_LARGE,
                    constants::CODE_NAME_OBJECT_TOO_LARGE,
                    format!("object too large. size in bytes: {size}, max size: {max}"),
                )
                .to_document(),
            ),
            _ => None,
        }
    }
}

/// Failure raised by a responder's handler.
///
/// Carries the numeric code and code name the client sees in the `ok: 0`
/// reply document.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{code_name} ({code}): {message}")]
pub struct HandlerError {
    pub code: i32,
    pub code_name: String,
    pub message: String,
}

impl HandlerError {
    pub fn new(code: i32, code_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            code_name: code_name.into(),
            message: message.into(),
        }
    }

    /// Generic failure inside the backend
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(CODE_INTERNAL, constants::CODE_NAME_INTERNAL, message)
    }

    /// The command is not known to this server
    pub fn command_not_found(message: impl Into<String>) -> Self {
        Self::new(
            CODE_COMMAND_NOT_FOUND,
            constants::CODE_NAME_COMMAND_NOT_FOUND,
            message,
        )
    }

    /// The command was recognized but its arguments are invalid
    pub fn bad_value(message: impl Into<String>) -> Self {
        Self::new(CODE_BAD_VALUE, constants::CODE_NAME_BAD_VALUE, message)
    }

    /// Render as the `{ok: 0, errmsg, code, codeName}` reply document.
    pub fn to_document(&self) -> Document {
        doc! {
            "ok": 0.0,
            "errmsg": self.message.as_str(),
            "code": self.code,
            "codeName": self.code_name.as_str(),
        }
    }
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;
