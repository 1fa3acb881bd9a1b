//! # Built-in Responders
//!
//! Commands every client sends before it issues a real query: the connection
//! handshake, liveness pings, server build information and session cleanup.
//! Registering them first lets a backend plug in only the commands it
//! actually implements.

use bson::{doc, DateTime, Document};

use crate::config::TransportConfig;
use crate::protocol::predicate::{first_key_in, first_key_is, truthy};
use crate::protocol::registry::ResponderRegistry;

/// Handshake command names, in the casings clients use
pub const HANDSHAKE_COMMANDS: &[&str] = &["isMaster", "ismaster", "hello"];

/// Values advertised in the handshake reply
#[derive(Debug, Clone, PartialEq)]
pub struct ServerInfo {
    pub version: String,
    pub min_wire_version: i32,
    pub max_wire_version: i32,
    pub max_bson_object_size: i32,
    pub max_message_size_bytes: i32,
    pub max_write_batch_size: i32,
}

impl ServerInfo {
    pub fn from_transport(transport: &TransportConfig) -> Self {
        Self {
            max_bson_object_size: clamp_i32(transport.max_document_size),
            max_message_size_bytes: clamp_i32(transport.max_message_size),
            max_write_batch_size: clamp_i32(transport.max_write_batch_size),
            ..Self::default()
        }
    }

    /// Reply to `isMaster` / `hello`
    pub fn handshake_document(&self) -> Document {
        doc! {
            "ismaster": true,
            "isWritablePrimary": true,
            "helloOk": true,
            "maxBsonObjectSize": self.max_bson_object_size,
            "maxMessageSizeBytes": self.max_message_size_bytes,
            "maxWriteBatchSize": self.max_write_batch_size,
            "localTime": DateTime::now(),
            "minWireVersion": self.min_wire_version,
            "maxWireVersion": self.max_wire_version,
            "readOnly": false,
            "ok": 1.0,
        }
    }

    /// Reply to `buildInfo`
    pub fn build_info_document(&self) -> Document {
        let parts: Vec<i32> = self
            .version
            .split('.')
            .map(|p| p.parse().unwrap_or(0))
            .collect();
        doc! {
            "version": self.version.as_str(),
            "versionArray": parts,
            "maxBsonObjectSize": self.max_bson_object_size,
            "ok": 1.0,
        }
    }
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            version: String::from("3.6.0"),
            min_wire_version: 0,
            max_wire_version: 6,
            max_bson_object_size: 16 * 1024 * 1024,
            max_message_size_bytes: 48_000_000,
            max_write_batch_size: 100_000,
        }
    }
}

fn clamp_i32(v: usize) -> i32 {
    i32::try_from(v).unwrap_or(i32::MAX)
}

/// Register the built-in responders on `registry`.
///
/// Call this before registering backend responders or a catch-all fallback.
pub fn register_defaults<E>(registry: &mut ResponderRegistry<E>, info: ServerInfo) {
    let handshake = info.clone();
    registry.register_named(
        "handshake",
        |query: &Document| {
            HANDSHAKE_COMMANDS
                .iter()
                .any(|c| query.get(*c).is_some_and(truthy))
        },
        move |_, _, _| Ok(handshake.handshake_document()),
    );

    registry.register_named("ping", first_key_is("ping"), |_, _, _| {
        Ok(doc! { "ok": 1.0 })
    });

    let build = info;
    registry.register_named(
        "buildInfo",
        first_key_in(&["buildInfo", "buildinfo"]),
        move |_, _, _| Ok(build.build_info_document()),
    );

    registry.register_named("endSessions", first_key_is("endSessions"), |_, _, _| {
        Ok(doc! { "ok": 1.0 })
    });
}
