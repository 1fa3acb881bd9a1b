use std::sync::atomic::{AtomicI32, Ordering};
use std::time::Duration;

use crate::config::DocwireConfig;
use crate::protocol::registry::ResponderRegistry;
use crate::utils::metrics::Metrics;

/// Context shared by every connection of one server.
///
/// Holds the backend handle passed to handlers and the responder registry.
/// Connections only read it; the reply-id source and the metrics are atomics.
pub struct ServerEnvironment<B> {
    backend: B,
    registry: ResponderRegistry<B>,
    metrics: Metrics,
    next_reply_id: AtomicI32,
    max_message_size: usize,
    max_document_size: usize,
    idle_timeout: Duration,
    write_timeout: Duration,
}

impl<B> ServerEnvironment<B> {
    pub fn new(backend: B, registry: ResponderRegistry<B>, config: &DocwireConfig) -> Self {
        Self {
            backend,
            registry,
            metrics: Metrics::new(),
            next_reply_id: AtomicI32::new(1),
            max_message_size: config.transport.max_message_size,
            max_document_size: config.transport.max_document_size,
            idle_timeout: config.server.idle_timeout,
            write_timeout: config.server.write_timeout,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn registry(&self) -> &ResponderRegistry<B> {
        &self.registry
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Request id for the next reply frame. Wraps around on overflow.
    pub fn next_reply_id(&self) -> i32 {
        self.next_reply_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn max_message_size(&self) -> usize {
        self.max_message_size
    }

    /// Largest encoded document a request may carry
    pub fn max_document_size(&self) -> usize {
        self.max_document_size
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    pub fn write_timeout(&self) -> Duration {
        self.write_timeout
    }
}
