use bson::Document;
use std::borrow::Cow;
use tracing::debug;

use crate::error::{HandlerError, ProtocolError, Result};
use crate::protocol::request::{command_name, RequestMeta};

type PredicateFn = dyn Fn(&Document) -> bool + Send + Sync + 'static;
type HandlerFn<E> =
    dyn Fn(&Document, &RequestMeta, &E) -> std::result::Result<Document, HandlerError>
        + Send
        + Sync
        + 'static;

/// A predicate that recognizes a query shape and the handler that answers it.
pub struct Responder<E> {
    name: Cow<'static, str>,
    predicate: Box<PredicateFn>,
    handler: Box<HandlerFn<E>>,
}

impl<E> Responder<E> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn matches(&self, query: &Document) -> bool {
        (self.predicate)(query)
    }

    pub fn handle(
        &self,
        query: &Document,
        meta: &RequestMeta,
        env: &E,
    ) -> std::result::Result<Document, HandlerError> {
        (self.handler)(query, meta, env)
    }
}

impl<E> std::fmt::Debug for Responder<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Responder").field("name", &self.name).finish()
    }
}

/// Ordered list of responders; the first whose predicate matches wins.
///
/// Registration appends without reordering, so specific predicates must be
/// registered before generic fallbacks. The registry is filled before the
/// server starts and only read afterwards, so it needs no lock.
pub struct ResponderRegistry<E> {
    responders: Vec<Responder<E>>,
}

impl<E> Default for ResponderRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> ResponderRegistry<E> {
    pub fn new() -> Self {
        Self {
            responders: Vec::new(),
        }
    }

    /// Append an unnamed responder.
    pub fn register<P, H>(&mut self, predicate: P, handler: H) -> &mut Self
    where
        P: Fn(&Document) -> bool + Send + Sync + 'static,
        H: Fn(&Document, &RequestMeta, &E) -> std::result::Result<Document, HandlerError>
            + Send
            + Sync
            + 'static,
    {
        let name = Cow::Owned(format!("responder-{}", self.responders.len()));
        self.push(name, predicate, handler)
    }

    /// Append a responder with a name used in logs.
    pub fn register_named<P, H>(
        &mut self,
        name: impl Into<Cow<'static, str>>,
        predicate: P,
        handler: H,
    ) -> &mut Self
    where
        P: Fn(&Document) -> bool + Send + Sync + 'static,
        H: Fn(&Document, &RequestMeta, &E) -> std::result::Result<Document, HandlerError>
            + Send
            + Sync
            + 'static,
    {
        self.push(name.into(), predicate, handler)
    }

    fn push<P, H>(&mut self, name: Cow<'static, str>, predicate: P, handler: H) -> &mut Self
    where
        P: Fn(&Document) -> bool + Send + Sync + 'static,
        H: Fn(&Document, &RequestMeta, &E) -> std::result::Result<Document, HandlerError>
            + Send
            + Sync
            + 'static,
    {
        self.responders.push(Responder {
            name,
            predicate: Box::new(predicate),
            handler: Box::new(handler),
        });
        self
    }

    pub fn len(&self) -> usize {
        self.responders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.responders.is_empty()
    }

    /// First responder whose predicate accepts `query`.
    pub fn find_match(&self, query: &Document) -> Result<&Responder<E>> {
        self.responders
            .iter()
            .find(|r| r.matches(query))
            .ok_or_else(|| ProtocolError::NoMatchingResponder(command_name(query).to_owned()))
    }

    /// Find the matching responder and run its handler.
    pub fn dispatch(&self, query: &Document, meta: &RequestMeta, env: &E) -> Result<Document> {
        let responder = self.find_match(query)?;
        debug!(
            responder = responder.name(),
            request_id = meta.request_id,
            "Dispatching request"
        );
        Ok(responder.handle(query, meta, env)?)
    }
}
