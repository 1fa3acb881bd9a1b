//! # Connection Loop
//!
//! Serves one client connection, one request at a time:
//!
//! ```text
//! AwaitingHeader -> AwaitingBody -> Dispatching -> Replying -> AwaitingHeader
//!        \               \              \              \
//!         +---------------+--------------+--------------+--> Closed
//! ```
//!
//! The next header is not read until the current request has been answered
//! (or found to need no answer), so replies leave in request order.
//!
//! Requests the registry cannot answer, whose handler fails, or that carry a
//! document over `max_document_size` get an `ok: 0` error document and the
//! loop continues. Anything wrong with the
//! framing itself closes the connection without a reply, since the stream
//! cannot be resynchronized.

use bytes::Bytes;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::core::frame::FrameHeader;
use crate::core::reader::{self, map_read_error};
use crate::error::{ProtocolError, Result};
use crate::protocol::operation::Operation;
use crate::transport::environment::ServerEnvironment;
use crate::utils::metrics::Timer;
use crate::utils::timeout::{with_optional_timeout, with_timeout_error};

/// Where a connection is in its request cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    AwaitingHeader,
    AwaitingBody,
    Dispatching,
    Replying,
    Closed,
}

/// One client connection and the state it owns.
pub struct Connection<S, B> {
    stream: S,
    peer: String,
    env: Arc<ServerEnvironment<B>>,
    shutdown: CancellationToken,
    state: ConnectionState,
}

impl<S, B> Connection<S, B>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(
        stream: S,
        peer: impl Into<String>,
        env: Arc<ServerEnvironment<B>>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            stream,
            peer: peer.into(),
            env,
            shutdown,
            state: ConnectionState::AwaitingHeader,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Serve requests until the connection ends.
    ///
    /// Returns `Ok(())` when the server's shutdown token stopped the loop, and
    /// the error that closed the connection otherwise; a peer that hangs up
    /// yields [`ProtocolError::ConnectionClosed`].
    pub async fn run(mut self) -> Result<()> {
        let result = self.serve().await;
        self.transition(ConnectionState::Closed);

        let outcome = match result {
            Err(ProtocolError::Cancelled) => {
                debug!(peer = %self.peer, "Connection cancelled by shutdown");
                Ok(())
            }
            Err(ProtocolError::ConnectionClosed) => {
                debug!(peer = %self.peer, "Peer closed connection");
                Err(ProtocolError::ConnectionClosed)
            }
            Err(ProtocolError::Timeout) => {
                info!(peer = %self.peer, "Connection timed out");
                Err(ProtocolError::Timeout)
            }
            Err(e) => {
                self.env.metrics().protocol_error();
                warn!(peer = %self.peer, error = %e, "Closing connection after protocol error");
                Err(e)
            }
            Ok(()) => Ok(()),
        };

        if let Err(e) = self.stream.shutdown().await {
            debug!(peer = %self.peer, error = %e, "Failed to shut down stream");
        }
        outcome
    }

    async fn serve(&mut self) -> Result<()> {
        loop {
            self.transition(ConnectionState::AwaitingHeader);
            let header = self.read_header().await?;
            let body_len = header.body_len(self.env.max_message_size())?;

            self.transition(ConnectionState::AwaitingBody);
            let body = self.read_body(body_len).await?;
            self.env
                .metrics()
                .request_received(header.length as u64);

            self.transition(ConnectionState::Dispatching);
            if let Some(reply) = self.dispatch(&header, &body)? {
                self.transition(ConnectionState::Replying);
                self.write_reply(&reply).await?;
            }
        }
    }

    /// Decode, route and encode one request. `None` means no reply is sent.
    fn dispatch(&self, header: &FrameHeader, body: &[u8]) -> Result<Option<Bytes>> {
        let _timer = Timer::start("dispatch");
        let operation = Operation::from_opcode(header.opcode)?;
        let request = operation.decode(header.request_id, body)?;
        debug!(
            peer = %self.peer,
            request_id = header.request_id,
            opcode = operation.opcode().name(),
            command = request.command_name(),
            "Request decoded"
        );

        let max_document = self.env.max_document_size();
        let routed = if request.meta.largest_document > max_document {
            Err(ProtocolError::DocumentTooLarge {
                size: request.meta.largest_document,
                max: max_document,
            })
        } else {
            self.env
                .registry()
                .dispatch(&request.query, &request.meta, self.env.backend())
        };

        let result = match routed {
            Ok(doc) => doc,
            Err(err) => {
                match &err {
                    ProtocolError::NoMatchingResponder(_) => self.env.metrics().unmatched_request(),
                    ProtocolError::Handler(_) => self.env.metrics().handler_error(),
                    _ => {}
                }
                let doc = err.to_reply_document().ok_or(err)?;
                warn!(
                    peer = %self.peer,
                    request_id = header.request_id,
                    command = request.command_name(),
                    errmsg = doc.get_str("errmsg").unwrap_or_default(),
                    "Request failed"
                );
                doc
            }
        };

        if !request.expects_reply() {
            trace!(request_id = header.request_id, "No reply expected");
            return Ok(None);
        }
        operation.encode_reply(&result, header.request_id, self.env.next_reply_id())
    }

    async fn read_header(&mut self) -> Result<FrameHeader> {
        let idle = self.env.idle_timeout();
        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => Err(ProtocolError::Cancelled),
            res = with_optional_timeout(reader::read_header(&mut self.stream), idle) => res,
        }
    }

    async fn read_body(&mut self, len: usize) -> Result<Bytes> {
        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => Err(ProtocolError::Cancelled),
            res = reader::read_exact(&mut self.stream, len) => res.map(|b| b.freeze()),
        }
    }

    async fn write_reply(&mut self, reply: &[u8]) -> Result<()> {
        let stream = &mut self.stream;
        with_timeout_error(
            async move {
                stream.write_all(reply).await.map_err(map_read_error)?;
                stream.flush().await.map_err(map_read_error)?;
                Ok::<(), ProtocolError>(())
            },
            self.env.write_timeout(),
        )
        .await?;
        self.env.metrics().reply_sent(reply.len() as u64);
        Ok(())
    }

    fn transition(&mut self, next: ConnectionState) {
        trace!(peer = %self.peer, from = ?self.state, to = ?next, "Connection state");
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DocwireConfig;
    use crate::core::frame::{Frame, HEADER_LEN};
    use crate::error::HandlerError;
    use crate::protocol::registry::ResponderRegistry;
    use crate::protocol::op_msg::DocumentSequence;
    use crate::protocol::{op_insert, op_msg, predicate};
    use bson::{doc, Document};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, DuplexStream};

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<Document>>,
    }

    fn environment() -> Arc<ServerEnvironment<Recorder>> {
        environment_with(&DocwireConfig::default())
    }

    fn environment_with(config: &DocwireConfig) -> Arc<ServerEnvironment<Recorder>> {
        let mut registry = ResponderRegistry::new();
        registry
            .register(predicate::first_key_is("ping"), |_, _, _| Ok(doc! { "ok": 1.0 }))
            .register(predicate::first_key_is("insert"), |q, _, env: &Recorder| {
                env.seen.lock().unwrap().push(q.clone());
                Ok(doc! { "ok": 1.0 })
            })
            .register(predicate::first_key_is("boom"), |_, _, _| {
                Err(HandlerError::internal("backend exploded"))
            });
        Arc::new(ServerEnvironment::new(Recorder::default(), registry, config))
    }

    fn spawn(
        env: Arc<ServerEnvironment<Recorder>>,
    ) -> (DuplexStream, CancellationToken, tokio::task::JoinHandle<Result<()>>) {
        spawn_with_buffer(env, 64 * 1024)
    }

    fn spawn_with_buffer(
        env: Arc<ServerEnvironment<Recorder>>,
        buffer: usize,
    ) -> (DuplexStream, CancellationToken, tokio::task::JoinHandle<Result<()>>) {
        let (client, server) = tokio::io::duplex(buffer);
        let token = CancellationToken::new();
        let conn = Connection::new(server, "test-peer", env, token.clone());
        (client, token, tokio::spawn(conn.run()))
    }

    async fn read_frame(stream: &mut DuplexStream) -> Frame {
        let mut header = [0u8; HEADER_LEN];
        stream.read_exact(&mut header).await.unwrap();
        let header = FrameHeader::parse(&header);
        let mut body = vec![0u8; header.length as usize - HEADER_LEN];
        stream.read_exact(&mut body).await.unwrap();
        Frame {
            header,
            body: body.into(),
        }
    }

    async fn command(stream: &mut DuplexStream, id: i32, cmd: Document) -> Document {
        let frame = op_msg::encode_request(id, 0, &cmd, &[]).unwrap();
        stream.write_all(&frame.to_bytes()).await.unwrap();
        let reply = read_frame(stream).await;
        assert_eq!(reply.header.response_to, id);
        op_msg::decode(reply.header.request_id, &reply.body)
            .unwrap()
            .query
    }

    #[tokio::test]
    async fn partial_header_then_close_is_connection_closed() {
        let (mut client, _token, handle) = spawn(environment());
        client.write_all(&[0u8; 10]).await.unwrap();
        drop(client);

        let result = handle.await.unwrap();
        assert!(matches!(result, Err(ProtocolError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn replies_in_request_order() {
        let (mut client, _token, _handle) = spawn(environment());
        for id in 1..=3 {
            let reply = command(&mut client, id, doc! { "ping": 1, "$db": "admin" }).await;
            assert_eq!(reply.get_f64("ok").unwrap(), 1.0);
        }
    }

    #[tokio::test]
    async fn handler_failure_keeps_connection_open() {
        let env = environment();
        let (mut client, _token, _handle) = spawn(env.clone());

        let reply = command(&mut client, 1, doc! { "boom": 1, "$db": "admin" }).await;
        assert_eq!(reply.get_f64("ok").unwrap(), 0.0);
        assert_eq!(reply.get_str("errmsg").unwrap(), "backend exploded");

        let reply = command(&mut client, 2, doc! { "unknownCmd": 1, "$db": "admin" }).await;
        assert_eq!(reply.get_i32("code").unwrap(), 59);

        let reply = command(&mut client, 3, doc! { "ping": 1, "$db": "admin" }).await;
        assert_eq!(reply.get_f64("ok").unwrap(), 1.0);

        let snap = env.metrics().snapshot();
        assert_eq!(snap.handler_errors, 1);
        assert_eq!(snap.unmatched_requests, 1);
    }

    #[tokio::test]
    async fn insert_gets_no_reply_and_loop_continues() {
        let env = environment();
        let (mut client, _token, _handle) = spawn(env.clone());

        let insert = op_insert::encode_request(
            1,
            0,
            "app.users",
            &[doc! { "insert": "users", "name": "ada" }],
        )
        .unwrap();
        client.write_all(&insert.to_bytes()).await.unwrap();

        // The next reply on the wire answers the ping, not the insert.
        let reply = command(&mut client, 2, doc! { "ping": 1, "$db": "admin" }).await;
        assert_eq!(reply.get_f64("ok").unwrap(), 1.0);
        assert_eq!(env.backend().seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unsupported_opcode_closes_connection() {
        let (mut client, _token, handle) = spawn(environment());
        let frame = Frame::new(1, 0, 2005, vec![0u8; 8]).unwrap();
        client.write_all(&frame.to_bytes()).await.unwrap();

        let result = handle.await.unwrap();
        assert!(matches!(result, Err(ProtocolError::UnsupportedOpcode(2005))));
    }

    #[tokio::test]
    async fn cancellation_unblocks_pending_read() {
        let (client, token, handle) = spawn(environment());
        token.cancel();
        let result = handle.await.unwrap();
        assert!(result.is_ok());
        drop(client);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_connection_times_out() {
        let config = DocwireConfig::default_with_overrides(|c| {
            c.server.idle_timeout = Duration::from_millis(500)
        });
        let env = environment_with(&config);
        let (client, _token, handle) = spawn(env.clone());

        let result = handle.await.unwrap();
        assert!(matches!(result, Err(ProtocolError::Timeout)));
        assert_eq!(env.metrics().snapshot().protocol_errors, 0);
        drop(client);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_timeout_restarts_after_each_request() {
        let config = DocwireConfig::default_with_overrides(|c| {
            c.server.idle_timeout = Duration::from_millis(500)
        });
        let (mut client, _token, handle) = spawn(environment_with(&config));

        for id in 1..=3 {
            tokio::time::sleep(Duration::from_millis(400)).await;
            let reply = command(&mut client, id, doc! { "ping": 1, "$db": "admin" }).await;
            assert_eq!(reply.get_f64("ok").unwrap(), 1.0);
        }
        assert!(!handle.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn undrained_reply_hits_write_timeout() {
        let config = DocwireConfig::default_with_overrides(|c| {
            c.server.write_timeout = Duration::from_secs(1)
        });
        // The ping reply is larger than the pipe, and the client never reads it.
        let (mut client, _token, handle) = spawn_with_buffer(environment_with(&config), 16);

        let request = op_msg::encode_request(1, 0, &doc! { "ping": 1, "$db": "admin" }, &[]).unwrap();
        client.write_all(&request.to_bytes()).await.unwrap();

        let result = handle.await.unwrap();
        assert!(matches!(result, Err(ProtocolError::Timeout)));
        drop(client);
    }

    #[tokio::test]
    async fn oversized_document_gets_error_and_loop_continues() {
        let config = DocwireConfig::default_with_overrides(|c| c.transport.max_document_size = 64);
        let env = environment_with(&config);
        let (mut client, _token, _handle) = spawn(env.clone());

        let batch = DocumentSequence {
            identifier: "documents".to_string(),
            documents: vec![doc! { "payload": "x".repeat(128) }],
        };
        let request = op_msg::encode_request(
            1,
            0,
            &doc! { "insert": "users", "$db": "app" },
            std::slice::from_ref(&batch),
        )
        .unwrap();
        client.write_all(&request.to_bytes()).await.unwrap();

        let reply = read_frame(&mut client).await;
        assert_eq!(reply.header.response_to, 1);
        let reply = op_msg::decode(reply.header.request_id, &reply.body)
            .unwrap()
            .query;
        assert_eq!(reply.get_f64("ok").unwrap(), 0.0);
        assert_eq!(reply.get_i32("code").unwrap(), 10334);
        assert_eq!(reply.get_str("codeName").unwrap(), "BSONObjectTooLarge");
        assert!(env.backend().seen.lock().unwrap().is_empty());

        let reply = command(&mut client, 2, doc! { "ping": 1, "$db": "admin" }).await;
        assert_eq!(reply.get_f64("ok").unwrap(), 1.0);
    }
}
