//! # Client
//!
//! Minimal client for talking to a docwire server, used by the integration
//! tests and handy for smoke-testing a deployment.
//!
//! Frames go through [`WireCodec`] over any async byte stream.
//!
//! ## Example
//! ```no_run
//! # async fn demo() -> docwire::Result<()> {
//! use bson::doc;
//! use docwire::transport::client::Client;
//!
//! let mut client = Client::connect("127.0.0.1:47336").await?;
//! let reply = client.run_command("admin", doc! { "ping": 1 }).await?;
//! assert_eq!(reply.get_f64("ok").ok(), Some(1.0));
//! # Ok(())
//! # }
//! ```

use bson::Document;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio_util::codec::Framed;
use tracing::{debug, instrument};

use crate::core::codec::WireCodec;
use crate::core::frame::Frame;
use crate::error::{ProtocolError, Result};
use crate::error::constants::ERR_MISSING_DOCUMENT;
use crate::protocol::op_insert;
use crate::protocol::op_msg::{self, DocumentSequence, DATABASE_KEY, FLAG_MORE_TO_COME};
use crate::protocol::op_query::{self, COMMAND_SUFFIX};
use crate::protocol::opcode::OpCode;

/// Connection to a docwire server
pub struct Client<S = TcpStream> {
    framed: Framed<S, WireCodec>,
    next_request_id: i32,
}

impl Client<TcpStream> {
    /// Connect over TCP with the default frame size limit
    #[instrument(skip(addr))]
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(Self::new(stream, WireCodec::default()))
    }
}

impl<S> Client<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, codec: WireCodec) -> Self {
        Self {
            framed: Framed::new(stream, codec),
            next_request_id: 1,
        }
    }

    fn next_id(&mut self) -> i32 {
        let id = self.next_request_id;
        self.next_request_id = self.next_request_id.wrapping_add(1);
        id
    }

    /// Write one frame
    pub async fn send(&mut self, frame: Frame) -> Result<()> {
        self.framed.send(frame).await
    }

    /// Read the next frame; a closed stream is [`ProtocolError::ConnectionClosed`].
    pub async fn recv(&mut self) -> Result<Frame> {
        match self.framed.next().await {
            Some(frame) => frame,
            None => Err(ProtocolError::ConnectionClosed),
        }
    }

    async fn recv_reply(&mut self, request_id: i32) -> Result<Frame> {
        let frame = self.recv().await?;
        if frame.header.response_to != request_id {
            return Err(ProtocolError::Malformed(format!(
                "reply answers request {} but {request_id} was sent",
                frame.header.response_to
            )));
        }
        Ok(frame)
    }

    /// Run a command over OP_MSG against `database`.
    pub async fn run_command(&mut self, database: &str, command: Document) -> Result<Document> {
        self.run_command_with_sequences(database, command, &[]).await
    }

    /// Run a command over OP_MSG with extra kind-1 document sequences.
    pub async fn run_command_with_sequences(
        &mut self,
        database: &str,
        mut command: Document,
        sequences: &[DocumentSequence],
    ) -> Result<Document> {
        command.insert(DATABASE_KEY, database);
        let id = self.next_id();
        self.send(op_msg::encode_request(id, 0, &command, sequences)?)
            .await?;

        let reply = self.recv_reply(id).await?;
        if reply.header.opcode != OpCode::Msg.as_i32() {
            return Err(ProtocolError::UnsupportedOpcode(reply.header.opcode));
        }
        let decoded = op_msg::decode(reply.header.request_id, &reply.body)?;
        debug!(request_id = id, "Command answered");
        Ok(decoded.query)
    }

    /// Send an OP_MSG command with `moreToCome` set. The server sends nothing back.
    pub async fn send_unacknowledged(&mut self, database: &str, mut command: Document) -> Result<()> {
        command.insert(DATABASE_KEY, database);
        let id = self.next_id();
        self.send(op_msg::encode_request(id, FLAG_MORE_TO_COME, &command, &[])?)
            .await
    }

    /// Run a command over OP_QUERY against `database.$cmd`.
    pub async fn legacy_command(&mut self, database: &str, command: Document) -> Result<Document> {
        let namespace = format!("{database}{COMMAND_SUFFIX}");
        let id = self.next_id();
        self.send(op_query::encode_request(id, &namespace, 0, -1, &command)?)
            .await?;

        let reply = self.recv_reply(id).await?;
        if reply.header.opcode != OpCode::Reply.as_i32() {
            return Err(ProtocolError::UnsupportedOpcode(reply.header.opcode));
        }
        op_query::decode_reply(&reply.body)?
            .documents
            .into_iter()
            .next()
            .ok_or_else(|| ProtocolError::malformed(ERR_MISSING_DOCUMENT))
    }

    /// Send an OP_INSERT. The protocol defines no reply.
    pub async fn insert(&mut self, namespace: &str, documents: &[Document]) -> Result<()> {
        let id = self.next_id();
        self.send(op_insert::encode_request(id, 0, namespace, documents)?)
            .await
    }
}
