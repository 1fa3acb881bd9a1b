//! # OP_QUERY and OP_REPLY
//!
//! Legacy query messages and the legacy reply that answers them. Every
//! historical shell and driver handshake starts here, even clients that switch
//! to OP_MSG afterwards.
//!
//! ## Request body
//! ```text
//! [flags: u32] [namespace: cstring] [numToSkip: i32] [numToReturn: i32] [query doc] [fields doc]?
//! ```
//!
//! ## Reply body
//! ```text
//! [responseFlags: i32] [cursorId: i64] [startingFrom: i32] [numberReturned: i32] [docs...]
//! ```

use bson::Document;
use bytes::{BufMut, Bytes, BytesMut};

use crate::core::document;
use crate::core::frame::{self, Frame};
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::opcode::OpCode;
use crate::protocol::request::{database_of, DecodedRequest, RequestMeta};

/// Namespace suffix that marks a command rather than a collection query
pub const COMMAND_SUFFIX: &str = ".$cmd";

/// Size of the fixed reply prefix before the documents
pub const REPLY_PREFIX_LEN: usize = 20;

/// Decode an OP_QUERY body.
///
/// The first document is the query. A field selector that may follow it is
/// left to the backend and not decoded here.
pub fn decode(request_id: i32, body: &[u8]) -> Result<DecodedRequest> {
    let (flags, pos) = frame::read_u32(body, 0)?;
    let (namespace, pos) = frame::read_cstring(body, pos)?;
    let (num_to_skip, pos) = frame::read_i32(body, pos)?;
    let (num_to_return, pos) = frame::read_i32(body, pos)?;

    let rest = &body[pos..];
    let query_len = document::document_len(rest)
        .map_err(|_| ProtocolError::malformed(constants::ERR_MISSING_DOCUMENT))?;
    let query = document::decode(&rest[..query_len])?;

    let is_command = namespace.ends_with(COMMAND_SUFFIX);
    let meta = RequestMeta {
        request_id,
        flags,
        database: database_of(&namespace),
        namespace: Some(namespace),
        num_to_skip: Some(num_to_skip),
        num_to_return: Some(num_to_return),
        is_command,
        largest_document: query_len,
        ..RequestMeta::default()
    };

    Ok(DecodedRequest {
        opcode: OpCode::Query,
        query,
        meta,
    })
}

/// Encode an OP_QUERY request frame.
pub fn encode_request(
    request_id: i32,
    namespace: &str,
    num_to_skip: i32,
    num_to_return: i32,
    query: &Document,
) -> Result<Frame> {
    let doc = document::encode(query)?;
    let mut body = BytesMut::with_capacity(4 + namespace.len() + 1 + 8 + doc.len());
    body.put_u32_le(0);
    frame::put_cstring(&mut body, namespace);
    body.put_i32_le(num_to_skip);
    body.put_i32_le(num_to_return);
    body.extend_from_slice(&doc);
    Frame::new(request_id, 0, OpCode::Query.as_i32(), body.freeze())
}

/// Encode an OP_REPLY frame answering `response_to`.
pub fn encode_reply(documents: &[Document], response_to: i32, reply_id: i32) -> Result<Bytes> {
    let mut docs = Vec::new();
    for doc in documents {
        document::encode_into(doc, &mut docs)?;
    }
    let number_returned = i32::try_from(documents.len())
        .map_err(|_| ProtocolError::OversizedFrame(docs.len()))?;

    let mut body = BytesMut::with_capacity(REPLY_PREFIX_LEN + docs.len());
    body.put_i32_le(0); // responseFlags
    body.put_i64_le(0); // cursorId
    body.put_i32_le(0); // startingFrom
    body.put_i32_le(number_returned);
    body.extend_from_slice(&docs);

    Ok(Frame::new(reply_id, response_to, OpCode::Reply.as_i32(), body.freeze())?.to_bytes())
}

/// Decoded OP_REPLY body
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyReply {
    pub response_flags: i32,
    pub cursor_id: i64,
    pub starting_from: i32,
    pub documents: Vec<Document>,
}

/// Decode an OP_REPLY body, checking `numberReturned` against the documents present.
pub fn decode_reply(body: &[u8]) -> Result<LegacyReply> {
    let (response_flags, pos) = frame::read_i32(body, 0)?;
    let (cursor_id, pos) = frame::read_i64(body, pos)?;
    let (starting_from, pos) = frame::read_i32(body, pos)?;
    let (number_returned, pos) = frame::read_i32(body, pos)?;
    let documents = document::decode_all(&body[pos..])?;
    if usize::try_from(number_returned).ok() != Some(documents.len()) {
        return Err(ProtocolError::Malformed(format!(
            "OP_REPLY announces {number_returned} documents but carries {}",
            documents.len()
        )));
    }
    Ok(LegacyReply {
        response_flags,
        cursor_id,
        starting_from,
        documents,
    })
}
