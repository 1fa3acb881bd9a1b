//! # OP_INSERT
//!
//! Legacy insert, still sent by clients that never moved to OP_MSG. The
//! protocol defines no reply for it.
//!
//! ```text
//! [flags: u32] [namespace: cstring] [document]+
//! ```

use bson::Document;
use bytes::{BufMut, BytesMut};

use crate::core::document;
use crate::core::frame::{self, Frame};
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::opcode::OpCode;
use crate::protocol::request::{database_of, DecodedRequest, RequestMeta};

/// Flag bit: keep inserting after a failed document
pub const FLAG_CONTINUE_ON_ERROR: u32 = 1 << 0;

/// Decode an OP_INSERT body. The first document is the query; the rest of a
/// batch rides along in [`RequestMeta::extra_documents`].
pub fn decode(request_id: i32, body: &[u8]) -> Result<DecodedRequest> {
    let (flags, pos) = frame::read_u32(body, 0)?;
    let (namespace, pos) = frame::read_cstring(body, pos)?;

    let (docs, largest_document) = document::decode_all_sized(&body[pos..])?;
    let mut docs = docs.into_iter();
    let query = docs
        .next()
        .ok_or_else(|| ProtocolError::malformed(constants::ERR_MISSING_DOCUMENT))?;

    let meta = RequestMeta {
        request_id,
        flags,
        database: database_of(&namespace),
        namespace: Some(namespace),
        extra_documents: docs.collect(),
        largest_document,
        ..RequestMeta::default()
    };

    Ok(DecodedRequest {
        opcode: OpCode::Insert,
        query,
        meta,
    })
}

/// Encode an OP_INSERT request frame.
pub fn encode_request(
    request_id: i32,
    flags: u32,
    namespace: &str,
    documents: &[Document],
) -> Result<Frame> {
    let mut body = BytesMut::new();
    body.put_u32_le(flags);
    frame::put_cstring(&mut body, namespace);
    let mut docs = Vec::new();
    for doc in documents {
        document::encode_into(doc, &mut docs)?;
    }
    body.extend_from_slice(&docs);
    Frame::new(request_id, 0, OpCode::Insert.as_i32(), body.freeze())
}
