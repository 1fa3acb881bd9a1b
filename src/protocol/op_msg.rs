//! # OP_MSG
//!
//! The sectioned message format used by every modern client.
//!
//! ## Body
//! ```text
//! [flagBits: u32] [section]* [checksum: u32]?
//!
//! section kind 0: [0u8] [document]
//! section kind 1: [1u8] [size: i32] [identifier: cstring] [document]*
//! ```
//!
//! `size` of a kind-1 section counts itself, the identifier and its NUL, and the
//! documents, but not the kind byte.

use bson::{Bson, Document};
use bytes::{BufMut, Bytes, BytesMut};

use crate::core::document;
use crate::core::frame::{self, Frame};
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::opcode::OpCode;
use crate::protocol::request::{DecodedRequest, RequestMeta};

/// Flag bit: a CRC-32C checksum trails the sections
pub const FLAG_CHECKSUM_PRESENT: u32 = 1 << 0;
/// Flag bit: the sender will not wait for a reply
pub const FLAG_MORE_TO_COME: u32 = 1 << 1;
/// Flag bit: the client accepts an exhaust stream of replies
pub const FLAG_EXHAUST_ALLOWED: u32 = 1 << 16;

/// Single body document merged into the query
pub const SECTION_BODY: u8 = 0;
/// Identified sequence of documents
pub const SECTION_DOCUMENT_SEQUENCE: u8 = 1;

/// Reserved key carrying the target database
pub const DATABASE_KEY: &str = "$db";

const CHECKSUM_LEN: usize = 4;

/// Decode an OP_MSG body.
///
/// Body sections are merged into the top level of the query in wire order;
/// each document sequence is attached under its identifier as an array.
pub fn decode(request_id: i32, body: &[u8]) -> Result<DecodedRequest> {
    let (flags, mut pos) = frame::read_u32(body, 0)?;

    let checksum_present = flags & FLAG_CHECKSUM_PRESENT != 0;
    let msg_end = if checksum_present {
        body.len()
            .checked_sub(CHECKSUM_LEN)
            .filter(|end| *end >= pos)
            .ok_or_else(|| ProtocolError::malformed(constants::ERR_CHECKSUM_SIZE))?
    } else {
        body.len()
    };

    let mut query = Document::new();
    let mut sequence_ids = Vec::new();
    let mut largest_document = 0;

    while pos < msg_end {
        let (kind, next) = frame::read_u8(body, pos)?;
        pos = next;
        let sections = &body[..msg_end];
        match kind {
            SECTION_BODY => {
                let len = document::document_len(&sections[pos..])
                    .map_err(|_| ProtocolError::malformed(constants::ERR_SECTION_OVERRUN))?;
                for (key, value) in document::decode(&sections[pos..pos + len])? {
                    query.insert(key, value);
                }
                largest_document = largest_document.max(len);
                pos += len;
            }
            SECTION_DOCUMENT_SEQUENCE => {
                let (size, after_size) = frame::read_i32(sections, pos)
                    .map_err(|_| ProtocolError::malformed(constants::ERR_SECTION_OVERRUN))?;
                let section_end = usize::try_from(size)
                    .ok()
                    .filter(|size| *size >= 5)
                    .map(|size| pos + size)
                    .filter(|end| *end <= msg_end)
                    .ok_or_else(|| ProtocolError::malformed(constants::ERR_SECTION_OVERRUN))?;
                let (identifier, docs_start) =
                    frame::read_cstring(&sections[..section_end], after_size)?;
                let (docs, largest) =
                    document::decode_all_sized(&sections[docs_start..section_end])?;
                largest_document = largest_document.max(largest);
                query.insert(
                    identifier.clone(),
                    Bson::Array(docs.into_iter().map(Bson::Document).collect()),
                );
                sequence_ids.push(identifier);
                pos = section_end;
            }
            other => {
                return Err(ProtocolError::Malformed(format!(
                    "{}: {other}",
                    constants::ERR_UNKNOWN_SECTION
                )))
            }
        }
    }

    let remaining = body.len() - pos;
    let checksum = if checksum_present {
        if remaining != CHECKSUM_LEN {
            return Err(ProtocolError::malformed(constants::ERR_CHECKSUM_SIZE));
        }
        Some(frame::read_u32(body, pos)?.0)
    } else {
        if remaining != 0 {
            return Err(ProtocolError::malformed(constants::ERR_TRAILING_BYTES));
        }
        None
    };

    let database = query.get_str(DATABASE_KEY).ok().map(str::to_owned);
    let meta = RequestMeta {
        request_id,
        flags,
        database,
        sequence_ids,
        checksum,
        more_to_come: flags & FLAG_MORE_TO_COME != 0,
        largest_document,
        ..RequestMeta::default()
    };

    Ok(DecodedRequest {
        opcode: OpCode::Msg,
        query,
        meta,
    })
}

/// A kind-1 section to include in an outgoing request
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSequence {
    pub identifier: String,
    pub documents: Vec<Document>,
}

/// Encode an OP_MSG request frame with one body section and any number of
/// document sequences. No checksum is appended.
pub fn encode_request(
    request_id: i32,
    flags: u32,
    body_doc: &Document,
    sequences: &[DocumentSequence],
) -> Result<Frame> {
    let mut body = BytesMut::new();
    body.put_u32_le(flags & !FLAG_CHECKSUM_PRESENT);
    body.put_u8(SECTION_BODY);
    body.extend_from_slice(&document::encode(body_doc)?);

    for seq in sequences {
        let mut docs = Vec::new();
        for doc in &seq.documents {
            document::encode_into(doc, &mut docs)?;
        }
        let size = 4 + seq.identifier.len() + 1 + docs.len();
        let size = i32::try_from(size).map_err(|_| ProtocolError::OversizedFrame(size))?;
        body.put_u8(SECTION_DOCUMENT_SEQUENCE);
        body.put_i32_le(size);
        frame::put_cstring(&mut body, &seq.identifier);
        body.extend_from_slice(&docs);
    }

    Frame::new(request_id, 0, OpCode::Msg.as_i32(), body.freeze())
}

/// Encode the OP_MSG reply carrying exactly one result document.
pub fn encode_reply(result: &Document, response_to: i32, reply_id: i32) -> Result<Bytes> {
    let doc = document::encode(result)?;
    let mut body = BytesMut::with_capacity(5 + doc.len());
    body.put_u32_le(0); // flagBits
    body.put_u8(SECTION_BODY);
    body.extend_from_slice(&doc);

    Ok(Frame::new(reply_id, response_to, OpCode::Msg.as_i32(), body.freeze())?.to_bytes())
}
