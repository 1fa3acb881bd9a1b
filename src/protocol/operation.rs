use bson::Document;
use bytes::Bytes;

use crate::error::{ProtocolError, Result};
use crate::protocol::opcode::OpCode;
use crate::protocol::request::DecodedRequest;
use crate::protocol::{op_insert, op_msg, op_query};

/// Decode/encode strategy for one supported request opcode.
///
/// The set is closed: a frame either maps to one of these variants or is
/// refused with [`ProtocolError::UnsupportedOpcode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// OP_QUERY, answered with OP_REPLY
    Query,
    /// OP_MSG, answered with OP_MSG
    Msg,
    /// OP_INSERT, never answered
    Insert,
}

impl Operation {
    /// Select the strategy for a raw header opcode.
    pub fn from_opcode(opcode: i32) -> Result<Self> {
        match OpCode::try_from(opcode)? {
            OpCode::Query => Ok(Operation::Query),
            OpCode::Msg => Ok(Operation::Msg),
            OpCode::Insert => Ok(Operation::Insert),
            _ => Err(ProtocolError::UnsupportedOpcode(opcode)),
        }
    }

    pub fn opcode(self) -> OpCode {
        match self {
            Operation::Query => OpCode::Query,
            Operation::Msg => OpCode::Msg,
            Operation::Insert => OpCode::Insert,
        }
    }

    /// Whether the protocol defines a reply frame for this opcode.
    pub fn expects_reply(self) -> bool {
        !matches!(self, Operation::Insert)
    }

    pub fn decode(self, request_id: i32, body: &[u8]) -> Result<DecodedRequest> {
        match self {
            Operation::Query => op_query::decode(request_id, body),
            Operation::Msg => op_msg::decode(request_id, body),
            Operation::Insert => op_insert::decode(request_id, body),
        }
    }

    /// Encode the reply frame for `result`, or `None` if the opcode has no reply.
    pub fn encode_reply(
        self,
        result: &Document,
        response_to: i32,
        reply_id: i32,
    ) -> Result<Option<Bytes>> {
        match self {
            Operation::Query => {
                op_query::encode_reply(std::slice::from_ref(result), response_to, reply_id)
                    .map(Some)
            }
            Operation::Msg => op_msg::encode_reply(result, response_to, reply_id).map(Some),
            Operation::Insert => Ok(None),
        }
    }
}

impl DecodedRequest {
    /// Whether the client is waiting for a reply to this request.
    pub fn expects_reply(&self) -> bool {
        match Operation::from_opcode(self.opcode.as_i32()) {
            Ok(op) => op.expects_reply() && !self.meta.more_to_come,
            Err(_) => false,
        }
    }
}
