use crate::error::ProtocolError;

/// Historical and current message opcodes.
///
/// Only [`OpCode::Query`], [`OpCode::Msg`] and [`OpCode::Insert`] are accepted
/// from clients; [`OpCode::Reply`] is produced by the server. The rest are
/// known by name so logs can say what a client sent before it is refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum OpCode {
    Reply = 1,
    Update = 2001,
    Insert = 2002,
    Query = 2004,
    GetMore = 2005,
    Delete = 2006,
    KillCursors = 2007,
    Msg = 2013,
}

impl OpCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn name(self) -> &'static str {
        match self {
            OpCode::Reply => "OP_REPLY",
            OpCode::Update => "OP_UPDATE",
            OpCode::Insert => "OP_INSERT",
            OpCode::Query => "OP_QUERY",
            OpCode::GetMore => "OP_GET_MORE",
            OpCode::Delete => "OP_DELETE",
            OpCode::KillCursors => "OP_KILL_CURSORS",
            OpCode::Msg => "OP_MSG",
        }
    }
}

impl TryFrom<i32> for OpCode {
    type Error = ProtocolError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Ok(match value {
            1 => OpCode::Reply,
            2001 => OpCode::Update,
            2002 => OpCode::Insert,
            2004 => OpCode::Query,
            2005 => OpCode::GetMore,
            2006 => OpCode::Delete,
            2007 => OpCode::KillCursors,
            2013 => OpCode::Msg,
            other => return Err(ProtocolError::UnsupportedOpcode(other)),
        })
    }
}

impl From<OpCode> for i32 {
    fn from(op: OpCode) -> Self {
        op.as_i32()
    }
}
