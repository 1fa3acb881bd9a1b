//! # Frame
//!
//! The 16-byte message header and the primitive field readers every opcode
//! body is built from.
//!
//! ## Wire Format
//! ```text
//! [length: i32 LE] [requestId: i32 LE] [responseTo: i32 LE] [opCode: i32 LE] [body: length - 16]
//! ```
//!
//! `length` counts the header itself, so an empty body still has `length == 16`.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{constants, ProtocolError, Result};

/// Size of the fixed message header in bytes
pub const HEADER_LEN: usize = 16;

/// Decoded message header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Total message length including the header
    pub length: i32,
    pub request_id: i32,
    pub response_to: i32,
    pub opcode: i32,
}

impl FrameHeader {
    /// Decode the four little-endian fields of a header.
    pub fn parse(buf: &[u8; HEADER_LEN]) -> Self {
        Self {
            length: i32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
            request_id: i32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]),
            response_to: i32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]),
            opcode: i32::from_le_bytes([buf[12], buf[13], buf[14], buf[15]]),
        }
    }

    /// Decode a header from the front of `buf`.
    pub fn from_slice(buf: &[u8]) -> Result<Self> {
        let head: &[u8; HEADER_LEN] = buf
            .get(..HEADER_LEN)
            .and_then(|s| s.try_into().ok())
            .ok_or(ProtocolError::InvalidHeader)?;
        Ok(Self::parse(head))
    }

    /// Validate the length field and return the body size it announces.
    ///
    /// A length below the header size is malformed; a length above
    /// `max_message_size` is refused before anything is allocated for it.
    pub fn body_len(&self, max_message_size: usize) -> Result<usize> {
        let length = usize::try_from(self.length).map_err(|_| ProtocolError::InvalidHeader)?;
        if length < HEADER_LEN {
            return Err(ProtocolError::InvalidHeader);
        }
        if length > max_message_size {
            return Err(ProtocolError::OversizedFrame(length));
        }
        Ok(length - HEADER_LEN)
    }

    pub fn write_to(&self, dst: &mut BytesMut) {
        dst.put_i32_le(self.length);
        dst.put_i32_le(self.request_id);
        dst.put_i32_le(self.response_to);
        dst.put_i32_le(self.opcode);
    }
}

/// A complete message: header plus opcode-specific body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub header: FrameHeader,
    pub body: Bytes,
}

impl Frame {
    /// Build a frame whose length field is derived from the body.
    pub fn new(request_id: i32, response_to: i32, opcode: i32, body: impl Into<Bytes>) -> Result<Self> {
        let body = body.into();
        let length = i32::try_from(HEADER_LEN + body.len())
            .map_err(|_| ProtocolError::OversizedFrame(HEADER_LEN + body.len()))?;
        Ok(Self {
            header: FrameHeader {
                length,
                request_id,
                response_to,
                opcode,
            },
            body,
        })
    }

    /// Total encoded size
    pub fn len(&self) -> usize {
        HEADER_LEN + self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    pub fn write_to(&self, dst: &mut BytesMut) {
        dst.reserve(self.len());
        self.header.write_to(dst);
        dst.extend_from_slice(&self.body);
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.len());
        self.write_to(&mut buf);
        buf.freeze()
    }

    /// Parse one complete frame from `buf`, which must hold exactly one message.
    pub fn from_bytes(buf: &[u8], max_message_size: usize) -> Result<Self> {
        let header = FrameHeader::from_slice(buf)?;
        let body_len = header.body_len(max_message_size)?;
        if buf.len() != HEADER_LEN + body_len {
            return Err(ProtocolError::InvalidHeader);
        }
        Ok(Self {
            header,
            body: Bytes::copy_from_slice(&buf[HEADER_LEN..]),
        })
    }
}

/// Read a little-endian `u32` at `offset`; returns the value and the next offset.
pub fn read_u32(buf: &[u8], offset: usize) -> Result<(u32, usize)> {
    let bytes = field::<4>(buf, offset)?;
    Ok((u32::from_le_bytes(bytes), offset + 4))
}

/// Read a little-endian `i32` at `offset`; returns the value and the next offset.
pub fn read_i32(buf: &[u8], offset: usize) -> Result<(i32, usize)> {
    let bytes = field::<4>(buf, offset)?;
    Ok((i32::from_le_bytes(bytes), offset + 4))
}

/// Read a little-endian `i64` at `offset`; returns the value and the next offset.
pub fn read_i64(buf: &[u8], offset: usize) -> Result<(i64, usize)> {
    let bytes = field::<8>(buf, offset)?;
    Ok((i64::from_le_bytes(bytes), offset + 8))
}

/// Read a single byte at `offset`.
pub fn read_u8(buf: &[u8], offset: usize) -> Result<(u8, usize)> {
    let byte = buf
        .get(offset)
        .copied()
        .ok_or_else(|| ProtocolError::malformed(constants::ERR_TRUNCATED_INT))?;
    Ok((byte, offset + 1))
}

/// Read a NUL-terminated UTF-8 string starting at `offset`.
///
/// Returns the string (without its terminator) and the offset just past the NUL.
pub fn read_cstring(buf: &[u8], offset: usize) -> Result<(String, usize)> {
    let tail = buf
        .get(offset..)
        .ok_or_else(|| ProtocolError::malformed(constants::ERR_MISSING_NUL))?;
    let nul = tail
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| ProtocolError::malformed(constants::ERR_MISSING_NUL))?;
    let s = std::str::from_utf8(&tail[..nul])
        .map_err(|_| ProtocolError::malformed(constants::ERR_INVALID_UTF8))?;
    Ok((s.to_owned(), offset + nul + 1))
}

/// Append `s` followed by a NUL terminator.
pub fn put_cstring(dst: &mut BytesMut, s: &str) {
    dst.extend_from_slice(s.as_bytes());
    dst.put_u8(0);
}

#[inline]
fn field<const N: usize>(buf: &[u8], offset: usize) -> Result<[u8; N]> {
    offset
        .checked_add(N)
        .and_then(|end| buf.get(offset..end))
        .and_then(|s| s.try_into().ok())
        .ok_or_else(|| ProtocolError::malformed(constants::ERR_TRUNCATED_INT))
}
