use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::config::MAX_MESSAGE_SIZE;
use crate::core::frame::{Frame, FrameHeader, HEADER_LEN};
use crate::error::{ProtocolError, Result};

/// Tokio codec for length-prefixed wire frames.
///
/// The header is inspected as soon as 16 bytes are buffered so an oversized
/// length is rejected before the body is waited for.
#[derive(Debug, Clone, Copy)]
pub struct WireCodec {
    max_message_size: usize,
}

impl Default for WireCodec {
    fn default() -> Self {
        Self::new(MAX_MESSAGE_SIZE)
    }
}

impl WireCodec {
    pub fn new(max_message_size: usize) -> Self {
        Self { max_message_size }
    }

    pub fn max_message_size(&self) -> usize {
        self.max_message_size
    }
}

impl Decoder for WireCodec {
    type Item = Frame;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        if src.len() < HEADER_LEN {
            return Ok(None);
        }

        let header = FrameHeader::from_slice(src)?;
        let body_len = header.body_len(self.max_message_size)?;
        let total = HEADER_LEN + body_len;

        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        let mut frame_bytes = src.split_to(total);
        let body = frame_bytes.split_off(HEADER_LEN).freeze();
        Ok(Some(Frame { header, body }))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if src.is_empty() => Ok(None),
            // stream ended inside a frame
            None => Err(ProtocolError::ConnectionClosed),
        }
    }
}

impl Encoder<Frame> for WireCodec {
    type Error = ProtocolError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<()> {
        if frame.len() > self.max_message_size {
            return Err(ProtocolError::OversizedFrame(frame.len()));
        }
        frame.write_to(dst);
        Ok(())
    }
}
