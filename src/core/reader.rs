//! Exact-length reads from an async byte stream.
//!
//! A stream that ends before the requested number of bytes arrived is reported
//! as [`ProtocolError::ConnectionClosed`], never as a short buffer.

use bytes::BytesMut;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::core::frame::{FrameHeader, HEADER_LEN};
use crate::error::{ProtocolError, Result};

/// Read exactly `n` bytes.
pub async fn read_exact<R>(reader: &mut R, n: usize) -> Result<BytesMut>
where
    R: AsyncRead + Unpin,
{
    let mut buf = BytesMut::zeroed(n);
    reader
        .read_exact(&mut buf[..])
        .await
        .map_err(map_read_error)?;
    Ok(buf)
}

/// Read and decode the 16-byte message header.
pub async fn read_header<R>(reader: &mut R) -> Result<FrameHeader>
where
    R: AsyncRead + Unpin,
{
    let mut raw = [0u8; HEADER_LEN];
    reader
        .read_exact(&mut raw)
        .await
        .map_err(map_read_error)?;
    Ok(FrameHeader::parse(&raw))
}

/// Classify I/O failures that mean the peer is gone.
pub fn map_read_error(e: io::Error) -> ProtocolError {
    match e.kind() {
        io::ErrorKind::UnexpectedEof
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe => ProtocolError::ConnectionClosed,
        _ => ProtocolError::Io(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn short_stream_is_connection_closed() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_all(&[1u8; 10]).await.unwrap();
        drop(client);

        let result = read_header(&mut server).await;
        assert!(matches!(result, Err(ProtocolError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn reads_across_partial_writes() {
        let (mut client, mut server) = tokio::io::duplex(64);
        let writer = tokio::spawn(async move {
            client.write_all(&[1, 2, 3]).await.unwrap();
            tokio::task::yield_now().await;
            client.write_all(&[4, 5]).await.unwrap();
            client
        });

        let buf = read_exact(&mut server, 5).await.unwrap();
        assert_eq!(&buf[..], &[1, 2, 3, 4, 5]);
        drop(writer.await.unwrap());
    }

    #[tokio::test]
    async fn zero_length_read_needs_no_bytes() {
        let (client, mut server) = tokio::io::duplex(8);
        drop(client);
        let buf = read_exact(&mut server, 0).await.unwrap();
        assert!(buf.is_empty());
    }
}
