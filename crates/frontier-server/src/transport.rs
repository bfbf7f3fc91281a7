//! Length-prefixed framing over a byte stream.
//!
//! Each message travels as a big-endian `u32` length followed by that many
//! bytes (opcode plus body). The codec layer never sees the prefix.

use std::io::ErrorKind;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::ServerError;

/// Size of the length prefix.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Read one message.
///
/// Returns `Ok(None)` when the peer closes the stream between messages.
/// A close inside the length prefix or the body is an I/O error.
/// A prefix larger than `max_frame_bytes` fails before any body is read.
pub async fn read_message<R>(reader: &mut R, max_frame_bytes: usize) -> Result<Option<Bytes>, ServerError>
where
    R: AsyncRead + Unpin,
{
    let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
    prefix[0] = match reader.read_u8().await {
        Ok(byte) => byte,
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    // Only a close before the first prefix byte is clean.
    reader.read_exact(&mut prefix[1..]).await?;
    let size = u32::from_be_bytes(prefix) as usize;
    if size > max_frame_bytes {
        return Err(ServerError::FrameTooLarge { size, limit: max_frame_bytes });
    }

    let mut body = vec![0u8; size];
    reader.read_exact(&mut body).await?;
    Ok(Some(Bytes::from(body)))
}

/// Write one message and flush it.
pub async fn write_message<W>(writer: &mut W, message: &[u8]) -> Result<(), ServerError>
where
    W: AsyncWrite + Unpin,
{
    let size = u32::try_from(message.len())
        .map_err(|_| ServerError::FrameTooLarge { size: message.len(), limit: u32::MAX as usize })?;
    writer.write_u32(size).await?;
    writer.write_all(message).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn message_round_trip() {
        let (mut client, mut server) = tokio::io::duplex(64);
        write_message(&mut client, b"\x00\x11").await.unwrap();
        write_message(&mut client, b"").await.unwrap();
        drop(client);

        assert_eq!(read_message(&mut server, 16).await.unwrap().as_deref(), Some(&b"\x00\x11"[..]));
        assert_eq!(read_message(&mut server, 16).await.unwrap().as_deref(), Some(&b""[..]));
        assert!(read_message(&mut server, 16).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn oversized_prefix_rejected() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_all(&[0, 0, 1, 0]).await.unwrap();
        assert!(matches!(
            read_message(&mut server, 255).await,
            Err(ServerError::FrameTooLarge { size: 256, limit: 255 })
        ));
    }

    #[tokio::test]
    async fn truncated_body_is_an_error() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_all(&[0, 0, 0, 4, 0xaa]).await.unwrap();
        drop(client);
        assert!(matches!(read_message(&mut server, 16).await, Err(ServerError::Io(_))));
    }

    #[tokio::test]
    async fn truncated_prefix_is_an_error() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_all(&[0, 0]).await.unwrap();
        drop(client);
        let err = read_message(&mut server, 16).await.unwrap_err();
        assert!(matches!(err, ServerError::Io(ref e) if e.kind() == ErrorKind::UnexpectedEof));
    }
}
