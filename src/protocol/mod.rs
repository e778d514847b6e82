//! Frame encoding for every socket in the system
//!
//! All peers speak length-prefixed frames: an optional 4-byte magic
//! (`ULA0`), a 4-byte big-endian payload length, then the UTF-8 JSON body.
//! Responses on the client↔node link drop the magic; compositor links use
//! their own conventions built from the same primitives.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Result, UlaError};

/// `ULA0` ascii code.
pub const MAGIC_CODE: [u8; 4] = [0x55, 0x4C, 0x41, 0x30];

/// Upper bound on a frame body; anything larger is a protocol error.
pub const MAX_FRAME_LEN: u32 = 64 * 1024 * 1024;

/// Write the 4-byte magic.
pub async fn write_magic<W: AsyncWrite + Unpin>(writer: &mut W) -> Result<()> {
    writer.write_all(&MAGIC_CODE).await?;
    Ok(())
}

/// Read and verify the 4-byte magic.
pub async fn read_magic<R: AsyncRead + Unpin>(reader: &mut R) -> Result<()> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf).await?;
    if buf != MAGIC_CODE {
        return Err(UlaError::protocol(format!("magic mismatch: {:02x?}", buf)));
    }
    Ok(())
}

/// Write a length-prefixed frame.
pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, payload: &[u8]) -> Result<()> {
    let len = payload.len() as u32;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(payload).await?;
    Ok(())
}

/// Read a length-prefixed frame body.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Vec<u8>> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await?;
    let len = u32::from_be_bytes(len_buf);

    if len == 0 {
        return Err(UlaError::protocol("zero-length frame"));
    }
    if len > MAX_FRAME_LEN {
        return Err(UlaError::protocol(format!("frame length {} exceeds limit", len)));
    }

    let mut body = vec![0u8; len as usize];
    reader.read_exact(&mut body).await?;
    Ok(body)
}

/// Read a 4-byte big-endian status word.
pub async fn read_status_word<R: AsyncRead + Unpin>(reader: &mut R) -> Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf).await?;
    Ok(u32::from_be_bytes(buf))
}
