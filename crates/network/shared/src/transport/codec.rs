use anyhow::{Context, Result, bail};
use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Default upper bound for a single frame; whole scene blobs travel as one frame.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 64 * 1024 * 1024;

/// Sends one length-prefixed frame.
///
/// Layout:
/// - 4 bytes: payload length (u32, big-endian)
/// - N bytes: payload
pub async fn send_frame_bytes<W>(writer: &mut W, payload: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let Ok(len) = u32::try_from(payload.len()) else {
        bail!(
            "frame too large for u32 length prefix: {} bytes",
            payload.len()
        );
    };

    writer
        .write_all(&len.to_be_bytes())
        .await
        .context("failed to write frame length")?;
    writer
        .write_all(payload)
        .await
        .context("failed to write frame payload")?;
    writer.flush().await.context("failed to flush writer")?;
    Ok(())
}

/// Receives one length-prefixed frame.
///
/// `max_frame_size` guards against oversized allocations; a longer frame is an
/// error and the stream should be dropped.
pub async fn recv_frame_bytes<R>(reader: &mut R, max_frame_size: usize) -> Result<Bytes>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    reader
        .read_exact(&mut len_buf)
        .await
        .context("failed to read frame length")?;

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > max_frame_size {
        bail!("incoming frame length {len} exceeds max_frame_size {max_frame_size}");
    }

    let mut buf = BytesMut::zeroed(len);
    reader
        .read_exact(&mut buf)
        .await
        .context("failed to read frame payload")?;
    Ok(buf.freeze())
}
