//! Length-prefixed frames, so a request/response exchange can travel over a
//! plain byte stream.

use anyhow::{bail, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Upper bound on a single frame; a find-node reply of 20 contacts fits in a
/// few kilobytes, so anything near this is garbage or abuse.
const MAX_FRAME_LEN: usize = 1024 * 1024;

pub async fn write_frame<W: AsyncWrite + Unpin>(stream: &mut W, data: &[u8]) -> Result<()> {
    if data.len() > MAX_FRAME_LEN {
        bail!("frame of {} bytes exceeds limit", data.len());
    }
    stream.write_u32_le(data.len() as u32).await?;
    stream.write_all(data).await?;
    stream.flush().await?;
    Ok(())
}

/// Read one frame; `None` means the peer closed the stream cleanly before a
/// length prefix arrived.
pub async fn read_frame<R: AsyncRead + Unpin>(stream: &mut R) -> Result<Option<Vec<u8>>> {
    let len = match stream.read_u32_le().await {
        Ok(v) => v as usize,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };
    if len > MAX_FRAME_LEN {
        bail!("frame of {len} bytes exceeds limit");
    }

    let mut buf = vec![0u8; len];
    stream.read_exact(&mut buf).await?;
    Ok(Some(buf))
}
