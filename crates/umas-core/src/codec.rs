//! Length-prefixed framing for task and result payloads.
//!
//! ```text
//! [u32 BE: len][JSON bytes of len]
//! ```
//!
//! Frames carry no type tag; both ends agree on the payload shape out of
//! band. A zero-length payload is a valid frame and decodes as JSON `null`.

use crate::config::FrameConfig;
use crate::error::{Result, UmasError};
use serde::{de::DeserializeOwned, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace};

/// How a payload cut short by the peer is treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Framing {
    /// Fail with [`UmasError::TruncatedFrame`].
    #[default]
    Strict,
    /// Hand back whatever arrived as if it were the whole payload. Matches
    /// older clients; the decode step usually fails on the partial bytes.
    /// A body with no bytes at all is still [`UmasError::TruncatedFrame`].
    Lenient,
}

impl Framing {
    pub fn from_strict(strict: bool) -> Self {
        if strict {
            Framing::Strict
        } else {
            Framing::Lenient
        }
    }

    pub fn is_strict(self) -> bool {
        self == Framing::Strict
    }
}

/// Serialize a payload into frame body bytes.
pub fn encode<T: Serialize + ?Sized>(payload: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(payload).map_err(UmasError::encode)
}

/// Deserialize frame body bytes. An empty body decodes as `null`.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let bytes = if bytes.is_empty() { b"null".as_slice() } else { bytes };
    serde_json::from_slice(bytes).map_err(UmasError::decode)
}

/// Write one length-prefixed frame and flush it.
pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, payload: &[u8]) -> Result<()> {
    if payload.len() > FrameConfig::MAX_FRAME_LEN {
        return Err(UmasError::FrameTooLarge {
            len: payload.len(),
            max: FrameConfig::MAX_FRAME_LEN,
        });
    }

    let len = payload.len() as u32;
    trace!(len, "Writing frame");
    writer
        .write_all(&len.to_be_bytes())
        .await
        .map_err(|e| UmasError::connection("write frame header", e))?;
    writer
        .write_all(payload)
        .await
        .map_err(|e| UmasError::connection("write frame payload", e))?;
    writer
        .flush()
        .await
        .map_err(|e| UmasError::connection("flush frame", e))?;
    Ok(())
}

/// Read one length-prefixed frame.
///
/// Returns `None` when the peer closed before sending any header byte.
pub async fn read_frame<R: AsyncRead + Unpin>(
    reader: &mut R,
    framing: Framing,
) -> Result<Option<Vec<u8>>> {
    let mut header = [0u8; FrameConfig::HEADER_LEN];
    let received = read_full(reader, &mut header).await?;
    if received == 0 {
        return Ok(None);
    }
    if received < header.len() {
        return Err(UmasError::TruncatedFrame {
            expected: header.len(),
            received,
        });
    }

    let len = u32::from_be_bytes(header) as usize;
    if len > FrameConfig::MAX_FRAME_LEN {
        return Err(UmasError::FrameTooLarge {
            len,
            max: FrameConfig::MAX_FRAME_LEN,
        });
    }

    let mut payload = vec![0u8; len];
    let received = read_full(reader, &mut payload).await?;
    if received < len {
        // An empty body must stay distinguishable from a real zero-length frame.
        if framing.is_strict() || received == 0 {
            return Err(UmasError::TruncatedFrame {
                expected: len,
                received,
            });
        }
        debug!(
            expected = len,
            received, "Peer closed mid-frame, keeping partial payload"
        );
        payload.truncate(received);
    }

    trace!(len = payload.len(), "Read frame");
    Ok(Some(payload))
}

/// Encode `payload` and write it as one frame.
pub async fn send<W, T>(writer: &mut W, payload: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize + ?Sized,
{
    let bytes = encode(payload)?;
    write_frame(writer, &bytes).await
}

/// Read one frame and decode it. `None` means end-of-stream.
pub async fn receive<R, T>(reader: &mut R, framing: Framing) -> Result<Option<T>>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    match read_frame(reader, framing).await? {
        Some(bytes) => decode(&bytes).map(Some),
        None => Ok(None),
    }
}

/// Fill `buf` until it is full or the reader hits end-of-stream.
/// Returns the number of bytes read.
async fn read_full<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader
            .read(&mut buf[filled..])
            .await
            .map_err(|e| UmasError::connection("read frame", e))?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}
