//! Length-framed message codec: a fixed 16-byte header followed by a
//! variable-length JSON payload.
//!
//! Mirrors the teacher's `send_data`/`receive_data` helpers, generalized from
//! a bare length prefix to the full `MessageHeader` this protocol needs.

use crate::identifier::MessageIdentifier;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Wire size of [`MessageHeader`]: identifier (4) + size (4) + sequence id (8).
pub const HEADER_SIZE: u32 = 16;

#[derive(Debug, thiserror::Error)]
pub enum FramingError {
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
    #[error("frame size {size} is smaller than the header size {HEADER_SIZE}")]
    UndersizedFrame { size: u32 },
    #[error("frame size {size} exceeds the configured ceiling of {max}")]
    OversizedFrame { size: u32, max: u32 },
    #[error("stream closed mid-frame")]
    ShortRead,
}

/// Fixed 16-byte header, little-endian on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub identifier: MessageIdentifier,
    /// Total frame size, including this header.
    pub size: u32,
    pub sequence_id: u64,
}

impl MessageHeader {
    pub fn payload_len(&self) -> u32 {
        self.size - HEADER_SIZE
    }

    fn to_bytes(self) -> [u8; HEADER_SIZE as usize] {
        let mut buf = [0u8; HEADER_SIZE as usize];
        buf[0..4].copy_from_slice(&self.identifier.raw().to_le_bytes());
        buf[4..8].copy_from_slice(&self.size.to_le_bytes());
        buf[8..16].copy_from_slice(&self.sequence_id.to_le_bytes());
        buf
    }

    fn from_bytes(buf: [u8; HEADER_SIZE as usize]) -> Self {
        let identifier = u32::from_le_bytes(buf[0..4].try_into().unwrap());
        let size = u32::from_le_bytes(buf[4..8].try_into().unwrap());
        let sequence_id = u64::from_le_bytes(buf[8..16].try_into().unwrap());
        Self {
            identifier: MessageIdentifier(identifier),
            size,
            sequence_id,
        }
    }
}

/// Reads exactly one frame from `stream`, rejecting frames that don't fit
/// within `[HEADER_SIZE, max_frame]`.
pub async fn read_frame<S>(
    stream: &mut S,
    max_frame: u32,
) -> Result<(MessageHeader, Vec<u8>), FramingError>
where
    S: AsyncRead + Unpin,
{
    let mut header_buf = [0u8; HEADER_SIZE as usize];
    match stream.read_exact(&mut header_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(FramingError::ShortRead);
        }
        Err(e) => return Err(FramingError::Io(e)),
    }
    let header = MessageHeader::from_bytes(header_buf);

    if header.size < HEADER_SIZE {
        return Err(FramingError::UndersizedFrame { size: header.size });
    }
    if header.size > max_frame {
        return Err(FramingError::OversizedFrame {
            size: header.size,
            max: max_frame,
        });
    }

    let mut payload = vec![0u8; header.payload_len() as usize];
    if !payload.is_empty() {
        stream
            .read_exact(&mut payload)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::UnexpectedEof => FramingError::ShortRead,
                _ => FramingError::Io(e),
            })?;
    }

    Ok((header, payload))
}

/// Writes a single frame. Callers are responsible for serialising writes to
/// the same stream (e.g. via a mutex or a single writer task).
pub async fn write_frame<S>(
    stream: &mut S,
    identifier: MessageIdentifier,
    sequence_id: u64,
    payload: &[u8],
) -> Result<(), FramingError>
where
    S: AsyncWrite + Unpin,
{
    let size = HEADER_SIZE + payload.len() as u32;
    let header = MessageHeader {
        identifier,
        size,
        sequence_id,
    };
    stream.write_all(&header.to_bytes()).await?;
    stream.write_all(payload).await?;
    stream.flush().await?;
    Ok(())
}
