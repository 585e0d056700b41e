use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Frame header: magic (4) + length (4) = 8 bytes.
pub const HEADER_SIZE: usize = 8;

/// Magic number agreed by both ends of the connection.
pub const MAGIC: u32 = 0x9E2B_83C1;

/// The codec itself imposes no bound beyond what the length field can express.
pub const UNBOUNDED_PAYLOAD: usize = u32::MAX as usize;

/// Encode a payload into the wire format, appending to `dst`.
///
/// Wire format:
/// ```text
/// ┌──────────────┬───────────┬─────────────────┐
/// │ Magic (4B)   │ Length    │ Payload         │
/// │ 0x9E2B83C1   │ (4B LE)   │ (Length bytes)  │
/// └──────────────┴───────────┴─────────────────┘
/// ```
pub fn encode_frame(payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    if payload.len() > UNBOUNDED_PAYLOAD {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: UNBOUNDED_PAYLOAD,
        });
    }
    dst.reserve(HEADER_SIZE + payload.len());
    dst.put_u32_le(MAGIC);
    dst.put_u32_le(payload.len() as u32);
    dst.put_slice(payload);
    Ok(())
}

/// Wrap a payload into a standalone frame.
pub fn wrap(payload: &[u8]) -> Result<Bytes> {
    let mut buf = BytesMut::with_capacity(HEADER_SIZE + payload.len());
    encode_frame(payload, &mut buf)?;
    Ok(buf.freeze())
}

/// Decode one frame from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer and returns the payload.
/// The magic is validated as soon as the header is available, so a
/// desynchronized stream is reported without waiting for a payload.
pub fn decode_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<Bytes>> {
    if src.len() < HEADER_SIZE {
        return Ok(None);
    }

    let magic = u32::from_le_bytes([src[0], src[1], src[2], src[3]]);
    if magic != MAGIC {
        return Err(FrameError::Desynchronized { found: magic });
    }

    let payload_len = u32::from_le_bytes([src[4], src[5], src[6], src[7]]) as usize;
    if payload_len > max_payload {
        return Err(FrameError::PayloadTooLarge {
            size: payload_len,
            max: max_payload,
        });
    }

    // Payload space is allocated as bytes arrive, not from the header.
    let total = HEADER_SIZE
        .checked_add(payload_len)
        .ok_or(FrameError::PayloadTooLarge {
            size: payload_len,
            max: max_payload,
        })?;
    if src.len() < total {
        return Ok(None);
    }

    src.advance(HEADER_SIZE);
    Ok(Some(src.split_to(payload_len).freeze()))
}

/// Configuration for frame readers and writers.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: unbounded (`u32::MAX`).
    pub max_payload_size: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: UNBOUNDED_PAYLOAD,
            read_timeout: None,
            write_timeout: None,
        }
    }
}
