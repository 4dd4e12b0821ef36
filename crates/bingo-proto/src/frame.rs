//! Length-prefixed CBOR framing.
//!
//! Each frame is a 4-byte big-endian payload length followed by the
//! CBOR-encoded [`Message`]. Stream readers accumulate bytes in a
//! [`FrameBuffer`] and pull complete messages out of it.

use bytes::{Buf, BytesMut};

use crate::{Message, ProtoError};

/// Size of the length prefix in bytes.
pub const HEADER_SIZE: usize = 4;

/// Largest accepted payload (64 KiB).
pub const MAX_FRAME_SIZE: usize = 64 * 1024;

/// Append one framed message to `out`.
pub fn encode(message: &Message, out: &mut Vec<u8>) -> Result<(), ProtoError> {
    let mut payload = Vec::new();
    ciborium::ser::into_writer(message, &mut payload)
        .map_err(|e| ProtoError::Encode(e.to_string()))?;

    if payload.len() > MAX_FRAME_SIZE {
        return Err(ProtoError::FrameTooLarge { size: payload.len(), max: MAX_FRAME_SIZE });
    }

    let len = u32::try_from(payload.len())
        .map_err(|_| ProtoError::FrameTooLarge { size: payload.len(), max: MAX_FRAME_SIZE })?;

    out.reserve(HEADER_SIZE + payload.len());
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(&payload);
    Ok(())
}

/// Decode the first frame in `buf`.
///
/// Returns `Ok(None)` when `buf` does not yet hold a complete frame, or the
/// message together with the number of bytes it consumed.
pub fn decode(buf: &[u8]) -> Result<Option<(Message, usize)>, ProtoError> {
    let Some(header) = buf.get(..HEADER_SIZE) else {
        return Ok(None);
    };

    let mut len_bytes = [0u8; HEADER_SIZE];
    len_bytes.copy_from_slice(header);
    let len = u32::from_be_bytes(len_bytes) as usize;

    if len > MAX_FRAME_SIZE {
        return Err(ProtoError::FrameTooLarge { size: len, max: MAX_FRAME_SIZE });
    }

    let Some(payload) = buf.get(HEADER_SIZE..HEADER_SIZE + len) else {
        return Ok(None);
    };

    let message: Message =
        ciborium::de::from_reader(payload).map_err(|e| ProtoError::Decode(e.to_string()))?;

    Ok(Some((message, HEADER_SIZE + len)))
}

/// Reassembly buffer for a byte stream carrying frames.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    buf: BytesMut,
}

impl FrameBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self { buf: BytesMut::with_capacity(4096) }
    }

    /// Append bytes read from the stream.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Bytes buffered but not yet consumed.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Pop the next complete message, if any.
    ///
    /// A structurally invalid message is consumed and reported so the caller
    /// can skip it; fatal errors leave the buffer untouched.
    pub fn next_message(&mut self) -> Result<Option<Message>, ProtoError> {
        match decode(&self.buf)? {
            None => Ok(None),
            Some((message, consumed)) => {
                self.buf.advance(consumed);
                message.validate()?;
                Ok(Some(message))
            },
        }
    }
}
