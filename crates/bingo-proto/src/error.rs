//! Protocol error types.

use thiserror::Error;

/// Errors from message validation and frame encoding/decoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtoError {
    /// Frame payload exceeds [`MAX_FRAME_SIZE`](crate::MAX_FRAME_SIZE).
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge {
        /// Declared or actual payload size.
        size: usize,
        /// Configured maximum.
        max: usize,
    },

    /// CBOR serialization failed.
    #[error("encode failed: {0}")]
    Encode(String),

    /// CBOR deserialization failed.
    #[error("decode failed: {0}")]
    Decode(String),

    /// Message decoded but is structurally invalid.
    #[error("invalid message: {reason}")]
    Invalid {
        /// What is wrong with the message.
        reason: String,
    },
}

impl ProtoError {
    /// Returns true if the stream that produced this error cannot continue.
    ///
    /// A bad length prefix or an undecodable body leaves the reader without
    /// a frame boundary to resync on. An invalid message is framed correctly
    /// and only that message is dropped.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::FrameTooLarge { .. } | Self::Decode(_) => true,
            Self::Encode(_) | Self::Invalid { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oversized_frame_is_fatal() {
        let err = ProtoError::FrameTooLarge { size: 1 << 20, max: 1 << 16 };
        assert!(err.is_fatal());
    }

    #[test]
    fn invalid_message_is_not_fatal() {
        let err = ProtoError::Invalid { reason: "number must be positive".to_string() };
        assert!(!err.is_fatal());
    }

    #[test]
    fn error_display() {
        let err = ProtoError::FrameTooLarge { size: 70000, max: 65536 };
        assert_eq!(err.to_string(), "frame too large: 70000 bytes (max 65536)");
    }
}
