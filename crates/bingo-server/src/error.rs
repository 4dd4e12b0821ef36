//! Server error types.

use thiserror::Error;

/// Errors that can occur in the server runtime.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Transport/network error
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// Protocol error
    #[error("protocol error: {0}")]
    Protocol(#[from] bingo_proto::ProtoError),

    /// Connection was dropped by the server
    #[error("connection closed: {0}")]
    Closed(String),
}
