//! Errors raised while reading or writing frames.

use std::io;

/// Protocol-level failures. All of them are fatal to the connection.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("connection closed by peer")]
    Closed,

    #[error("bad handshake magic: {actual} != {expected}")]
    BadMagic { expected: i32, actual: i32 },

    #[error("invalid path length {0}")]
    InvalidPathLength(i32),

    #[error("invalid payload length {0}")]
    InvalidPayloadLength(i32),
}

impl ProtocolError {
    /// Map an I/O error, treating a short read at a frame boundary as a close.
    pub(crate) fn from_read(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            ProtocolError::Closed
        } else {
            ProtocolError::Io(err)
        }
    }
}

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;
