//! Protocol error types.
//!
//! Every decoding failure is recoverable at the connection level: the
//! offending frame is dropped and the stream stays open.

use thiserror::Error;

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors produced while decoding device frames.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    /// No bytes to decode
    #[error("empty frame")]
    Empty,

    /// Leading byte is not a known request tag
    #[error("unknown request tag: {0:#04x}")]
    UnknownTag(u8),

    /// Frame ended before its fixed layout was complete
    #[error("truncated frame: tag {tag:#04x} needs {expected} bytes, got {actual}")]
    Truncated {
        /// Tag of the partial frame
        tag: u8,
        /// Bytes the layout requires
        expected: usize,
        /// Bytes actually available
        actual: usize,
    },
}
