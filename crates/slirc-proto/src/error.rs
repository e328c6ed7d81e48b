//! Error types for the IRC protocol library.
//!
//! Framing problems, parse failures and encoding lookups all surface as
//! [`ProtocolError`]. None of them poison a codec: the offending input is
//! consumed so the next line can be decoded.

use thiserror::Error;

/// Convenience type alias for Results using [`ProtocolError`].
pub type Result<T, E = ProtocolError> = std::result::Result<T, E>;

/// Top-level protocol errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProtocolError {
    /// I/O error during reading or writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The configured character encoding label is not known.
    #[error("unknown encoding: {0}")]
    UnknownEncoding(String),

    /// A line exceeded the maximum allowed length and was discarded.
    #[error("message too long: {actual} bytes (limit: {limit})")]
    MessageTooLong {
        /// Number of bytes seen before the line was discarded.
        actual: usize,
        /// Maximum allowed length.
        limit: usize,
    },

    /// Illegal control character in an outgoing message.
    #[error("illegal control character: {0:?}")]
    IllegalControlChar(char),

    /// Failed to parse an IRC message.
    #[error("invalid message: {string:?}")]
    InvalidMessage {
        /// The invalid message string.
        string: String,
        /// The underlying parse error.
        #[source]
        cause: MessageParseError,
    },
}

/// Errors encountered when parsing IRC messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum MessageParseError {
    /// Message was empty or only whitespace.
    #[error("empty message")]
    EmptyMessage,

    /// A prefix was present but no command followed it.
    #[error("missing command after prefix")]
    MissingCommand,

    /// Command was neither letters nor a three digit numeric.
    #[error("invalid command: {0:?}")]
    InvalidCommand(String),

    /// Parser failure at a byte offset.
    #[error("parse error at position {position}: {context}")]
    ParseContext {
        /// Byte offset where parsing stopped.
        position: usize,
        /// Human readable description.
        context: String,
    },
}
