//! Unified error handling for slirc-client.
//!
//! Only connection setup can fail synchronously. Everything that goes wrong
//! later (a refused join, a dropped socket) reaches the caller as the
//! rejection or cancellation [`Reason`](crate::Reason) of the operation it
//! affected.

use slirc_proto::ProtocolError;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors from setting up a connection.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("connection failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("already connected")]
    AlreadyConnected,

    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

impl ClientError {
    /// Get a static error code string for log labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::Protocol(_) => "protocol",
            Self::AlreadyConnected => "already_connected",
            Self::Config(_) => "config",
        }
    }
}
