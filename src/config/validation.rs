//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use slirc_proto::{LineCodec, is_channel_name};
use thiserror::Error;

use super::Config;

/// Validation errors for configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("server.host is required")]
    MissingHost,
    #[error("server.port must not be 0")]
    InvalidPort,
    #[error("server.encoding is not a known encoding: '{0}'")]
    UnknownEncoding(String),
    #[error("server.idle_timeout_secs must not be 0")]
    NoIdleTimeout,
    #[error("server.max_line_len must be at least 64, got {0}")]
    LineLimitTooSmall(usize),
    #[error("identity.nick must be non-empty and contain no spaces, got '{0}'")]
    InvalidNick(String),
    #[error("identity.user must be non-empty and contain no spaces, got '{0}'")]
    InvalidUser(String),
    #[error("channels: '{0}' is not a channel name")]
    InvalidChannel(String),
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    // Server
    if config.server.host.trim().is_empty() {
        errors.push(ValidationError::MissingHost);
    }
    if config.server.port == 0 {
        errors.push(ValidationError::InvalidPort);
    }
    if LineCodec::new(&config.server.encoding).is_err() {
        errors.push(ValidationError::UnknownEncoding(
            config.server.encoding.clone(),
        ));
    }
    if config.server.idle_timeout_secs == 0 {
        errors.push(ValidationError::NoIdleTimeout);
    }
    if config.server.max_line_len < 64 {
        errors.push(ValidationError::LineLimitTooSmall(
            config.server.max_line_len,
        ));
    }

    // Identity
    let word = |s: &str| !s.is_empty() && !s.contains([' ', '\r', '\n']);
    if !word(&config.identity.nick) {
        errors.push(ValidationError::InvalidNick(config.identity.nick.clone()));
    }
    if !word(&config.identity.user) {
        errors.push(ValidationError::InvalidUser(config.identity.user.clone()));
    }

    // Channels
    for channel in &config.channels {
        if !is_channel_name(&channel.name) || channel.name.contains([' ', ',']) {
            errors.push(ValidationError::InvalidChannel(channel.name.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
