//! Core configuration types.

use std::time::Duration;

use serde::Deserialize;

use super::defaults::*;

/// Client configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where to connect.
    pub server: ServerConfig,
    /// How to register.
    pub identity: IdentityConfig,
    /// Channels the demo binary joins after registration.
    pub channels: Vec<ChannelConfig>,
}

/// Server connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host name or address.
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Character encoding label, as understood by encoding_rs.
    #[serde(default = "default_encoding")]
    pub encoding: String,
    /// Seconds without inbound traffic before the connection is dropped.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    /// Longest accepted inbound line in bytes, CRLF included.
    #[serde(default = "default_max_line_len")]
    pub max_line_len: usize,
}

impl ServerConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            encoding: default_encoding(),
            idle_timeout_secs: default_idle_timeout_secs(),
            max_line_len: default_max_line_len(),
        }
    }
}

/// Client identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    /// Nickname to register with.
    #[serde(default = "default_nick")]
    pub nick: String,
    /// Username (ident) sent in USER.
    #[serde(default = "default_user")]
    pub user: String,
    /// Real name sent in USER.
    #[serde(default = "default_realname")]
    pub realname: String,
    /// CTCP VERSION reply.
    #[serde(default = "default_version")]
    pub version: String,
    /// QUIT message used when none is given.
    #[serde(default = "default_quit_reason")]
    pub quit_reason: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            nick: default_nick(),
            user: default_user(),
            realname: default_realname(),
            version: default_version(),
            quit_reason: default_quit_reason(),
        }
    }
}

/// A channel to join, with optional key.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChannelConfig {
    pub name: String,
    #[serde(default)]
    pub key: Option<String>,
}
