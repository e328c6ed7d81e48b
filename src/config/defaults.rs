//! Default value functions for configuration.
//!
//! Separated into its own module for clarity and reuse.

use rand::Rng;

// =============================================================================
// Server Defaults
// =============================================================================

pub fn default_host() -> String {
    "127.0.0.1".to_string()
}

pub fn default_port() -> u16 {
    6667
}

pub fn default_encoding() -> String {
    "utf-8".to_string()
}

/// One hour without traffic drops the connection.
pub fn default_idle_timeout_secs() -> u64 {
    3600
}

pub fn default_max_line_len() -> usize {
    slirc_proto::MAX_IRC_LINE_LEN
}

// =============================================================================
// Identity Defaults
// =============================================================================

pub fn default_nick() -> String {
    let suffix: u16 = rand::thread_rng().gen_range(0..1000);
    format!("slirc{suffix}")
}

pub fn default_user() -> String {
    "slirc".to_string()
}

pub fn default_realname() -> String {
    "Straylight IRC client".to_string()
}

pub fn default_version() -> String {
    format!("slirc-client {}", env!("CARGO_PKG_VERSION"))
}

pub fn default_quit_reason() -> String {
    "power drained".to_string()
}
