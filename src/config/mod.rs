//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: Config struct definitions (Config, ServerConfig, IdentityConfig, ChannelConfig)
//! - [`defaults`]: serde default functions
//! - [`validation`]: startup checks run by [`Config::load`]

mod defaults;
mod types;
mod validation;

use std::path::Path;

use thiserror::Error;

pub use types::{ChannelConfig, Config, IdentityConfig, ServerConfig};
pub use validation::{ValidationError, validate};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {}", join_errors(.0))]
    Invalid(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl Config {
    /// Load and validate configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        content.parse()
    }
}

impl std::str::FromStr for Config {
    type Err = ConfigError;

    /// Parse and validate configuration from TOML text.
    fn from_str(content: &str) -> Result<Self, Self::Err> {
        let config: Config = toml::from_str(content)?;
        validate(&config).map_err(ConfigError::Invalid)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = "".parse().unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 6667);
        assert_eq!(config.server.encoding, "utf-8");
        assert_eq!(config.server.idle_timeout(), Duration::from_secs(3600));
        assert_eq!(config.server.max_line_len, 512);
        assert!(config.identity.nick.starts_with("slirc"));
        assert_eq!(config.identity.quit_reason, "power drained");
        assert!(config.channels.is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r##"
[server]
host = "irc.example.net"
port = 6697
encoding = "iso-8859-1"

[identity]
nick = "straylight"
realname = "Straylight Bot"

[[channels]]
name = "#rust"
key = "secret"

[[channels]]
name = "#tokio"
"##
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.server.host, "irc.example.net");
        assert_eq!(config.server.port, 6697);
        assert_eq!(config.identity.nick, "straylight");
        assert_eq!(config.identity.user, "slirc");
        assert_eq!(config.channels.len(), 2);
        assert_eq!(config.channels[0].key.as_deref(), Some("secret"));
        assert_eq!(config.channels[1].key, None);
    }

    #[test]
    fn test_invalid_values_are_reported_together() {
        let err = r#"
[server]
port = 0
encoding = "no-such-charset"

[identity]
nick = "has space"

[[channels]]
name = "nohash"
"#
        .parse::<Config>()
        .unwrap_err();

        match err {
            ConfigError::Invalid(errors) => assert_eq!(errors.len(), 4),
            other => panic!("unexpected: {other}"),
        }
    }

    #[test]
    fn test_zero_idle_timeout_rejected() {
        let err = "[server]\nidle_timeout_secs = 0\n"
            .parse::<Config>()
            .unwrap_err();
        assert!(err.to_string().contains("idle_timeout_secs"));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            Config::load("/nonexistent/client.toml"),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn test_bad_toml() {
        assert!(matches!(
            "[server\nport = ".parse::<Config>(),
            Err(ConfigError::Parse(_))
        ));
    }
}
