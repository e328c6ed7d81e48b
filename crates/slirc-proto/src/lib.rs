//! # slirc-proto
//!
//! Wire-level building blocks for IRC clients: message parsing and
//! serialization, line framing for tokio, CTCP helpers and numeric replies.
//!
//! ## Features
//!
//! - RFC 1459/2812 message parsing with prefix, command and parameters
//! - Trailing-parameter aware serialization
//! - Tokio codecs for newline-delimited lines and whole messages
//! - CTCP request parsing and reply construction
//! - RFC 1459 case mapping and wildcard mask matching

#![deny(clippy::all)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! ## Quick Start
//!
//! ### Creating IRC Messages
//!
//! ```rust
//! use slirc_proto::Message;
//!
//! let privmsg = Message::privmsg("#rust", "Hello, world!");
//! assert_eq!(privmsg.to_string(), "PRIVMSG #rust :Hello, world!\r\n");
//!
//! let join = Message::join(["#a", "#b"], ["key"]);
//! assert_eq!(join.to_string(), "JOIN #a,#b key\r\n");
//! ```
//!
//! ### Parsing IRC Messages
//!
//! ```rust
//! use slirc_proto::Message;
//!
//! let message: Message = ":nick!user@host PRIVMSG #channel :Hello there".parse().unwrap();
//! assert_eq!(message.prefix.as_deref(), Some("nick!user@host"));
//! assert_eq!(message.params, vec!["#channel", "Hello there"]);
//! ```

pub mod casemap;
pub mod ctcp;
pub mod error;
#[cfg(feature = "tokio")]
pub mod irc;
#[cfg(feature = "tokio")]
pub mod line;
pub mod message;
pub mod response;
pub mod util;

pub use self::casemap::{irc_eq, irc_lower_char, irc_to_lower};
pub use self::ctcp::{Ctcp, CtcpKind};
pub use self::error::{MessageParseError, ProtocolError};
#[cfg(feature = "tokio")]
pub use self::irc::IrcCodec;
#[cfg(feature = "tokio")]
pub use self::line::LineCodec;
pub use self::message::Message;
pub use self::response::Response;
pub use self::util::{
    is_channel_name, matches_hostmask, nick_from_prefix, truncate_utf8_safe, wildcard_match,
};

/// Maximum length of an IRC line in bytes, including the trailing CRLF.
pub const MAX_IRC_LINE_LEN: usize = 512;
