//! CTCP (Client-to-Client Protocol) message handling.
//!
//! CTCP requests ride inside PRIVMSG bodies wrapped in `\x01`; replies go
//! back as NOTICE bodies in the same wrapping.
//!
//! # Reference
//! - CTCP specification: <https://modern.ircdocs.horse/ctcp.html>
//!
//! # Example
//!
//! ```
//! use slirc_proto::ctcp::{Ctcp, CtcpKind};
//!
//! let ctcp = Ctcp::parse("\x01PING 12345\x01").unwrap();
//! assert_eq!(ctcp.kind, CtcpKind::Ping);
//! assert_eq!(ctcp.params, Some("12345"));
//!
//! assert_eq!(Ctcp::version_reply("slirc 1.0").to_string(), "\x01VERSION slirc 1.0\x01");
//! ```

use std::fmt;

use crate::util::truncate_utf8_safe;

/// The CTCP delimiter character (`\x01`).
pub const CTCP_DELIM: char = '\x01';

/// How many bytes of an unknown query are echoed back in an `ERRMSG` reply.
pub const ERRMSG_ECHO_LIMIT: usize = 64;

/// CTCP command types a client distinguishes.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum CtcpKind {
    /// ACTION - `/me` emotes; never answered.
    Action,
    /// VERSION - requests client version information.
    Version,
    /// PING - measures round-trip latency; echoed back verbatim.
    Ping,
    /// TIME - requests local time from the client.
    Time,
    /// ERRMSG - error reply for queries that were not understood.
    Errmsg,
    /// Anything else.
    Unknown(String),
}

impl CtcpKind {
    /// Parse a CTCP command name into a `CtcpKind`.
    pub fn parse(name: &str) -> Self {
        match name.to_ascii_uppercase().as_str() {
            "ACTION" => Self::Action,
            "VERSION" => Self::Version,
            "PING" => Self::Ping,
            "TIME" => Self::Time,
            "ERRMSG" => Self::Errmsg,
            _ => Self::Unknown(name.to_owned()),
        }
    }

    /// Returns the canonical uppercase name of this CTCP command.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Action => "ACTION",
            Self::Version => "VERSION",
            Self::Ping => "PING",
            Self::Time => "TIME",
            Self::Errmsg => "ERRMSG",
            Self::Unknown(s) => s,
        }
    }
}

impl fmt::Display for CtcpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed CTCP message borrowing from the message body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ctcp<'a> {
    /// The CTCP command type.
    pub kind: CtcpKind,
    /// Optional parameters following the command.
    pub params: Option<&'a str>,
}

impl<'a> Ctcp<'a> {
    /// Parse a CTCP message from a PRIVMSG/NOTICE body.
    ///
    /// Returns `None` if the body is not CTCP. A missing closing delimiter
    /// is tolerated.
    pub fn parse(text: &'a str) -> Option<Self> {
        let text = text.strip_prefix(CTCP_DELIM)?;
        let text = text.strip_suffix(CTCP_DELIM).unwrap_or(text);

        if text.is_empty() {
            return None;
        }

        let (command, params) = match text.split_once(' ') {
            Some((command, "")) => (command, None),
            Some((command, params)) => (command, Some(params)),
            None => (text, None),
        };

        Some(Self {
            kind: CtcpKind::parse(command),
            params,
        })
    }

    /// Check if a message body contains a CTCP message.
    #[inline]
    pub fn is_ctcp(text: &str) -> bool {
        text.starts_with(CTCP_DELIM)
    }

    /// Create a VERSION reply.
    pub fn version_reply(version: &'a str) -> Self {
        Self {
            kind: CtcpKind::Version,
            params: Some(version),
        }
    }

    /// Create a TIME reply.
    pub fn time_reply(time: &'a str) -> Self {
        Self {
            kind: CtcpKind::Time,
            params: Some(time),
        }
    }

    /// Build the `ERRMSG` reply for a query the client does not understand.
    ///
    /// The original body is echoed back, cut to [`ERRMSG_ECHO_LIMIT`] bytes
    /// so a long query cannot be bounced back at full size.
    pub fn unknown_query_reply(body: &str) -> String {
        let inner = body.trim_matches(CTCP_DELIM);
        format!(
            "{delim}ERRMSG {} :unknown query{delim}",
            truncate_utf8_safe(inner, ERRMSG_ECHO_LIMIT),
            delim = CTCP_DELIM
        )
    }
}

impl fmt::Display for Ctcp<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", CTCP_DELIM, self.kind)?;
        if let Some(params) = self.params {
            write!(f, " {}", params)?;
        }
        write!(f, "{}", CTCP_DELIM)
    }
}
