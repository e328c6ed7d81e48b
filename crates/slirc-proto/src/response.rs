//! IRC numeric replies a client engine reacts to.
//!
//! Only the numerics the client correlates on are named here; any other
//! three digit reply still parses as a plain [`u16`] via
//! [`Message::numeric`](crate::Message::numeric).
//!
//! # Reference
//! - RFC 2812: Internet Relay Chat: Client Protocol
//! - Modern IRC documentation: <https://modern.ircdocs.horse/>

#![allow(non_camel_case_types)]

use std::fmt;
use std::str::FromStr;

/// IRC server response code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u16)]
#[non_exhaustive]
pub enum Response {
    /// 001 - Welcome to the IRC network
    RPL_WELCOME = 1,
    /// 005 - Server supported features
    RPL_ISUPPORT = 5,
    /// 315 - End of WHO
    RPL_ENDOFWHO = 315,
    /// 331 - No topic set
    RPL_NOTOPIC = 331,
    /// 332 - Channel topic
    RPL_TOPIC = 332,
    /// 333 - Who set the topic and when
    RPL_TOPICWHOTIME = 333,
    /// 352 - WHO reply
    RPL_WHOREPLY = 352,
    /// 353 - NAMES reply
    RPL_NAMREPLY = 353,
    /// 366 - End of NAMES
    RPL_ENDOFNAMES = 366,
    /// 376 - End of MOTD
    RPL_ENDOFMOTD = 376,
    /// 403 - No such channel
    ERR_NOSUCHCHANNEL = 403,
    /// 422 - MOTD file is missing
    ERR_NOMOTD = 422,
    /// 433 - Nickname is already in use
    ERR_NICKNAMEINUSE = 433,
    /// 442 - Not on channel
    ERR_NOTONCHANNEL = 442,
    /// 471 - Channel is full
    ERR_CHANNELISFULL = 471,
    /// 473 - Invite only channel
    ERR_INVITEONLYCHAN = 473,
    /// 474 - Banned from channel
    ERR_BANNEDFROMCHAN = 474,
    /// 475 - Bad channel key
    ERR_BADCHANNELKEY = 475,
}

impl Response {
    /// Replies that mean a JOIN was refused.
    pub const JOIN_FAILURES: [Response; 4] = [
        Response::ERR_CHANNELISFULL,
        Response::ERR_INVITEONLYCHAN,
        Response::ERR_BANNEDFROMCHAN,
        Response::ERR_BADCHANNELKEY,
    ];

    /// Replies that mean a PART was refused.
    pub const PART_FAILURES: [Response; 2] =
        [Response::ERR_NOSUCHCHANNEL, Response::ERR_NOTONCHANNEL];

    /// Returns the numeric code as u16
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Creates a Response from a numeric code
    pub fn from_code(code: u16) -> Option<Response> {
        let response = match code {
            1 => Response::RPL_WELCOME,
            5 => Response::RPL_ISUPPORT,
            315 => Response::RPL_ENDOFWHO,
            331 => Response::RPL_NOTOPIC,
            332 => Response::RPL_TOPIC,
            333 => Response::RPL_TOPICWHOTIME,
            352 => Response::RPL_WHOREPLY,
            353 => Response::RPL_NAMREPLY,
            366 => Response::RPL_ENDOFNAMES,
            376 => Response::RPL_ENDOFMOTD,
            403 => Response::ERR_NOSUCHCHANNEL,
            422 => Response::ERR_NOMOTD,
            433 => Response::ERR_NICKNAMEINUSE,
            442 => Response::ERR_NOTONCHANNEL,
            471 => Response::ERR_CHANNELISFULL,
            473 => Response::ERR_INVITEONLYCHAN,
            474 => Response::ERR_BANNEDFROMCHAN,
            475 => Response::ERR_BADCHANNELKEY,
            _ => return None,
        };
        Some(response)
    }

    /// Check if this is an error response (4xx, 5xx)
    #[inline]
    pub fn is_error(&self) -> bool {
        (400..600).contains(&self.code())
    }
}

impl FromStr for Response {
    type Err = ParseResponseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code: u16 = s.parse().map_err(|_| ParseResponseError::InvalidFormat)?;
        Response::from_code(code).ok_or(ParseResponseError::UnknownCode(code))
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03}", self.code())
    }
}

/// Error when parsing a response code
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ParseResponseError {
    /// The string was not a valid number
    InvalidFormat,
    /// The numeric code is not a known response
    UnknownCode(u16),
}

impl fmt::Display for ParseResponseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidFormat => write!(f, "invalid response code format"),
            Self::UnknownCode(code) => write!(f, "unknown response code: {}", code),
        }
    }
}

impl std::error::Error for ParseResponseError {}
