//! Message parsing implementation.
//!
//! This module implements `FromStr` for `Message` using the nom-based parser.

use std::str::FromStr;

use crate::error::{MessageParseError, ProtocolError};

use super::nom_parser::ParsedMessage;
use super::types::Message;

impl FromStr for Message {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Message, Self::Err> {
        let invalid = |cause| ProtocolError::InvalidMessage {
            string: s.to_owned(),
            cause,
        };

        let line = s.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            return Err(invalid(MessageParseError::EmptyMessage));
        }

        let parsed = ParsedMessage::parse(line).map_err(|err| {
            let rest = line[err.position..].trim_start();
            if rest.is_empty() {
                invalid(MessageParseError::MissingCommand)
            } else if err.position > 0 || line.starts_with(|c: char| c.is_ascii_alphanumeric()) {
                let word = rest.split(' ').next().unwrap_or(rest);
                invalid(MessageParseError::InvalidCommand(word.to_owned()))
            } else {
                invalid(MessageParseError::ParseContext {
                    position: err.position,
                    context: format!("{:?}", err.kind),
                })
            }
        })?;

        Ok(Message {
            prefix: parsed.prefix.map(str::to_owned),
            command: parsed.command.to_owned(),
            params: parsed.params.iter().map(|p| (*p).to_owned()).collect(),
        })
    }
}
