//! Nom-based IRC line parser.
//!
//! Splits a raw line into borrowed prefix, command and parameter slices.
//! Ownership is taken later by [`super::parse`].

use nom::{
    bytes::complete::{take_until, take_while1},
    character::complete::{char, space0},
    combinator::opt,
    error::ErrorKind,
    sequence::preceded,
    IResult,
};
use smallvec::SmallVec;

/// Skip an IRCv3 tag block. Tags are never negotiated by this client, but a
/// misbehaving server sending them should not make the line unparsable.
fn skip_tags(input: &str) -> IResult<&str, &str> {
    preceded(char('@'), take_until(" "))(input)
}

/// Parse message prefix (the part after `:` and before the first space).
fn parse_prefix(input: &str) -> IResult<&str, &str> {
    preceded(char(':'), take_while1(|c| c != ' '))(input)
}

/// Parse the command name (1*letter or 3digit).
fn parse_command(input: &str) -> IResult<&str, &str> {
    let (rest, cmd) = take_while1(|c: char| c.is_ascii_alphanumeric())(input)?;

    let is_word = cmd.bytes().all(|b| b.is_ascii_alphabetic());
    let is_numeric = cmd.len() == 3 && cmd.bytes().all(|b| b.is_ascii_digit());

    if is_word || is_numeric {
        Ok((rest, cmd))
    } else {
        Err(nom::Err::Error(nom::error::Error::new(
            input,
            ErrorKind::AlphaNumeric,
        )))
    }
}

/// Split the remainder after the command into parameters.
///
/// Middle parameters are space separated (runs of spaces collapse). A
/// parameter starting with `:` swallows the rest of the line, spaces and all.
fn parse_params(input: &str) -> (&str, SmallVec<[&str; 15]>) {
    let mut params: SmallVec<[&str; 15]> = SmallVec::new();
    let mut rest = input;

    while rest.starts_with(' ') {
        rest = rest.trim_start_matches(' ');

        if rest.is_empty() || rest.starts_with(['\r', '\n']) {
            break;
        }

        if let Some(trailing) = rest.strip_prefix(':') {
            let end = trailing.find(['\r', '\n']).unwrap_or(trailing.len());
            params.push(&trailing[..end]);
            rest = &trailing[end..];
            break;
        }

        let end = rest.find([' ', '\r', '\n']).unwrap_or(rest.len());
        params.push(&rest[..end]);
        rest = &rest[end..];
    }

    (rest, params)
}

/// Parse a complete IRC line into its components.
///
/// ```text
/// [:prefix] <command> [params...] [:trailing]
/// ```
pub(crate) fn parse_message(input: &str) -> IResult<&str, ParsedMessage<'_>> {
    let (input, _) = opt(skip_tags)(input)?;
    let (input, _) = space0(input)?;

    let (input, prefix) = opt(parse_prefix)(input)?;
    let (input, _) = space0(input)?;

    let (input, command) = parse_command(input)?;
    let (rest, params) = parse_params(input);

    Ok((
        rest,
        ParsedMessage {
            prefix,
            command,
            params,
        },
    ))
}

/// A parsed IRC line holding slices of the input.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ParsedMessage<'a> {
    /// Raw prefix (without the leading `:`), if present.
    pub prefix: Option<&'a str>,
    /// The command name or numeric.
    pub command: &'a str,
    /// Command parameters, including trailing.
    pub params: SmallVec<[&'a str; 15]>,
}

impl<'a> ParsedMessage<'a> {
    /// Parse a line, reporting the byte offset of any failure.
    pub fn parse(input: &'a str) -> Result<Self, DetailedParseError> {
        match parse_message(input) {
            Ok((_remaining, msg)) => Ok(msg),
            Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(DetailedParseError {
                position: input.len() - e.input.len(),
                kind: e.code,
            }),
            Err(nom::Err::Incomplete(_)) => Err(DetailedParseError {
                position: input.len(),
                kind: ErrorKind::Eof,
            }),
        }
    }
}

/// Parse failure with position information.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DetailedParseError {
    /// Byte position where parsing failed.
    pub position: usize,
    /// The nom error kind.
    pub kind: ErrorKind,
}
