//! IRC message codec for tokio.
//!
//! Encodes and decodes [`Message`] values on top of [`LineCodec`].

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::error;
use crate::line::LineCodec;
use crate::message::Message;

/// Tokio codec for encoding/decoding IRC messages.
///
/// Blank lines are skipped. A line that fails to parse is consumed and
/// reported as an error, so the caller may keep decoding.
pub struct IrcCodec {
    inner: LineCodec,
}

impl IrcCodec {
    /// Create a new codec with the specified encoding.
    ///
    /// # Arguments
    /// * `label` - Encoding label (e.g., "utf-8", "iso-8859-1")
    pub fn new(label: &str) -> error::Result<Self> {
        LineCodec::new(label).map(|codec| Self { inner: codec })
    }

    /// Create a new codec with custom max line length.
    ///
    /// # Arguments
    /// * `label` - Encoding label
    /// * `max_len` - Maximum line length in bytes
    pub fn with_max_len(label: &str, max_len: usize) -> error::Result<Self> {
        LineCodec::with_max_len(label, max_len).map(|codec| Self { inner: codec })
    }

    /// Sanitize outgoing message data.
    ///
    /// Truncates at the first line ending so one message can never smuggle
    /// a second command, and rejects NUL.
    pub fn sanitize(mut data: String) -> error::Result<String> {
        if let Some((pos, len)) = ["\r\n", "\r", "\n"]
            .iter()
            .flat_map(|needle| data.find(needle).map(|pos| (pos, needle.len())))
            .min_by_key(|&(pos, _)| pos)
        {
            data.truncate(pos + len);
        }

        if data.contains('\0') {
            return Err(error::ProtocolError::IllegalControlChar('\0'));
        }

        Ok(data)
    }
}

impl Decoder for IrcCodec {
    type Item = Message;
    type Error = error::ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> error::Result<Option<Message>> {
        loop {
            match self.inner.decode(src)? {
                None => return Ok(None),
                Some(line) if line.trim().is_empty() => continue,
                Some(line) => return line.parse::<Message>().map(Some),
            }
        }
    }
}

impl Encoder<Message> for IrcCodec {
    type Error = error::ProtocolError;

    fn encode(&mut self, msg: Message, dst: &mut BytesMut) -> error::Result<()> {
        let sanitized = Self::sanitize(msg.to_string())?;
        self.inner.encode(sanitized, dst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_truncates_newline() {
        let result = IrcCodec::sanitize("PRIVMSG #test :hello\r\nQUIT :bye".to_string());
        assert_eq!(result.unwrap(), "PRIVMSG #test :hello\r\n");
    }

    #[test]
    fn test_sanitize_rejects_nul() {
        let result = IrcCodec::sanitize("PRIVMSG #test :hel\0lo".to_string());
        assert!(matches!(
            result,
            Err(error::ProtocolError::IllegalControlChar('\0'))
        ));
    }

    #[test]
    fn test_sanitize_keeps_ctcp_delimiter() {
        let result = IrcCodec::sanitize("NOTICE n :\x01VERSION x\x01\r\n".to_string());
        assert!(result.is_ok());
    }

    #[test]
    fn test_decode_skips_blank_lines() {
        let mut codec = IrcCodec::new("utf-8").unwrap();
        let mut buf = BytesMut::from("\r\n\r\nPING :srv\r\n");

        let msg = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(msg.command, "PING");
        assert_eq!(msg.params, vec!["srv"]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_decode_error_consumes_line() {
        let mut codec = IrcCodec::new("utf-8").unwrap();
        let mut buf = BytesMut::from(":only.a.prefix\r\n:s 001 me :hi\r\n");

        assert!(codec.decode(&mut buf).is_err());
        let msg = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(msg.numeric(), Some(1));
    }

    #[test]
    fn test_encode_message() {
        let mut codec = IrcCodec::new("utf-8").unwrap();
        let mut buf = BytesMut::new();
        codec.encode(Message::join(["#a"], ["k"]), &mut buf).unwrap();
        assert_eq!(&buf[..], b"JOIN #a k\r\n");
    }
}
