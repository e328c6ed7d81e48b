//! Line-based codec for tokio.
//!
//! Splits an inbound byte stream on `\n`, decodes each line with the
//! configured character encoding, and encodes outbound strings the same way.

use std::borrow::Cow;

use bytes::BytesMut;
use encoding::Encoding;
use tokio_util::codec::{Decoder, Encoder};

use crate::error;
use crate::MAX_IRC_LINE_LEN;

/// Line-based codec that handles newline-terminated messages.
///
/// Lines are limited to [`MAX_IRC_LINE_LEN`] bytes unless configured
/// otherwise. An overlong line is reported once as
/// [`ProtocolError::MessageTooLong`](error::ProtocolError::MessageTooLong)
/// and its bytes are dropped up to and including the next newline; decoding
/// then carries on with the following line.
///
/// Bytes that are invalid in the configured encoding are replaced rather
/// than rejected.
pub struct LineCodec {
    encoding: &'static Encoding,
    /// Index of next byte to check for newline
    next_index: usize,
    /// Maximum line length
    max_len: usize,
    /// Set while skipping the tail of an overlong line.
    discarding: bool,
}

impl LineCodec {
    /// Create a new codec with the specified encoding.
    ///
    /// # Arguments
    /// * `label` - Encoding label (e.g., "utf-8")
    pub fn new(label: &str) -> error::Result<Self> {
        Self::with_max_len(label, MAX_IRC_LINE_LEN)
    }

    /// Create a new codec with custom max line length.
    pub fn with_max_len(label: &str, max_len: usize) -> error::Result<Self> {
        let encoding = Encoding::for_label(label.as_bytes())
            .ok_or_else(|| error::ProtocolError::UnknownEncoding(label.to_owned()))?;

        Ok(Self {
            encoding,
            next_index: 0,
            max_len,
            discarding: false,
        })
    }

    /// The encoding this codec was created with.
    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    fn too_long(&self, actual: usize) -> error::ProtocolError {
        tracing::debug!(actual, limit = self.max_len, "discarding overlong line");
        error::ProtocolError::MessageTooLong {
            actual,
            limit: self.max_len,
        }
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = error::ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> error::Result<Option<String>> {
        loop {
            let Some(offset) = src[self.next_index..].iter().position(|b| *b == b'\n') else {
                // No complete line yet
                if self.discarding {
                    src.clear();
                    self.next_index = 0;
                    return Ok(None);
                }

                if src.len() > self.max_len {
                    let actual = src.len();
                    src.clear();
                    self.next_index = 0;
                    self.discarding = true;
                    return Err(self.too_long(actual));
                }

                self.next_index = src.len();
                return Ok(None);
            };

            let line = src.split_to(self.next_index + offset + 1);
            self.next_index = 0;

            if self.discarding {
                // Tail of a line that was already reported.
                self.discarding = false;
                continue;
            }

            if line.len() > self.max_len {
                return Err(self.too_long(line.len()));
            }

            let (text, _had_errors) = self.encoding.decode_without_bom_handling(&line);
            return Ok(Some(text.into_owned()));
        }
    }
}

impl Encoder<String> for LineCodec {
    type Error = error::ProtocolError;

    fn encode(&mut self, msg: String, dst: &mut BytesMut) -> error::Result<()> {
        let (bytes, _enc, _had_errors) = self.encoding.encode(&msg);
        match bytes {
            Cow::Borrowed(b) => dst.extend_from_slice(b),
            Cow::Owned(v) => dst.extend_from_slice(&v),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_complete_line() {
        let mut codec = LineCodec::new("utf-8").unwrap();
        let mut buf = BytesMut::from("PING :test\r\n");

        let result = codec.decode(&mut buf).unwrap();
        assert_eq!(result, Some("PING :test\r\n".to_string()));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_partial_line() {
        let mut codec = LineCodec::new("utf-8").unwrap();
        let mut buf = BytesMut::from("PING :");

        assert_eq!(codec.decode(&mut buf).unwrap(), None);

        buf.extend_from_slice(b"abc\r\nPONG");
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some("PING :abc\r\n".to_string())
        );
        assert_eq!(&buf[..], b"PONG");
    }

    #[test]
    fn test_decode_too_long_complete_line() {
        let mut codec = LineCodec::with_max_len("utf-8", 10).unwrap();
        let mut buf = BytesMut::from("this is way too long\nPING x\n");

        let result = codec.decode(&mut buf);
        assert!(matches!(
            result,
            Err(error::ProtocolError::MessageTooLong { limit: 10, .. })
        ));
        assert_eq!(codec.decode(&mut buf).unwrap(), Some("PING x\n".to_string()));
    }

    #[test]
    fn test_decode_too_long_partial_line_is_discarded() {
        let mut codec = LineCodec::with_max_len("utf-8", 10).unwrap();
        let mut buf = BytesMut::from("aaaaaaaaaaaaaaaa");

        assert!(codec.decode(&mut buf).is_err());
        assert!(buf.is_empty());

        buf.extend_from_slice(b"bbbbbbbbbbbbbbbbbbbbb");
        assert_eq!(codec.decode(&mut buf).unwrap(), None);

        buf.extend_from_slice(b"ccc\r\nPING ok\r\n");
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some("PING ok\r\n".to_string())
        );
    }

    #[test]
    fn test_decode_invalid_utf8_is_replaced() {
        let mut codec = LineCodec::new("utf-8").unwrap();
        let mut buf = BytesMut::from(&b"PRIVMSG #c :caf\xe9\r\n"[..]);

        let line = codec.decode(&mut buf).unwrap().unwrap();
        assert!(line.starts_with("PRIVMSG #c :caf"));
        assert!(line.contains('\u{FFFD}'));
    }

    #[test]
    fn test_latin1_roundtrip() {
        let mut codec = LineCodec::new("iso-8859-1").unwrap();
        let mut buf = BytesMut::from(&b"caf\xe9\n"[..]);
        assert_eq!(codec.decode(&mut buf).unwrap(), Some("café\n".to_string()));

        let mut out = BytesMut::new();
        codec.encode("café\n".to_string(), &mut out).unwrap();
        assert_eq!(&out[..], b"caf\xe9\n");
    }

    #[test]
    fn test_unknown_encoding() {
        assert!(matches!(
            LineCodec::new("klingon"),
            Err(error::ProtocolError::UnknownEncoding(_))
        ));
    }

    #[test]
    fn test_encode() {
        let mut codec = LineCodec::new("utf-8").unwrap();
        let mut buf = BytesMut::new();

        codec
            .encode("PONG :test\r\n".to_string(), &mut buf)
            .unwrap();
        assert_eq!(&buf[..], b"PONG :test\r\n");
    }
}
