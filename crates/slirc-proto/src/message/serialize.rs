use std::fmt::{self, Display, Formatter};

use super::types::Message;

/// Whether a final parameter must be sent in `:trailing` form.
fn needs_colon(param: &str) -> bool {
    param.is_empty() || param.starts_with(':') || param.contains(' ')
}

impl Display for Message {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if let Some(ref prefix) = self.prefix {
            write!(f, ":{} ", prefix)?;
        }

        f.write_str(&self.command)?;

        if let Some((last, middle)) = self.params.split_last() {
            for param in middle {
                write!(f, " {}", param)?;
            }
            if needs_colon(last) {
                write!(f, " :{}", last)?;
            } else {
                write!(f, " {}", last)?;
            }
        }

        f.write_str("\r\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_with_spaces() {
        let msg = Message::new("USER", ["bot", "0", "*", "Real Name"]);
        assert_eq!(msg.to_string(), "USER bot 0 * :Real Name\r\n");
    }

    #[test]
    fn test_plain_last_param() {
        assert_eq!(Message::pong("token").to_string(), "PONG token\r\n");
    }

    #[test]
    fn test_empty_and_colon_led_last_param() {
        assert_eq!(Message::quit("").to_string(), "QUIT :\r\n");
        assert_eq!(
            Message::privmsg("#c", ":)").to_string(),
            "PRIVMSG #c ::)\r\n"
        );
    }

    #[test]
    fn test_prefix_is_written() {
        let msg = Message::new("JOIN", ["#c"]).with_prefix("me!u@h");
        assert_eq!(msg.to_string(), ":me!u@h JOIN #c\r\n");
    }

    #[test]
    fn test_reparse_keeps_trailing() {
        let msg = Message::notice("nick", "\x01VERSION slirc 1.0\x01");
        let back: Message = msg.to_string().parse().unwrap();
        assert_eq!(back, msg);
    }
}
