use crate::response::Response;
use crate::util::nick_from_prefix;

/// An owned IRC message.
///
/// `params` holds every parameter in wire order. Only the last one may
/// contain spaces, and only when it arrived as the `:`-led trailing
/// parameter.
///
/// # Example
///
/// ```
/// use slirc_proto::Message;
///
/// let msg: Message = ":nick!user@host PRIVMSG #channel :Hello!".parse().unwrap();
/// assert_eq!(msg.command, "PRIVMSG");
/// assert_eq!(msg.source_nickname(), Some("nick"));
///
/// let msg = Message::privmsg("#channel", "Hello!");
/// assert_eq!(msg.param(1), Some("Hello!"));
/// ```
#[derive(Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Message {
    /// Message source (`nick!user@host` or a server name).
    pub prefix: Option<String>,
    /// The command word or three digit numeric, as sent.
    pub command: String,
    /// Command parameters, trailing parameter last.
    pub params: Vec<String>,
}

impl Message {
    /// Create a message without a prefix.
    #[must_use]
    pub fn new<C, I, P>(command: C, params: I) -> Self
    where
        C: Into<String>,
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        Self {
            prefix: None,
            command: command.into(),
            params: params.into_iter().map(Into::into).collect(),
        }
    }

    /// Attach a prefix to the message.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Parameter at `index`, if present.
    pub fn param(&self, index: usize) -> Option<&str> {
        self.params.get(index).map(String::as_str)
    }

    /// The final parameter, if any.
    pub fn trailing(&self) -> Option<&str> {
        self.params.last().map(String::as_str)
    }

    /// Get the nickname from the message prefix, if it names a user.
    pub fn source_nickname(&self) -> Option<&str> {
        self.prefix.as_deref().and_then(nick_from_prefix)
    }

    /// The numeric code if the command is a three digit reply.
    pub fn numeric(&self) -> Option<u16> {
        if self.command.len() == 3 && self.command.bytes().all(|b| b.is_ascii_digit()) {
            self.command.parse().ok()
        } else {
            None
        }
    }

    /// The numeric as a known [`Response`], if it is one.
    pub fn response(&self) -> Option<Response> {
        self.numeric().and_then(Response::from_code)
    }

    /// Create a PRIVMSG message to a target with text.
    #[must_use]
    pub fn privmsg(target: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new("PRIVMSG", [target.into(), text.into()])
    }

    /// Create a NOTICE message to a target with text.
    #[must_use]
    pub fn notice(target: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new("NOTICE", [target.into(), text.into()])
    }

    /// Create a single JOIN for several channels.
    ///
    /// Keys are matched to channels by position, so callers must place keyed
    /// channels first.
    #[must_use]
    pub fn join<C, K>(channels: C, keys: K) -> Self
    where
        C: IntoIterator,
        C::Item: AsRef<str>,
        K: IntoIterator,
        K::Item: AsRef<str>,
    {
        let channels = join_list(channels);
        let keys = join_list(keys);
        if keys.is_empty() {
            Self::new("JOIN", [channels])
        } else {
            Self::new("JOIN", [channels, keys])
        }
    }

    /// Create a PART message to leave a channel.
    #[must_use]
    pub fn part(channel: impl Into<String>) -> Self {
        Self::new("PART", [channel.into()])
    }

    /// Create a NICK message.
    #[must_use]
    pub fn nick(nickname: impl Into<String>) -> Self {
        Self::new("NICK", [nickname.into()])
    }

    /// Create a USER registration message.
    #[must_use]
    pub fn user(username: impl Into<String>, realname: impl Into<String>) -> Self {
        Self::new(
            "USER",
            [username.into(), "0".into(), "*".into(), realname.into()],
        )
    }

    /// Create a PONG answering a server PING token.
    #[must_use]
    pub fn pong(token: impl Into<String>) -> Self {
        Self::new("PONG", [token.into()])
    }

    /// Create a WHO query.
    #[must_use]
    pub fn who(mask: impl Into<String>) -> Self {
        Self::new("WHO", [mask.into()])
    }

    /// Create a QUIT message with a reason.
    #[must_use]
    pub fn quit(reason: impl Into<String>) -> Self {
        Self::new("QUIT", [reason.into()])
    }
}

fn join_list<I>(items: I) -> String
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    items
        .into_iter()
        .map(|s| s.as_ref().to_owned())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(",")
}
