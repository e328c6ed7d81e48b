//! Named events and the subscription table that publishes them.
//!
//! Every inbound message is republished as an [`Event`] named after its
//! command. The client publishes a couple of local events too
//! ([`EventName::Connect`] and [`EventName::Disconnect`]).

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use slirc_proto::{Message, Response, nick_from_prefix};

use crate::channel::Channel;

/// Name an event is published under.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventName {
    /// Local: the socket connected and registration was sent.
    Connect,
    /// Local: the connection was torn down. The single param is the reason.
    Disconnect,
    Ping,
    Pong,
    Join,
    Part,
    Quit,
    Kick,
    Nick,
    Mode,
    Topic,
    Privmsg,
    Notice,
    Invite,
    Error,
    /// A three digit server reply.
    Numeric(u16),
    /// Any other command, uppercased.
    Other(String),
}

impl EventName {
    /// Name for a wire command, matched case-insensitively.
    ///
    /// Local event names never come from the wire; `CONNECT` from a server
    /// is just [`EventName::Other`].
    pub fn parse(command: &str) -> Self {
        if command.len() == 3 && command.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(code) = command.parse() {
                return Self::Numeric(code);
            }
        }

        match command.to_ascii_uppercase().as_str() {
            "PING" => Self::Ping,
            "PONG" => Self::Pong,
            "JOIN" => Self::Join,
            "PART" => Self::Part,
            "QUIT" => Self::Quit,
            "KICK" => Self::Kick,
            "NICK" => Self::Nick,
            "MODE" => Self::Mode,
            "TOPIC" => Self::Topic,
            "PRIVMSG" => Self::Privmsg,
            "NOTICE" => Self::Notice,
            "INVITE" => Self::Invite,
            "ERROR" => Self::Error,
            other => Self::Other(other.to_owned()),
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connect => "connect",
            Self::Disconnect => "disconnect",
            Self::Ping => "PING",
            Self::Pong => "PONG",
            Self::Join => "JOIN",
            Self::Part => "PART",
            Self::Quit => "QUIT",
            Self::Kick => "KICK",
            Self::Nick => "NICK",
            Self::Mode => "MODE",
            Self::Topic => "TOPIC",
            Self::Privmsg => "PRIVMSG",
            Self::Notice => "NOTICE",
            Self::Invite => "INVITE",
            Self::Error => "ERROR",
            Self::Numeric(code) => return write!(f, "{:03}", code),
            Self::Other(name) => name,
        };
        f.write_str(name)
    }
}

impl From<&str> for EventName {
    fn from(command: &str) -> Self {
        Self::parse(command)
    }
}

impl From<u16> for EventName {
    fn from(code: u16) -> Self {
        Self::Numeric(code)
    }
}

impl From<Response> for EventName {
    fn from(response: Response) -> Self {
        Self::Numeric(response.code())
    }
}

/// A published event.
///
/// Arguments are addressed the way the correlator sees them: position 0 is
/// the prefix (`""` when absent) and the message params follow.
#[derive(Clone, Debug)]
pub struct Event {
    /// Event name.
    pub name: EventName,
    /// Message source, if any.
    pub prefix: Option<String>,
    /// Message params, trailing last.
    pub params: Vec<String>,
    /// The channel the event is addressed to, when the client knows it.
    pub channel: Option<Channel>,
}

impl Event {
    /// Build an event from an inbound message.
    pub fn from_message(message: &Message) -> Self {
        Self {
            name: EventName::parse(&message.command),
            prefix: message.prefix.clone(),
            params: message.params.clone(),
            channel: None,
        }
    }

    /// Build a local event.
    pub fn local<I, S>(name: EventName, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name,
            prefix: None,
            params: params.into_iter().map(Into::into).collect(),
            channel: None,
        }
    }

    /// Correlation argument at `index`: the prefix at 0, then params.
    pub fn arg(&self, index: usize) -> Option<&str> {
        match index {
            0 => Some(self.prefix.as_deref().unwrap_or("")),
            i => self.param(i - 1),
        }
    }

    /// Number of correlation arguments (prefix included).
    pub fn arg_count(&self) -> usize {
        self.params.len() + 1
    }

    /// All correlation arguments as owned strings.
    pub fn args(&self) -> Vec<String> {
        (0..self.arg_count())
            .filter_map(|i| self.arg(i).map(str::to_owned))
            .collect()
    }

    /// Message param at `index`.
    pub fn param(&self, index: usize) -> Option<&str> {
        self.params.get(index).map(String::as_str)
    }

    /// Nickname of the sender, if the prefix names a user.
    pub fn source_nick(&self) -> Option<&str> {
        self.prefix.as_deref().and_then(nick_from_prefix)
    }
}

/// Handle returned by [`Emitter::subscribe`], used to unsubscribe.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Subscription {
    name: EventName,
    id: u64,
}

impl Subscription {
    /// The event this subscription listens to.
    pub fn name(&self) -> &EventName {
        &self.name
    }
}

type Handler = Arc<dyn Fn(&Event) + Send + Sync>;

#[derive(Default)]
struct EmitterInner {
    next_id: u64,
    handlers: HashMap<EventName, Vec<(u64, Handler)>>,
}

/// Subscription table keyed by [`EventName`].
///
/// Handlers run synchronously, in subscription order, on whichever task
/// publishes. A handler removed while an event is being delivered does not
/// see that event.
#[derive(Default)]
pub struct Emitter {
    inner: Mutex<EmitterInner>,
}

impl Emitter {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Call `handler` for every event named `name`.
    pub fn subscribe(
        &self,
        name: impl Into<EventName>,
        handler: impl Fn(&Event) + Send + Sync + 'static,
    ) -> Subscription {
        let name = name.into();
        let mut inner = self.inner.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner
            .handlers
            .entry(name.clone())
            .or_default()
            .push((id, Arc::new(handler)));
        Subscription { name, id }
    }

    /// Remove a subscription. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, subscription: &Subscription) -> bool {
        let mut inner = self.inner.lock();
        let Some(list) = inner.handlers.get_mut(&subscription.name) else {
            return false;
        };
        let before = list.len();
        list.retain(|(id, _)| *id != subscription.id);
        let removed = list.len() != before;
        if list.is_empty() {
            inner.handlers.remove(&subscription.name);
        }
        removed
    }

    /// Number of handlers subscribed to `name`.
    pub fn listener_count(&self, name: &EventName) -> usize {
        self.inner.lock().handlers.get(name).map_or(0, Vec::len)
    }

    /// Deliver `event` to its subscribers.
    pub fn publish(&self, event: &Event) {
        let snapshot = match self.inner.lock().handlers.get(&event.name) {
            Some(list) => list.clone(),
            None => return,
        };

        for (id, handler) in snapshot {
            if self.is_live(&event.name, id) {
                handler(event);
            }
        }
    }

    fn is_live(&self, name: &EventName, id: u64) -> bool {
        self.inner
            .lock()
            .handlers
            .get(name)
            .is_some_and(|list| list.iter().any(|(h, _)| *h == id))
    }
}

impl fmt::Debug for Emitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        let mut names: Vec<_> = inner.handlers.keys().collect();
        names.sort();
        f.debug_struct("Emitter").field("events", &names).finish()
    }
}
