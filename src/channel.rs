//! Channels the client knows about, and their members.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use slirc_proto::irc_eq;

use crate::event::{Emitter, Event, EventName, Subscription};

/// A channel member as seen in NAMES or WHO replies.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Member {
    /// Nickname without status prefixes.
    pub nick: String,
    /// Has operator status.
    pub op: bool,
    /// Has voice.
    pub voice: bool,
}

impl Member {
    /// Parse one NAMES token such as `@alice` or `+bob`.
    pub fn parse(token: &str) -> Option<Self> {
        let nick = token.trim_start_matches(['~', '&', '@', '%', '+']);
        if nick.is_empty() {
            return None;
        }
        let status = &token[..token.len() - nick.len()];
        Some(Self {
            nick: nick.to_owned(),
            op: status.contains(['~', '&', '@']),
            voice: status.contains('+'),
        })
    }

    /// Parse a space-separated RPL_NAMREPLY list.
    pub fn parse_names(list: &str) -> Vec<Self> {
        list.split_whitespace().filter_map(Self::parse).collect()
    }
}

/// One RPL_WHOREPLY (352) line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WhoEntry {
    pub nick: String,
    pub user: String,
    pub host: String,
    pub server: String,
    pub op: bool,
    pub voice: bool,
    pub away: bool,
    pub hops: u32,
    pub realname: String,
}

impl WhoEntry {
    /// Parse reply params `[me, channel, user, host, server, nick, flags,
    /// "hops realname"]`.
    pub fn from_params(params: &[String]) -> Option<Self> {
        let [_, _, user, host, server, nick, flags, rest, ..] = params else {
            return None;
        };
        let (hops, realname) = rest.split_once(' ').unwrap_or((rest.as_str(), ""));
        Some(Self {
            nick: nick.clone(),
            user: user.clone(),
            host: host.clone(),
            server: server.clone(),
            op: flags.contains('@'),
            voice: flags.contains('+'),
            away: flags.starts_with('G'),
            hops: hops.parse().unwrap_or(0),
            realname: realname.to_owned(),
        })
    }
}

impl From<&WhoEntry> for Member {
    fn from(entry: &WhoEntry) -> Self {
        Self {
            nick: entry.nick.clone(),
            op: entry.op,
            voice: entry.voice,
        }
    }
}

#[derive(Debug, Default)]
struct ChannelState {
    joined: bool,
    topic: Option<String>,
    key: Option<String>,
    members: Vec<Member>,
}

struct ChannelInner {
    name: String,
    state: Mutex<ChannelState>,
    events: Arc<Emitter>,
}

/// Shared handle to a channel.
///
/// The client owns one per channel name (compared case-insensitively) and
/// hands out clones. After a disconnect the channel reports not joined and
/// its topic and member list are stale until the next join.
#[derive(Clone)]
pub struct Channel {
    inner: Arc<ChannelInner>,
}

impl Channel {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            inner: Arc::new(ChannelInner {
                name: name.to_owned(),
                state: Mutex::new(ChannelState::default()),
                events: Arc::new(Emitter::new()),
            }),
        }
    }

    /// Channel name as first referenced.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn is_joined(&self) -> bool {
        self.inner.state.lock().joined
    }

    pub fn topic(&self) -> Option<String> {
        self.inner.state.lock().topic.clone()
    }

    /// Key used for the last successful join.
    pub fn key(&self) -> Option<String> {
        self.inner.state.lock().key.clone()
    }

    pub fn members(&self) -> Vec<Member> {
        self.inner.state.lock().members.clone()
    }

    /// Find a member by nickname.
    pub fn member(&self, nick: &str) -> Option<Member> {
        self.inner
            .state
            .lock()
            .members
            .iter()
            .find(|m| irc_eq(&m.nick, nick))
            .cloned()
    }

    /// Events addressed to this channel.
    pub fn events(&self) -> &Arc<Emitter> {
        &self.inner.events
    }

    /// Subscribe to events addressed to this channel.
    pub fn on(
        &self,
        name: impl Into<EventName>,
        handler: impl Fn(&Event) + Send + Sync + 'static,
    ) -> Subscription {
        self.inner.events.subscribe(name, handler)
    }

    /// Remove a subscription made with [`Channel::on`].
    pub fn off(&self, subscription: &Subscription) -> bool {
        self.inner.events.unsubscribe(subscription)
    }

    pub(crate) fn set_joined(&self, joined: bool) {
        self.inner.state.lock().joined = joined;
    }

    pub(crate) fn set_key(&self, key: Option<String>) {
        self.inner.state.lock().key = key;
    }

    pub(crate) fn set_topic(&self, topic: Option<String>) {
        self.inner.state.lock().topic = topic.filter(|t| !t.is_empty());
    }

    pub(crate) fn set_members(&self, members: Vec<Member>) {
        self.inner.state.lock().members = members;
    }

    pub(crate) fn add_member(&self, member: Member) {
        let mut state = self.inner.state.lock();
        if !state.members.iter().any(|m| irc_eq(&m.nick, &member.nick)) {
            state.members.push(member);
        }
    }

    /// Returns whether the nick was present.
    pub(crate) fn remove_member(&self, nick: &str) -> bool {
        let mut state = self.inner.state.lock();
        let before = state.members.len();
        state.members.retain(|m| !irc_eq(&m.nick, nick));
        state.members.len() != before
    }

    pub(crate) fn rename_member(&self, old: &str, new: &str) {
        let mut state = self.inner.state.lock();
        if let Some(member) = state.members.iter_mut().find(|m| irc_eq(&m.nick, old)) {
            member.nick = new.to_owned();
        }
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Channel")
            .field("name", &self.inner.name)
            .field("joined", &state.joined)
            .field("members", &state.members.len())
            .finish()
    }
}

impl PartialEq for Channel {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Channel {}
