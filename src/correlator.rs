//! Tying asynchronous server replies back to the operation that asked.
//!
//! A watcher subscribes to one or more event names and resolves a
//! [`Deferred<Reply>`] on the first event it accepts. The subscription is
//! removed as soon as the deferred settles for any reason, so a watcher
//! never outlives its result.

use std::sync::{Arc, Weak};
use std::time::Duration;

use regex::Regex;
use slirc_proto::irc_eq;
use tracing::{debug, trace};

use crate::deferred::Deferred;
use crate::event::{Emitter, Event, EventName};
use crate::registry::Registry;

/// Expectation for one argument position.
#[derive(Clone, Debug)]
pub enum Expect {
    /// Matches anything, including a missing position.
    Any,
    /// Matches the exact string.
    Literal(String),
    /// Matches when the regex finds a match.
    Pattern(Regex),
    /// Matches a channel name under RFC 1459 casemapping.
    Channel(String),
    /// Matches a prefix whose nickname is this one under RFC 1459 casemapping.
    Nick(String),
}

impl Expect {
    pub fn channel(name: &str) -> Self {
        Self::Channel(name.to_owned())
    }

    pub fn nick(nick: &str) -> Self {
        Self::Nick(nick.to_owned())
    }

    /// Test an argument, `None` meaning the event has no such position.
    pub fn matches(&self, value: Option<&str>) -> bool {
        match (self, value) {
            (Self::Any, _) => true,
            (_, None) => false,
            (Self::Literal(expected), Some(value)) => expected == value,
            (Self::Pattern(re), Some(value)) => re.is_match(value),
            (Self::Channel(name), Some(value)) => irc_eq(name, value),
            (Self::Nick(nick), Some(value)) => {
                let end = value.find(['!', '@']).unwrap_or(value.len());
                irc_eq(nick, &value[..end])
            }
        }
    }
}

impl From<&str> for Expect {
    /// An empty string means "anything".
    fn from(s: &str) -> Self {
        if s.is_empty() {
            Self::Any
        } else {
            Self::Literal(s.to_owned())
        }
    }
}

impl From<String> for Expect {
    fn from(s: String) -> Self {
        if s.is_empty() {
            Self::Any
        } else {
            Self::Literal(s)
        }
    }
}

impl From<Regex> for Expect {
    fn from(re: Regex) -> Self {
        Self::Pattern(re)
    }
}

/// Positional match template plus caller-known context values.
///
/// Position 0 is the event prefix. Positions past the end of the template
/// are unconstrained.
#[derive(Clone, Debug, Default)]
pub struct ReplyTemplate {
    expect: Vec<Expect>,
    context: Vec<String>,
}

impl ReplyTemplate {
    /// A template accepting any event.
    pub fn any() -> Self {
        Self::default()
    }

    /// Append an expectation for the next position.
    #[must_use]
    pub fn expect(mut self, expect: impl Into<Expect>) -> Self {
        self.expect.push(expect.into());
        self
    }

    /// Append a value to report after the event's own arguments.
    #[must_use]
    pub fn context(mut self, value: impl Into<String>) -> Self {
        self.context.push(value.into());
        self
    }

    /// Whether every position matches.
    pub fn matches(&self, event: &Event) -> bool {
        self.expect
            .iter()
            .enumerate()
            .all(|(i, expect)| expect.matches(event.arg(i)))
    }

    /// The reply for `event` if it matches.
    pub fn reply_for(&self, event: &Event) -> Option<Reply> {
        if !self.matches(event) {
            return None;
        }
        let mut args = event.args();
        args.extend(self.context.iter().cloned());
        Some(Reply {
            event: event.name.clone(),
            args,
        })
    }
}

impl<E: Into<Expect>> FromIterator<E> for ReplyTemplate {
    fn from_iter<I: IntoIterator<Item = E>>(iter: I) -> Self {
        Self {
            expect: iter.into_iter().map(Into::into).collect(),
            context: Vec::new(),
        }
    }
}

/// A matched server reply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reply {
    /// Which event matched.
    pub event: EventName,
    /// `[prefix, params..., context...]`.
    pub args: Vec<String>,
}

impl Reply {
    /// The sender prefix (`""` when the message had none).
    pub fn prefix(&self) -> &str {
        self.args.first().map_or("", String::as_str)
    }

    /// Argument at `index`, prefix included.
    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }

    /// Message param at `index` (argument `index + 1`).
    pub fn param(&self, index: usize) -> Option<&str> {
        self.arg(index + 1)
    }
}

/// Creates reply watchers over one event table.
#[derive(Clone, Debug)]
pub struct Correlator {
    events: Arc<Emitter>,
    registry: Registry,
}

impl Correlator {
    /// Watch `events`, tracking each watcher in `registry`.
    pub fn new(events: Arc<Emitter>, registry: Registry) -> Self {
        Self { events, registry }
    }

    /// Resolve on the first `name` event matching `template`.
    pub fn when_reply(
        &self,
        name: impl Into<EventName>,
        timeout: Option<Duration>,
        template: ReplyTemplate,
    ) -> Deferred<Reply> {
        self.when_one_reply_matching(&[name.into()], timeout, template)
    }

    /// Resolve on the first event named in `names`.
    pub fn when_one_reply_of(
        &self,
        names: &[EventName],
        timeout: Option<Duration>,
    ) -> Deferred<Reply> {
        self.when_one_reply_matching(names, timeout, ReplyTemplate::any())
    }

    /// Resolve on the first event named in `names` that matches `template`.
    ///
    /// Events that do not match leave the watcher armed.
    pub fn when_one_reply_matching(
        &self,
        names: &[EventName],
        timeout: Option<Duration>,
        template: ReplyTemplate,
    ) -> Deferred<Reply> {
        let template = Arc::new(template);
        self.when_matching(names, timeout, move |event| template.reply_for(event))
    }

    /// Resolve with whatever `matcher` returns first for an event in `names`.
    pub fn when_matching<F>(
        &self,
        names: &[EventName],
        timeout: Option<Duration>,
        matcher: F,
    ) -> Deferred<Reply>
    where
        F: Fn(&Event) -> Option<Reply> + Send + Sync + 'static,
    {
        let deferred = self.registry.create::<Reply>();
        let matcher = Arc::new(matcher);

        let subscriptions: Vec<_> = names
            .iter()
            .map(|name| {
                let deferred = deferred.clone();
                let matcher = Arc::clone(&matcher);
                self.events.subscribe(name.clone(), move |event| {
                    if !deferred.is_pending() {
                        return;
                    }
                    if let Some(reply) = matcher(event) {
                        trace!(event = %reply.event, "reply matched");
                        deferred.resolve(reply);
                    }
                })
            })
            .collect();

        let events: Weak<Emitter> = Arc::downgrade(&self.events);
        deferred.on_settle(move |_| {
            if let Some(events) = events.upgrade() {
                for subscription in &subscriptions {
                    events.unsubscribe(subscription);
                }
            }
        });

        if let Some(after) = timeout {
            debug!(?after, ?names, "watching with timeout");
            deferred.timeout(after);
        }
        deferred
    }
}
