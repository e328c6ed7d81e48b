//! Channel joins.
//!
//! Every requested channel gets one join attempt racing two watchers:
//!
//! - success: our own JOIN echo for the channel
//! - failure: the first of 471/473/474/475 naming the channel
//!
//! Alongside, RPL_NAMREPLY lines for the channel are collected until
//! RPL_ENDOFNAMES and stored as the member list. Whichever watcher wins
//! cancels the other; an attempt that fails or is cancelled also drops the
//! NAMES collection. All attempts of one call report through a single
//! [`Aggregate`], and the whole call sends a single JOIN.

use std::mem;
use std::sync::Arc;

use parking_lot::Mutex;
use slirc_proto::{Message, Response, irc_eq};
use tracing::debug;

use super::Client;
use crate::aggregate::Aggregate;
use crate::channel::{Channel, Member};
use crate::config::ChannelConfig;
use crate::correlator::{Expect, ReplyTemplate};
use crate::deferred::{Deferred, Outcome, Reason};
use crate::event::EventName;
use crate::telemetry::spans;

/// A channel to join and its key, if it has one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JoinRequest {
    pub channel: String,
    pub key: Option<String>,
}

impl JoinRequest {
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            key: None,
        }
    }

    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }
}

impl From<&str> for JoinRequest {
    fn from(channel: &str) -> Self {
        Self::new(channel)
    }
}

impl From<String> for JoinRequest {
    fn from(channel: String) -> Self {
        Self::new(channel)
    }
}

impl From<(&str, &str)> for JoinRequest {
    fn from((channel, key): (&str, &str)) -> Self {
        Self::new(channel).with_key(key)
    }
}

impl From<&ChannelConfig> for JoinRequest {
    fn from(config: &ChannelConfig) -> Self {
        Self {
            channel: config.name.clone(),
            key: config.key.clone(),
        }
    }
}

/// `[any prefix, any nick, this channel]`, the shape of channel numerics.
pub(super) fn channel_numeric(name: &str) -> ReplyTemplate {
    [Expect::Any, Expect::Any, Expect::channel(name)]
        .into_iter()
        .collect()
}

impl Client {
    /// Join channels with one JOIN command.
    ///
    /// Slot `i` of the returned aggregate settles with the outcome for
    /// request `i`: the joined [`Channel`], or a rejection reason
    /// `[reply code, channel, server message]`. Keyed channels are listed
    /// first on the wire so keys line up with their channels.
    pub fn join<I, R>(&self, requests: I) -> Aggregate<Channel>
    where
        I: IntoIterator<Item = R>,
        R: Into<JoinRequest>,
    {
        let requests: Vec<JoinRequest> = requests.into_iter().map(Into::into).collect();
        let aggregate = Aggregate::new();
        if requests.is_empty() {
            aggregate.seal();
            return aggregate;
        }

        for request in &requests {
            aggregate.add(self.join_attempt(request));
        }

        let (keyed, keyless): (Vec<_>, Vec<_>) =
            requests.iter().partition(|request| request.key.is_some());
        let channels = keyed
            .iter()
            .chain(&keyless)
            .map(|request| request.channel.as_str());
        let keys = keyed.iter().filter_map(|request| request.key.as_deref());
        self.send(Message::join(channels, keys));

        aggregate.seal();
        aggregate
    }

    fn join_attempt(&self, request: &JoinRequest) -> Deferred<Channel> {
        let span = spans::join(&request.channel);
        let _entered = span.enter();

        let channel = self.channel(&request.channel);
        let name = request.channel.as_str();
        let attempt = self.inner.registry.create::<Channel>();

        let names = Arc::new(Mutex::new(Vec::new()));
        let collector = {
            let names = Arc::clone(&names);
            let name = name.to_owned();
            self.on(Response::RPL_NAMREPLY, move |event| {
                if event.param(2).is_some_and(|c| irc_eq(c, &name)) {
                    let list = event.param(3).unwrap_or_default();
                    names.lock().extend(Member::parse_names(list));
                }
            })
        };

        let end_of_names = self.when_reply(Response::RPL_ENDOFNAMES, None, channel_numeric(name));
        {
            let events = Arc::downgrade(&self.inner.events);
            end_of_names.on_settle(move |_| {
                if let Some(events) = events.upgrade() {
                    events.unsubscribe(&collector);
                }
            });
        }
        {
            let channel = channel.clone();
            end_of_names.on_success(move |_| {
                let members = mem::take(&mut *names.lock());
                debug!(channel = %channel.name(), count = members.len(), "member list complete");
                channel.set_members(members);
            });
        }

        let success = self.when_reply(
            EventName::Join,
            None,
            [Expect::nick(&self.nick()), Expect::channel(name)]
                .into_iter()
                .collect(),
        );
        let failures = Response::JOIN_FAILURES.map(EventName::from);
        let failure = self
            .inner
            .correlator
            .when_one_reply_matching(&failures, None, channel_numeric(name));

        {
            let (attempt, channel) = (attempt.clone(), channel.clone());
            let key = request.key.clone();
            success.on_success(move |_| {
                channel.set_joined(true);
                channel.set_key(key);
                debug!(channel = %channel.name(), "joined");
                attempt.resolve(channel);
            });
        }
        {
            let attempt = attempt.clone();
            success.on_cancel(move |reason| {
                attempt.cancel(reason.clone());
            });
        }
        {
            let attempt = attempt.clone();
            failure.on_success(move |reply| {
                let reason = Reason::new([
                    reply.event.to_string(),
                    reply.param(1).unwrap_or_default().to_owned(),
                    reply.param(2).unwrap_or_default().to_owned(),
                ]);
                debug!(%reason, "join refused");
                attempt.reject(reason);
            });
        }

        // The loser of the race is cancelled here, once the attempt is final.
        attempt.on_settle(move |outcome| {
            let reason = outcome
                .reason()
                .cloned()
                .unwrap_or_else(|| Reason::from("joined"));
            success.cancel(reason.clone());
            failure.cancel(reason.clone());
            if !matches!(outcome, Outcome::Fulfilled(_)) {
                end_of_names.cancel(reason);
            }
        });

        attempt
    }
}
