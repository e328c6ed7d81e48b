//! Reply-correlated requests other than JOIN.

use std::mem;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use slirc_proto::{Message, Response, irc_eq, matches_hostmask};

use super::Client;
use super::join::channel_numeric;
use crate::channel::{Member, WhoEntry};
use crate::correlator::{Expect, Reply};
use crate::deferred::{Deferred, Reason};
use crate::event::EventName;
use crate::telemetry::spans;

impl Client {
    /// Leave a channel.
    ///
    /// Resolves on the server's PART echo, after which the client forgets
    /// the channel. Rejects with `[reply code, channel, server message]` on
    /// ERR_NOSUCHCHANNEL or ERR_NOTONCHANNEL.
    pub fn part(&self, name: &str) -> Deferred<()> {
        let span = spans::query("PART", name);
        let _entered = span.enter();

        let result = self.inner.registry.create::<()>();
        let echo = self.when_reply(
            EventName::Part,
            None,
            [Expect::nick(&self.nick()), Expect::channel(name)]
                .into_iter()
                .collect(),
        );
        let failures = Response::PART_FAILURES.map(EventName::from);
        let failure = self
            .inner
            .correlator
            .when_one_reply_matching(&failures, None, channel_numeric(name));

        {
            let client = Arc::downgrade(&self.inner);
            let (result, name) = (result.clone(), name.to_owned());
            echo.on_success(move |_| {
                if let Some(inner) = client.upgrade() {
                    if let Some(channel) = (Client { inner }).forget_channel(&name) {
                        channel.set_joined(false);
                    }
                }
                result.resolve(());
            });
        }
        {
            let result = result.clone();
            echo.on_cancel(move |reason| {
                result.cancel(reason.clone());
            });
        }
        {
            let result = result.clone();
            failure.on_success(move |reply| {
                result.reject(Reason::new([
                    reply.event.to_string(),
                    reply.param(1).unwrap_or_default().to_owned(),
                    reply.param(2).unwrap_or_default().to_owned(),
                ]));
            });
        }
        result.on_settle(move |outcome| {
            let reason = outcome.reason().cloned().unwrap_or_else(|| Reason::from("parted"));
            echo.cancel(reason.clone());
            failure.cancel(reason);
        });

        self.send(Message::part(name));
        result
    }

    /// List a channel's members with WHO.
    ///
    /// Collects RPL_WHOREPLY entries for the channel until RPL_ENDOFWHO.
    /// If the client knows the channel, the entries also replace its member
    /// list.
    pub fn who(&self, name: &str) -> Deferred<Vec<WhoEntry>> {
        let span = spans::query("WHO", name);
        let _entered = span.enter();

        let result = self.inner.registry.create::<Vec<WhoEntry>>();
        let entries = Arc::new(Mutex::new(Vec::new()));
        let collector = {
            let entries = Arc::clone(&entries);
            let name = name.to_owned();
            self.on(Response::RPL_WHOREPLY, move |event| {
                if !event.param(1).is_some_and(|c| irc_eq(c, &name)) {
                    return;
                }
                if let Some(entry) = WhoEntry::from_params(&event.params) {
                    entries.lock().push(entry);
                }
            })
        };

        let end = self.when_reply(Response::RPL_ENDOFWHO, None, channel_numeric(name));
        {
            let events = Arc::downgrade(&self.inner.events);
            end.on_settle(move |_| {
                if let Some(events) = events.upgrade() {
                    events.unsubscribe(&collector);
                }
            });
        }
        {
            let (result, channel) = (result.clone(), self.find_channel(name));
            end.on_success(move |_| {
                let entries = mem::take(&mut *entries.lock());
                if let Some(channel) = channel {
                    channel.set_members(entries.iter().map(Member::from).collect());
                }
                result.resolve(entries);
            });
        }
        {
            let result = result.clone();
            end.on_cancel(move |reason| {
                result.cancel(reason.clone());
            });
        }
        result.on_settle(move |outcome| {
            if let Some(reason) = outcome.reason() {
                end.cancel(reason.clone());
            }
        });

        self.send(Message::who(name));
        result
    }

    /// Resolve with the text of the next PRIVMSG to `channel` whose sender
    /// matches `mask`.
    ///
    /// A mask without `!` or `@` is a bare nickname.
    pub fn when_message_from(
        &self,
        channel: &str,
        mask: &str,
        timeout: Option<Duration>,
    ) -> Deferred<String> {
        let (channel, mask) = (channel.to_owned(), mask.to_owned());
        let reply = self.inner.correlator.when_matching(
            &[EventName::Privmsg],
            timeout,
            move |event| {
                let to_channel = event.param(0).is_some_and(|t| irc_eq(t, &channel));
                let from_mask = event
                    .prefix
                    .as_deref()
                    .is_some_and(|prefix| matches_hostmask(&mask, prefix));
                (to_channel && from_mask).then(|| Reply {
                    event: event.name.clone(),
                    args: event.args(),
                })
            },
        );
        reply.map(|reply| reply.param(1).unwrap_or_default().to_owned())
    }
}
