//! Inbound message routing.
//!
//! Client state is updated from each message before it is published, so
//! subscribers always observe the state the message produced.

use slirc_proto::{Ctcp, CtcpKind, Message, Response, is_channel_name};
use tracing::debug;

use super::Client;
use crate::channel::Member;
use crate::event::{Event, EventName};

const RPL_NOTOPIC: u16 = Response::RPL_NOTOPIC.code();
const RPL_TOPIC: u16 = Response::RPL_TOPIC.code();

impl Client {
    pub(super) fn dispatch(&self, message: Message) {
        let mut event = Event::from_message(&message);

        match event.name {
            EventName::Ping => {
                let token = event.param(0).unwrap_or_default();
                self.send(Message::pong(token));
            }
            EventName::Nick => self.track_nick(&event),
            EventName::Join => self.track_join(&event),
            EventName::Part => self.track_part(&event),
            EventName::Kick => self.track_kick(&event),
            EventName::Quit => self.track_quit(&event),
            EventName::Topic => self.track_topic(event.param(0), event.param(1)),
            EventName::Numeric(RPL_TOPIC) => self.track_topic(event.param(1), event.param(2)),
            EventName::Numeric(RPL_NOTOPIC) => self.track_topic(event.param(1), None),
            EventName::Privmsg => self.route_privmsg(&mut event),
            _ => {}
        }

        if event.channel.is_none() {
            let target = match event.name {
                EventName::Numeric(_) => event.param(1),
                _ => event.param(0),
            };
            event.channel = target
                .filter(|t| is_channel_name(t))
                .and_then(|t| self.find_channel(t));
        }

        if let Some(channel) = &event.channel {
            channel.events().publish(&event);
        }
        self.inner.events.publish(&event);
    }

    fn track_nick(&self, event: &Event) {
        let (Some(old), Some(new)) = (event.source_nick(), event.param(0)) else {
            return;
        };
        if self.is_me(old) {
            debug!(%old, %new, "nick changed");
            *self.inner.nick.lock() = new.to_owned();
        }
        for channel in self.channels() {
            channel.rename_member(old, new);
        }
    }

    fn track_join(&self, event: &Event) {
        let (Some(nick), Some(name)) = (event.source_nick(), event.param(0)) else {
            return;
        };
        if self.is_me(nick) {
            self.channel(name).set_joined(true);
        } else if let Some(channel) = self.find_channel(name) {
            channel.add_member(Member {
                nick: nick.to_owned(),
                op: false,
                voice: false,
            });
        }
    }

    fn track_part(&self, event: &Event) {
        let (Some(nick), Some(name)) = (event.source_nick(), event.param(0)) else {
            return;
        };
        let Some(channel) = self.find_channel(name) else {
            return;
        };
        if self.is_me(nick) {
            channel.set_joined(false);
        } else {
            channel.remove_member(nick);
        }
    }

    fn track_kick(&self, event: &Event) {
        let (Some(name), Some(victim)) = (event.param(0), event.param(1)) else {
            return;
        };
        let Some(channel) = self.find_channel(name) else {
            return;
        };
        if self.is_me(victim) {
            debug!(channel = %name, by = ?event.source_nick(), "kicked");
            channel.set_joined(false);
        } else {
            channel.remove_member(victim);
        }
    }

    fn track_quit(&self, event: &Event) {
        if let Some(nick) = event.source_nick() {
            for channel in self.channels() {
                channel.remove_member(nick);
            }
        }
    }

    fn track_topic(&self, name: Option<&str>, topic: Option<&str>) {
        if let Some(channel) = name.and_then(|n| self.find_channel(n)) {
            channel.set_topic(topic.map(str::to_owned));
        }
    }

    /// A message to our own nick is addressed back to its sender, so replies
    /// can go to `param(0)` whichever way the message arrived.
    fn route_privmsg(&self, event: &mut Event) {
        let Some(sender) = event.source_nick().map(str::to_owned) else {
            return;
        };
        let Some(target) = event.params.first_mut() else {
            return;
        };
        if self.is_me(target) {
            *target = sender.clone();
        } else if is_channel_name(target) {
            event.channel = Some(self.channel(target));
        }

        if let Some(text) = event.param(1).filter(|t| Ctcp::is_ctcp(t)) {
            self.answer_ctcp(&sender, text);
        }
    }

    fn answer_ctcp(&self, sender: &str, text: &str) {
        let Some(query) = Ctcp::parse(text) else {
            return;
        };
        let reply = match query.kind {
            CtcpKind::Version => {
                Ctcp::version_reply(&self.inner.config.identity.version).to_string()
            }
            CtcpKind::Ping => query.to_string(),
            CtcpKind::Time => {
                let now = chrono::Local::now().to_rfc2822();
                Ctcp::time_reply(&now).to_string()
            }
            CtcpKind::Action | CtcpKind::Errmsg => return,
            _ => Ctcp::unknown_query_reply(text),
        };
        debug!(%sender, kind = %query.kind, "answering CTCP");
        self.notice(sender, &reply);
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{feed, sent, test_client};
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn test_private_message_is_addressed_to_sender() {
        let client = test_client("Me");
        let _queue = client.attach_test_connection();
        let targets = Arc::new(Mutex::new(Vec::new()));
        {
            let targets = targets.clone();
            client.on(EventName::Privmsg, move |e| {
                let target = e.param(0).unwrap_or_default().to_string();
                targets.lock().push((target, e.channel.is_some()))
            });
        }

        feed(
            &client,
            &[":alice!a@h PRIVMSG me :psst", ":bob!b@h PRIVMSG #Chan :hi all"],
        );

        assert_eq!(
            *targets.lock(),
            vec![("alice".to_string(), false), ("#Chan".to_string(), true)]
        );
        assert!(client.find_channel("#chan").is_some());
    }

    #[test]
    fn test_channel_events_fire_before_client_events() {
        let client = test_client("me");
        let _queue = client.attach_test_connection();
        let channel = client.channel("#c");
        let order = Arc::new(Mutex::new(Vec::new()));
        {
            let order = order.clone();
            client.on(EventName::Topic, move |_| order.lock().push("client"));
        }
        {
            let order = order.clone();
            channel.on(EventName::Topic, move |e| {
                assert!(e.channel.is_some());
                order.lock().push("channel")
            });
        }

        feed(&client, &[":alice!a@h TOPIC #c :new topic"]);

        assert_eq!(*order.lock(), vec!["channel", "client"]);
        assert_eq!(channel.topic().as_deref(), Some("new topic"));
    }

    #[test]
    fn test_topic_numerics() {
        let client = test_client("me");
        let _queue = client.attach_test_connection();
        let channel = client.channel("#c");

        feed(&client, &[":srv 332 me #c :from the server"]);
        assert_eq!(channel.topic().as_deref(), Some("from the server"));

        feed(&client, &[":srv 331 me #c :No topic is set"]);
        assert_eq!(channel.topic(), None);
    }

    #[test]
    fn test_ctcp_replies() {
        let client = test_client("me");
        let mut queue = client.attach_test_connection();

        feed(
            &client,
            &[
                ":alice!a@h PRIVMSG me :\x01VERSION\x01",
                ":alice!a@h PRIVMSG #c :\x01PING 12345\x01",
                ":alice!a@h PRIVMSG #c :\x01ACTION waves\x01",
                ":alice!a@h PRIVMSG me :\x01FINGER\x01",
            ],
        );

        let version = client.config().identity.version.clone();
        assert_eq!(
            sent(&mut queue),
            vec![
                format!("NOTICE alice :\x01VERSION {version}\x01"),
                "NOTICE alice :\x01PING 12345\x01".to_string(),
                "NOTICE alice :\x01ERRMSG FINGER :unknown query\x01".to_string(),
            ]
        );
    }

    #[test]
    fn test_ctcp_time() {
        let client = test_client("me");
        let mut queue = client.attach_test_connection();
        feed(&client, &[":alice!a@h PRIVMSG me :\x01TIME\x01"]);

        let lines = sent(&mut queue);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("NOTICE alice :\x01TIME "));
    }

    #[test]
    fn test_member_tracking() {
        let client = test_client("me");
        let _queue = client.attach_test_connection();

        feed(&client, &[":me!u@h JOIN #c"]);
        let channel = client.find_channel("#c").unwrap();
        assert!(channel.is_joined());

        feed(
            &client,
            &[
                ":alice!a@h JOIN #c",
                ":bob!b@h JOIN #c",
                ":carol!c@h JOIN #c",
                ":alice!a@h NICK alicia",
                ":bob!b@h PART #c :later",
                ":me!u@h KICK #c carol :out",
            ],
        );
        let nicks: Vec<_> = channel.members().into_iter().map(|m| m.nick).collect();
        assert_eq!(nicks, vec!["alicia"]);

        feed(&client, &[":alicia!a@h QUIT :gone"]);
        assert!(channel.members().is_empty());

        feed(&client, &[":op!o@h KICK #c me :bye"]);
        assert!(!channel.is_joined());
    }

    #[test]
    fn test_own_nick_change() {
        let client = test_client("me");
        let _queue = client.attach_test_connection();
        feed(&client, &[":someone!x@h NICK other", ":ME!u@h NICK newme"]);
        assert_eq!(client.nick(), "newme");
    }
}
