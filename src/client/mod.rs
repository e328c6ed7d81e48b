//! The client: one server connection, its channels and its pending
//! operations.
//!
//! - [`connection`]: socket tasks, line framing and disconnect handling
//! - [`routing`]: side effects of inbound messages before they are published
//! - [`join`]: the channel join state machine
//! - [`queries`]: PART, WHO and message watchers

mod connection;
mod join;
mod queries;
mod routing;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::time::Duration;

use parking_lot::Mutex;
use slirc_proto::{Message, irc_eq, irc_to_lower};

use crate::channel::Channel;
use crate::config::{Config, ConfigError, validate};
use crate::correlator::{Correlator, Reply, ReplyTemplate};
use crate::deferred::Deferred;
use crate::error::ClientError;
use crate::event::{Emitter, Event, EventName, Subscription};
use crate::registry::Registry;

pub use self::join::JoinRequest;

use self::connection::Connection;

/// How long [`Client::reconnect`] waits for the server to close after QUIT.
const QUIT_GRACE: Duration = Duration::from_secs(10);

struct ClientInner {
    config: Config,
    nick: Mutex<String>,
    events: Arc<Emitter>,
    registry: Registry,
    correlator: Correlator,
    /// Keyed by RFC 1459 lowercased name.
    channels: Mutex<HashMap<String, Channel>>,
    connection: Mutex<Option<Connection>>,
    next_connection: AtomicU64,
}

/// Handle to an IRC client session.
///
/// Cheap to clone; all clones drive the same connection.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Client {
    /// Create a disconnected client.
    ///
    /// Fails with [`ClientError::Config`] if the configuration does not
    /// validate.
    pub fn new(config: Config) -> Result<Self, ClientError> {
        validate(&config).map_err(ConfigError::Invalid)?;
        let events = Arc::new(Emitter::new());
        let registry = Registry::new();
        let correlator = Correlator::new(Arc::clone(&events), registry.clone());

        Ok(Self {
            inner: Arc::new(ClientInner {
                nick: Mutex::new(config.identity.nick.clone()),
                config,
                events,
                registry,
                correlator,
                channels: Mutex::new(HashMap::new()),
                connection: Mutex::new(None),
                next_connection: AtomicU64::new(0),
            }),
        })
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Current nickname, following server-confirmed NICK changes.
    pub fn nick(&self) -> String {
        self.inner.nick.lock().clone()
    }

    fn is_me(&self, nick: &str) -> bool {
        irc_eq(nick, &self.inner.nick.lock())
    }

    /// The client-wide event table.
    pub fn events(&self) -> &Arc<Emitter> {
        &self.inner.events
    }

    /// Pending operations of this session.
    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    pub fn correlator(&self) -> &Correlator {
        &self.inner.correlator
    }

    /// Subscribe to an event by command name, numeric or local name.
    pub fn on(
        &self,
        name: impl Into<EventName>,
        handler: impl Fn(&Event) + Send + Sync + 'static,
    ) -> Subscription {
        self.inner.events.subscribe(name, handler)
    }

    /// Remove a subscription made with [`Client::on`].
    pub fn off(&self, subscription: &Subscription) -> bool {
        self.inner.events.unsubscribe(subscription)
    }

    /// The channel called `name`, created on first reference.
    pub fn channel(&self, name: &str) -> Channel {
        self.inner
            .channels
            .lock()
            .entry(irc_to_lower(name))
            .or_insert_with(|| Channel::new(name))
            .clone()
    }

    /// The channel called `name`, if the client knows it.
    pub fn find_channel(&self, name: &str) -> Option<Channel> {
        self.inner.channels.lock().get(&irc_to_lower(name)).cloned()
    }

    /// Every channel the client knows.
    pub fn channels(&self) -> Vec<Channel> {
        self.inner.channels.lock().values().cloned().collect()
    }

    fn forget_channel(&self, name: &str) -> Option<Channel> {
        self.inner.channels.lock().remove(&irc_to_lower(name))
    }

    /// See [`Correlator::when_reply`].
    pub fn when_reply(
        &self,
        name: impl Into<EventName>,
        timeout: Option<Duration>,
        template: ReplyTemplate,
    ) -> Deferred<Reply> {
        self.inner.correlator.when_reply(name, timeout, template)
    }

    /// See [`Correlator::when_one_reply_of`].
    pub fn when_one_reply_of(
        &self,
        names: &[EventName],
        timeout: Option<Duration>,
    ) -> Deferred<Reply> {
        self.inner.correlator.when_one_reply_of(names, timeout)
    }

    /// Send an arbitrary command.
    pub fn raw<I, S>(&self, command: &str, args: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.send(Message::new(command, args));
    }

    pub fn privmsg(&self, target: &str, text: &str) {
        self.send(Message::privmsg(target, text));
    }

    pub fn notice(&self, target: &str, text: &str) {
        self.send(Message::notice(target, text));
    }

    /// Send QUIT. The server closes the connection in response.
    pub fn quit(&self, reason: Option<&str>) {
        let reason = reason.unwrap_or(&self.inner.config.identity.quit_reason);
        self.send(Message::quit(reason));
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("nick", &self.nick())
            .field("connected", &self.is_connected())
            .field("pending", &self.inner.registry.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deferred::{Outcome, State};
    use tokio::sync::mpsc;

    pub(crate) fn test_client(nick: &str) -> Client {
        let mut config = Config::default();
        config.identity.nick = nick.to_string();
        Client::new(config).unwrap()
    }

    pub(crate) fn feed(client: &Client, lines: &[&str]) {
        for line in lines {
            client.receive(format!("{line}\r\n").as_bytes());
        }
    }

    pub(crate) fn sent(queue: &mut mpsc::UnboundedReceiver<Message>) -> Vec<String> {
        let mut lines = Vec::new();
        while let Ok(message) = queue.try_recv() {
            lines.push(message.to_string().trim_end().to_string());
        }
        lines
    }

    #[test]
    fn test_channel_lookup_is_case_insensitive() {
        let client = test_client("me");
        let a = client.channel("#Rust[]");
        let b = client.channel("#rust{}");
        assert_eq!(a, b);
        assert_eq!(a.name(), "#Rust[]");
        assert_eq!(client.channels().len(), 1);
        assert!(client.find_channel("#RUST{}").is_some());
        assert!(client.find_channel("#other").is_none());
    }

    #[test]
    fn test_invalid_config_is_refused() {
        let mut config = Config::default();
        config.server.idle_timeout_secs = 0;
        let err = Client::new(config).unwrap_err();
        assert_eq!(err.error_code(), "config");
        assert!(matches!(
            err,
            ClientError::Config(ConfigError::Invalid(ref errors)) if errors.len() == 1
        ));
    }

    #[test]
    fn test_send_while_disconnected_cancels_pending() {
        let client = test_client("me");
        let pending = client.when_reply(EventName::Pong, None, ReplyTemplate::any());

        client.privmsg("#c", "hello");

        assert_eq!(pending.state(), State::Cancelled);
        assert_eq!(client.registry().pending(), 0);
    }

    #[test]
    fn test_raw_and_quit() {
        let client = test_client("me");
        let mut queue = client.attach_test_connection();
        client.raw("MODE", ["#c", "+o", "alice"]);
        client.quit(None);
        client.quit(Some("bye now"));
        assert_eq!(
            sent(&mut queue),
            vec!["MODE #c +o alice", "QUIT :power drained", "QUIT :bye now"]
        );
    }

    #[test]
    fn test_disconnect_marks_channels_and_publishes_once() {
        let client = test_client("me");
        let _queue = client.attach_test_connection();
        client.channel("#a").set_joined(true);

        let reasons = Arc::new(Mutex::new(Vec::new()));
        {
            let reasons = reasons.clone();
            client.on(EventName::Disconnect, move |e| {
                reasons.lock().push(e.param(0).unwrap_or_default().to_string())
            });
        }
        let pending = client.when_reply(EventName::Pong, None, ReplyTemplate::any());

        client.disconnect("EOF");
        client.disconnect("again");

        assert!(!client.channel("#a").is_joined());
        assert_eq!(*reasons.lock(), vec!["EOF"]);
        assert_eq!(
            pending.outcome(),
            Some(Outcome::Cancelled(crate::Reason::from("EOF")))
        );
        assert!(!client.is_connected());
    }
}
