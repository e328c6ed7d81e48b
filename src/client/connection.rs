//! Connection lifecycle.
//!
//! Each connection runs two tasks:
//!
//! ```text
//!   socket ──read──▶ read_loop ──frame()──▶ Framer ──▶ dispatch ──▶ events
//!                                                           │
//!   socket ◀─write── write_loop ◀──── outbound queue ◀──────┘ send()
//! ```
//!
//! The reader is the only task that dispatches inbound messages, so events
//! from one connection are always published in wire order. Either task
//! ending tears the connection down; teardown cancels the other through a
//! shared token. The line buffer belongs to the connection and is dropped
//! with it, so a reconnect never sees bytes from an earlier socket.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use bytes::BytesMut;
use futures_util::SinkExt;
use parking_lot::Mutex;
use slirc_proto::{IrcCodec, Message, ProtocolError};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::{Decoder, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, warn};

use super::Client;
use crate::config::ServerConfig;
use crate::error::ClientError;
use crate::event::{Event, EventName};
use crate::telemetry::spans;

const READ_CHUNK: usize = 4096;

/// The live half of a session: how to reach the writer and how to stop it.
pub(crate) struct Connection {
    id: u64,
    outbound: mpsc::UnboundedSender<Message>,
    shutdown: CancellationToken,
    framer: Arc<Mutex<Framer>>,
}

/// Inbound line buffer and parser.
pub(crate) struct Framer {
    codec: IrcCodec,
    buffer: BytesMut,
}

impl Framer {
    fn new(server: &ServerConfig) -> Result<Self, ProtocolError> {
        Ok(Self {
            codec: IrcCodec::with_max_len(&server.encoding, server.max_line_len)?,
            buffer: BytesMut::with_capacity(server.max_line_len),
        })
    }

    fn extend(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Next complete message. An error consumes the offending bytes.
    fn next_message(&mut self) -> Result<Option<Message>, ProtocolError> {
        self.codec.decode(&mut self.buffer)
    }
}

impl Client {
    /// Connect to the configured server and register.
    pub async fn connect(&self) -> Result<(), ClientError> {
        if self.is_connected() {
            return Err(ClientError::AlreadyConnected);
        }
        let server = &self.inner.config.server;
        info!(host = %server.host, port = server.port, "connecting");
        let stream = TcpStream::connect((server.host.as_str(), server.port)).await?;
        self.connect_stream(stream).await
    }

    /// Run the session over an already established stream.
    ///
    /// Sends `NICK` and `USER`, then publishes [`EventName::Connect`].
    pub async fn connect_stream<S>(&self, stream: S) -> Result<(), ClientError>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let server = &self.inner.config.server;
        let codec = IrcCodec::with_max_len(&server.encoding, server.max_line_len)?;
        let framer = Arc::new(Mutex::new(Framer::new(server)?));

        let id = self.inner.next_connection.fetch_add(1, Ordering::Relaxed);
        let (outbound, queue) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        {
            let mut slot = self.inner.connection.lock();
            if slot.is_some() {
                return Err(ClientError::AlreadyConnected);
            }
            *slot = Some(Connection {
                id,
                outbound,
                shutdown: shutdown.clone(),
                framer: Arc::clone(&framer),
            });
        }

        let span = spans::connection(&server.host, server.port, &self.nick());
        let (reader, writer) = tokio::io::split(stream);
        tokio::spawn(
            write_loop(
                self.clone(),
                id,
                FramedWrite::new(writer, codec),
                queue,
                shutdown.clone(),
            )
            .instrument(span.clone()),
        );
        tokio::spawn(
            read_loop(self.clone(), id, framer, reader, server.idle_timeout(), shutdown)
                .instrument(span),
        );

        let identity = &self.inner.config.identity;
        self.send(Message::nick(self.nick()));
        self.send(Message::user(&identity.user, &identity.realname));
        info!(host = %server.host, nick = %self.nick(), "connected");
        self.inner.events.publish(&Event::local(
            EventName::Connect,
            [server.host.clone(), server.port.to_string()],
        ));
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.inner.connection.lock().is_some()
    }

    /// Close the connection and cancel every pending operation with `reason`.
    pub fn disconnect(&self, reason: &str) {
        self.teardown(None, reason);
    }

    /// Quit, wait for the server to close, then connect again.
    ///
    /// The connection is closed locally if the server has not hung up within
    /// a grace period.
    pub async fn reconnect(&self, reason: Option<&str>) -> Result<(), ClientError> {
        if self.is_connected() {
            let (tx, rx) = tokio::sync::oneshot::channel();
            let tx = parking_lot::Mutex::new(Some(tx));
            let subscription = self.on(EventName::Disconnect, move |_| {
                if let Some(tx) = tx.lock().take() {
                    let _ = tx.send(());
                }
            });

            self.quit(reason);
            if tokio::time::timeout(super::QUIT_GRACE, rx).await.is_err() {
                warn!("server did not close after QUIT");
                self.disconnect("close");
            }
            self.off(&subscription);
        }
        self.connect().await
    }

    /// Feed raw inbound bytes to the current connection, dispatching every
    /// complete line.
    ///
    /// Lines that are too long or fail to parse are dropped. Bytes received
    /// while disconnected are discarded.
    pub fn receive(&self, chunk: &[u8]) {
        let current = self
            .inner
            .connection
            .lock()
            .as_ref()
            .map(|connection| (connection.id, Arc::clone(&connection.framer)));
        match current {
            Some((id, framer)) => self.frame(id, &framer, chunk),
            None => debug!(len = chunk.len(), "discarding bytes while disconnected"),
        }
    }

    /// Frame `chunk` for connection `id`, stopping once it is no longer
    /// the current one.
    fn frame(&self, id: u64, framer: &Mutex<Framer>, chunk: &[u8]) {
        framer.lock().extend(chunk);
        while self.is_current(id) {
            let next = framer.lock().next_message();
            match next {
                Ok(Some(message)) => {
                    debug!(line = %message.to_string().trim_end(), "recv");
                    self.dispatch(message);
                }
                Ok(None) => break,
                Err(error) => warn!(%error, "dropping inbound line"),
            }
        }
    }

    fn is_current(&self, id: u64) -> bool {
        self.inner
            .connection
            .lock()
            .as_ref()
            .is_some_and(|connection| connection.id == id)
    }

    /// Queue a message for the writer.
    ///
    /// Sending while disconnected tears down whatever is left of the session
    /// instead of reporting an error.
    pub(crate) fn send(&self, message: Message) {
        let outbound = self
            .inner
            .connection
            .lock()
            .as_ref()
            .map(|connection| connection.outbound.clone());

        let Some(outbound) = outbound else {
            warn!(command = %message.command, "cannot send while disconnected");
            self.disconnect("cannot send while disconnected");
            return;
        };

        debug!(line = %message.to_string().trim_end(), "send");
        if outbound.send(message).is_err() {
            self.disconnect("close");
        }
    }

    /// Tear down the current connection, or only connection `only` if given.
    fn teardown(&self, only: Option<u64>, reason: &str) {
        let taken = {
            let mut slot = self.inner.connection.lock();
            match (only, slot.as_ref()) {
                (Some(_), None) => return,
                (Some(id), Some(current)) if current.id != id => return,
                _ => slot.take(),
            }
        };

        if let Some(connection) = &taken {
            connection.shutdown.cancel();
        }
        for channel in self.channels() {
            channel.set_joined(false);
        }
        let cancelled = self.inner.registry.cancel_all(reason);

        if taken.is_some() {
            info!(reason, cancelled, "disconnected");
            self.inner
                .events
                .publish(&Event::local(EventName::Disconnect, [reason]));
        }
    }

    /// Install a connection without socket tasks. Returns what gets sent.
    #[cfg(test)]
    pub(crate) fn attach_test_connection(&self) -> mpsc::UnboundedReceiver<Message> {
        let (outbound, queue) = mpsc::unbounded_channel();
        let id = self.inner.next_connection.fetch_add(1, Ordering::Relaxed);
        let framer = Framer::new(&self.inner.config.server).expect("valid encoding");
        *self.inner.connection.lock() = Some(Connection {
            id,
            outbound,
            shutdown: CancellationToken::new(),
            framer: Arc::new(Mutex::new(framer)),
        });
        queue
    }
}

async fn read_loop<R>(
    client: Client,
    id: u64,
    framer: Arc<Mutex<Framer>>,
    mut reader: R,
    idle: Duration,
    shutdown: CancellationToken,
) where
    R: AsyncRead + Unpin,
{
    let mut chunk = vec![0u8; READ_CHUNK];
    let reason = loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => return,
            read = tokio::time::timeout(idle, reader.read(&mut chunk)) => match read {
                Err(_) => break "timeout",
                Ok(Ok(0)) => break "EOF",
                Ok(Ok(n)) => client.frame(id, &framer, &chunk[..n]),
                Ok(Err(error)) => {
                    warn!(%error, "read failed");
                    break "close";
                }
            },
        }
    };
    client.teardown(Some(id), reason);
}

async fn write_loop<W>(
    client: Client,
    id: u64,
    mut sink: FramedWrite<W, IrcCodec>,
    mut queue: mpsc::UnboundedReceiver<Message>,
    shutdown: CancellationToken,
) where
    W: AsyncWrite + Unpin,
{
    loop {
        tokio::select! {
            biased;
            Some(message) = queue.recv() => {
                if let Err(error) = sink.send(message).await {
                    warn!(%error, "write failed");
                    client.teardown(Some(id), "close");
                    break;
                }
            }
            _ = shutdown.cancelled() => break,
        }
    }
    if let Err(error) = sink.close().await {
        debug!(%error, "close after shutdown");
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{sent, test_client};
    use super::*;
    use crate::correlator::ReplyTemplate;
    use crate::deferred::State;

    #[test]
    fn test_receive_reassembles_split_lines() {
        let client = test_client("me");
        let _queue = client.attach_test_connection();
        let seen = Arc::new(Mutex::new(Vec::new()));
        {
            let seen = seen.clone();
            client.on(EventName::Privmsg, move |e| seen.lock().push(e.params.clone()));
        }

        client.receive(b":nick!u@h PRIVMSG #chan :hel");
        assert!(seen.lock().is_empty());
        client.receive(b"lo world\r\n:nick!u@h PRIVMSG #chan :again\r\n");

        assert_eq!(
            *seen.lock(),
            vec![
                vec!["#chan".to_string(), "hello world".to_string()],
                vec!["#chan".to_string(), "again".to_string()],
            ]
        );
    }

    #[test]
    fn test_bad_lines_do_not_stop_framing() {
        let client = test_client("me");
        let _queue = client.attach_test_connection();
        let pong = client.when_reply(EventName::Pong, None, ReplyTemplate::any());

        let long = format!(":srv NOTICE me :{}\r\n", "x".repeat(600));
        client.receive(long.as_bytes());
        client.receive(b":lonely.prefix\r\n");
        client.receive(b":srv PONG srv :token\r\n");

        assert_eq!(pong.state(), State::Fulfilled);
    }

    #[test]
    fn test_ping_is_answered() {
        let client = test_client("me");
        let mut queue = client.attach_test_connection();
        client.receive(b"PING :irc.example\r\n");
        assert_eq!(sent(&mut queue), vec!["PONG irc.example"]);
    }

    #[test]
    fn test_stale_connection_cannot_tear_down_new_one() {
        let client = test_client("me");
        let _first = client.attach_test_connection();
        client.disconnect("EOF");
        let _second = client.attach_test_connection();

        client.teardown(Some(0), "timeout");
        assert!(client.is_connected());
        client.teardown(Some(1), "timeout");
        assert!(!client.is_connected());
    }

    #[test]
    fn test_partial_line_does_not_survive_reconnect() {
        let client = test_client("me");
        let _first = client.attach_test_connection();
        let seen = Arc::new(Mutex::new(Vec::new()));
        {
            let seen = seen.clone();
            client.on(EventName::Privmsg, move |e| seen.lock().push(e.params.clone()));
        }

        client.receive(b":nick!u@h PRIVMSG #chan :from the old sock");
        let stale = client
            .inner
            .connection
            .lock()
            .as_ref()
            .map(|connection| (connection.id, Arc::clone(&connection.framer)))
            .unwrap();
        client.disconnect("EOF");
        let _second = client.attach_test_connection();

        // A reader that outlived its connection dispatches nothing.
        client.frame(stale.0, &stale.1, b"et\r\n");
        client.receive(b"et\r\n:nick!u@h PRIVMSG #chan :fresh\r\n");

        assert_eq!(*seen.lock(), vec![vec!["#chan".to_string(), "fresh".to_string()]]);
    }

    #[test]
    fn test_receive_while_disconnected_is_discarded() {
        let client = test_client("me");
        let pong = client.when_reply(EventName::Pong, None, ReplyTemplate::any());
        client.receive(b":srv PONG srv :token\r\n");
        assert_eq!(pong.state(), State::Pending);
    }

    #[tokio::test]
    async fn test_connect_stream_registers() {
        use tokio::io::{AsyncBufReadExt, BufReader};

        let client = test_client("me");
        let (local, remote) = tokio::io::duplex(1024);
        client.connect_stream(local).await.unwrap();
        assert!(matches!(
            client.connect_stream(tokio::io::duplex(64).0).await,
            Err(ClientError::AlreadyConnected)
        ));

        let mut lines = BufReader::new(remote).lines();
        let nick = lines.next_line().await.unwrap().unwrap();
        assert_eq!(nick.trim_end(), "NICK me");
        let user = lines.next_line().await.unwrap().unwrap();
        assert_eq!(user.trim_end(), "USER slirc 0 * :Straylight IRC client");

        drop(lines);
        for _ in 0..100 {
            if !client.is_connected() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(!client.is_connected());
    }
}
