//! Mock IRC server.
//!
//! Listens on an ephemeral localhost port and lets a test play the server
//! side of a connection line by line.

use std::time::Duration;

use slirc_proto::Message;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::TcpListener;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::time::timeout;

/// A listening mock server.
pub struct MockServer {
    listener: TcpListener,
}

impl MockServer {
    /// Bind to `127.0.0.1` on a free port.
    pub async fn bind() -> anyhow::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        Ok(Self { listener })
    }

    pub fn port(&self) -> u16 {
        self.listener.local_addr().map(|a| a.port()).unwrap_or(0)
    }

    /// Accept the next client connection.
    pub async fn accept(&self) -> anyhow::Result<ServerConn> {
        let (stream, _) = timeout(Duration::from_secs(5), self.listener.accept()).await??;
        let (read_half, write_half) = stream.into_split();
        Ok(ServerConn {
            reader: BufReader::new(read_half),
            writer: BufWriter::new(write_half),
        })
    }
}

/// The server side of one client connection.
pub struct ServerConn {
    reader: BufReader<OwnedReadHalf>,
    writer: BufWriter<OwnedWriteHalf>,
}

impl ServerConn {
    /// Send a raw IRC line.
    pub async fn send_raw(&mut self, line: &str) -> anyhow::Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        if !line.ends_with("\r\n") {
            self.writer.write_all(b"\r\n").await?;
        }
        self.writer.flush().await?;
        Ok(())
    }

    /// Send several raw lines.
    pub async fn send_lines(&mut self, lines: &[&str]) -> anyhow::Result<()> {
        for line in lines {
            self.send_raw(line).await?;
        }
        Ok(())
    }

    /// Receive a single message from the client.
    pub async fn recv(&mut self) -> anyhow::Result<Message> {
        self.recv_timeout(Duration::from_secs(5)).await
    }

    /// Receive a message with a timeout.
    pub async fn recv_timeout(&mut self, dur: Duration) -> anyhow::Result<Message> {
        let mut line = String::new();
        let n = timeout(dur, self.reader.read_line(&mut line)).await??;
        if n == 0 {
            anyhow::bail!("client closed the connection");
        }
        line.parse::<Message>()
            .map_err(|e| anyhow::anyhow!("Parse error: {}", e))
    }

    /// Receive messages until one has the given command, returning it.
    pub async fn recv_command(&mut self, command: &str) -> anyhow::Result<Message> {
        loop {
            let msg = self.recv().await?;
            if msg.command.eq_ignore_ascii_case(command) {
                return Ok(msg);
            }
        }
    }

    /// Read NICK and USER, then greet the client with RPL_WELCOME.
    pub async fn expect_registration(&mut self, nick: &str) -> anyhow::Result<()> {
        let nick_msg = self.recv().await?;
        anyhow::ensure!(nick_msg.command == "NICK", "expected NICK, got {nick_msg}");
        anyhow::ensure!(nick_msg.param(0) == Some(nick), "unexpected nick {nick_msg}");

        let user_msg = self.recv().await?;
        anyhow::ensure!(user_msg.command == "USER", "expected USER, got {user_msg}");

        self.send_raw(&format!(":mock.server 001 {nick} :Welcome to the mock network"))
            .await
    }

    /// Round-trip a PING so every line sent before it has been dispatched.
    pub async fn sync(&mut self) -> anyhow::Result<()> {
        self.send_raw("PING :sync").await?;
        let pong = self.recv_command("PONG").await?;
        anyhow::ensure!(pong.param(0) == Some("sync"), "unexpected {pong}");
        Ok(())
    }

    /// Wait until the client closes its side.
    pub async fn expect_closed(&mut self) -> anyhow::Result<()> {
        loop {
            let mut line = String::new();
            let n = timeout(Duration::from_secs(5), self.reader.read_line(&mut line)).await??;
            if n == 0 {
                return Ok(());
            }
        }
    }

    /// Drop the connection from the server side.
    pub fn close(self) {}
}
