//! Client-side helpers.

use slirc_client::{Client, Config, EventName};
use tokio::sync::oneshot;

use super::server::{MockServer, ServerConn};

/// Config pointing at the mock server.
pub fn test_config(port: u16, nick: &str) -> Config {
    let mut config = Config::default();
    config.server.host = "127.0.0.1".to_string();
    config.server.port = port;
    config.identity.nick = nick.to_string();
    config
}

/// A registered client and the server side of its connection.
pub async fn connected(nick: &str) -> anyhow::Result<(Client, ServerConn, MockServer)> {
    let server = MockServer::bind().await?;
    let client = Client::new(test_config(server.port(), nick))?;
    client.connect().await?;
    let mut conn = server.accept().await?;
    conn.expect_registration(nick).await?;
    Ok((client, conn, server))
}

/// Resolves with the reason of the client's next disconnect.
pub fn disconnect_reason(client: &Client) -> oneshot::Receiver<String> {
    let (tx, rx) = oneshot::channel();
    let tx = parking_lot::Mutex::new(Some(tx));
    client.on(EventName::Disconnect, move |event| {
        if let Some(tx) = tx.lock().take() {
            let _ = tx.send(event.param(0).unwrap_or_default().to_string());
        }
    });
    rx
}
