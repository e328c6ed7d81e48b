//! slirc - connect, join the configured channels and log what happens.

use std::time::Duration;

use slirc_client::{Client, Config, EventName, JoinRequest};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// How long to wait for the server to close after QUIT on Ctrl-C.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "client.toml".to_string());

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    info!(
        host = %config.server.host,
        port = config.server.port,
        nick = %config.identity.nick,
        "Starting slirc"
    );

    let client = Client::new(config)?;

    // Join once registration completes
    {
        let joiner = client.clone();
        client.on(EventName::Numeric(1), move |_| {
            let requests: Vec<JoinRequest> =
                joiner.config().channels.iter().map(JoinRequest::from).collect();
            if requests.is_empty() {
                return;
            }
            joiner
                .join(requests)
                .on_success(|_, channel| info!(channel = %channel.name(), "Joined"))
                .on_error(|_, reason| warn!(%reason, "Join refused"))
                .on_cancel(|_, reason| warn!(%reason, "Join cancelled"))
                .on_finish(|results| info!(channels = results.len(), "Join finished"));
        });
    }

    client.on(EventName::Privmsg, |event| {
        info!(
            from = event.source_nick().unwrap_or("?"),
            target = event.param(0).unwrap_or_default(),
            text = event.param(1).unwrap_or_default(),
            "PRIVMSG"
        );
    });

    let (closed_tx, mut closed_rx) = mpsc::unbounded_channel();
    client.on(EventName::Disconnect, move |event| {
        let _ = closed_tx.send(event.param(0).unwrap_or_default().to_string());
    });

    client.connect().await.map_err(|e| {
        error!(error = %e, code = e.error_code(), "Failed to connect");
        e
    })?;

    tokio::select! {
        reason = closed_rx.recv() => {
            info!(reason = reason.as_deref().unwrap_or("unknown"), "Connection closed");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
            client.quit(None);
            if tokio::time::timeout(SHUTDOWN_GRACE, closed_rx.recv()).await.is_err() {
                client.disconnect("close");
            }
        }
    }

    Ok(())
}
