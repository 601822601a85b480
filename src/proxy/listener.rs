use std::net::SocketAddr;

use anyhow::{Result, anyhow};
use thiserror::Error;
use tokio::net::{TcpListener, TcpSocket, lookup_host};
use tracing::{debug, error, info};

use super::{AppContext, http};
use crate::settings::Settings;

/// Failure to bring up the listening socket. Fatal: the process exits.
#[derive(Debug, Error)]
#[error("failed {stage} listener on {address}")]
pub struct StartupError {
    pub stage: &'static str,
    pub address: String,
    #[source]
    pub source: std::io::Error,
}

impl StartupError {
    fn new(stage: &'static str, address: impl ToString, source: std::io::Error) -> Self {
        Self {
            stage,
            address: address.to_string(),
            source,
        }
    }
}

pub async fn start_listener(app: AppContext) -> Result<()> {
    let listener = bind_listener(&app.settings).await?;
    serve_listener(listener, app).await
}

/// Resolves the configured host and binds a listening socket with the configured backlog.
pub async fn bind_listener(settings: &Settings) -> Result<TcpListener> {
    let requested = format!("{}:{}", settings.listen_host, settings.listen_port);
    let bind_addr: SocketAddr = lookup_host((settings.listen_host.as_str(), settings.listen_port))
        .await
        .map_err(|err| StartupError::new("resolving", &requested, err))?
        .next()
        .ok_or_else(|| anyhow!("listen address {requested} did not resolve"))?;

    let socket = if bind_addr.is_ipv4() {
        TcpSocket::new_v4()
    } else {
        TcpSocket::new_v6()
    }
    .map_err(|err| StartupError::new("creating", bind_addr, err))?;
    socket
        .set_reuseaddr(true)
        .map_err(|err| StartupError::new("configuring", bind_addr, err))?;
    socket
        .bind(bind_addr)
        .map_err(|err| StartupError::new("binding", bind_addr, err))?;
    let listener = socket
        .listen(settings.listen_backlog)
        .map_err(|err| StartupError::new("starting", bind_addr, err))?;

    let local_addr = listener.local_addr().unwrap_or(bind_addr);
    info!(address = %local_addr, backlog = settings.listen_backlog, "proxy listener started");
    Ok(listener)
}

/// Accepts connections forever, one task per connection. Accept failures are logged and skipped.
pub async fn serve_listener(listener: TcpListener, app: AppContext) -> Result<()> {
    loop {
        let (stream, peer_addr) = match listener.accept().await {
            Ok(pair) => pair,
            Err(err) => {
                error!(error = %err, "failed to accept incoming connection");
                continue;
            }
        };
        info!(peer = %peer_addr, "accepted connection");
        if let Err(err) = stream.set_nodelay(true) {
            debug!(peer = %peer_addr, error = %err, "failed to set TCP_NODELAY on client stream");
        }
        let connection_app = app.clone();
        tokio::spawn(async move {
            let state = http::serve(stream, peer_addr, &connection_app).await;
            debug!(peer = %peer_addr, last_state = %state, "connection finished");
        });
    }
}
