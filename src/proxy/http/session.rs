use std::fmt;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use anyhow::{Error, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::logging::SessionLogBuilder;
use crate::proxy::AppContext;
use crate::proxy::cache::{CacheKey, CacheLookup, classify_response};
use crate::proxy::request::{Request, parse_request_bytes, request_line_end};
use crate::proxy::session_error::{classify_session_error, log_session_error};
use crate::proxy::target::ResolvedTarget;
use crate::util::timeout_with_context;

const READ_CHUNK: usize = 8 * 1024;

/// Lifecycle of one client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Accepted,
    RequestReceived,
    CacheHit,
    CacheMiss,
    OriginContacted,
    ResponseClassified,
    Cached,
    Closed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Accepted => "accepted",
            SessionState::RequestReceived => "request_received",
            SessionState::CacheHit => "cache_hit",
            SessionState::CacheMiss => "cache_miss",
            SessionState::OriginContacted => "origin_contacted",
            SessionState::ResponseClassified => "response_classified",
            SessionState::Cached => "cached",
            SessionState::Closed => "closed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

struct Session<'a, S> {
    stream: S,
    peer: SocketAddr,
    app: &'a AppContext,
    state: SessionState,
    log: SessionLogBuilder,
}

/// Serves a single request on `stream` and closes it. Returns the last state reached before
/// the connection was closed.
pub async fn serve<S>(stream: S, peer: SocketAddr, app: &AppContext) -> SessionState
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let start = Instant::now();
    let mut session = Session {
        stream,
        peer,
        app,
        state: SessionState::Accepted,
        log: SessionLogBuilder::new(peer),
    };

    if let Err(err) = session.drive().await {
        session.report(&err);
    }
    let reached = session.state;
    session.close().await;

    let mut log = session.log;
    log.state(reached.as_str()).elapsed(start.elapsed());
    log.log();
    reached
}

impl<S> Session<'_, S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    fn advance(&mut self, next: SessionState) {
        debug!(peer = %self.peer, from = %self.state, to = %next, "session state change");
        self.state = next;
    }

    fn report(&mut self, err: &Error) {
        let kind = classify_session_error(err);
        log_session_error(&kind, self.peer, err);
        self.log.error_reason(kind.reason());
    }

    async fn drive(&mut self) -> Result<()> {
        let settings = &self.app.settings;
        let raw = read_request(
            &mut self.stream,
            settings.max_request_size,
            settings.client_timeout(),
        )
        .await?;
        self.advance(SessionState::RequestReceived);
        let request = parse_request_bytes(&raw)?;
        self.log.method(request.method.as_str());
        info!(
            peer = %self.peer,
            method = %request.method,
            target = %request.target,
            version = %request.version,
            "request received"
        );

        let target = ResolvedTarget::resolve(&request.target);
        self.log
            .host(target.hostname.as_str())
            .path(target.resource_path.as_str());
        let key = CacheKey::for_target(&target);
        match &key {
            Some(key) => info!(
                host = %target.hostname,
                path = %target.resource_path,
                location = %self.app.cache.location(key).display(),
                "resolved cache location"
            ),
            None => info!(
                host = %target.hostname,
                path = %target.resource_path,
                "target has no cache location"
            ),
        }

        let lookup = match &key {
            Some(key) => self.app.cache.lookup(key).await,
            None => CacheLookup::Miss,
        };
        self.log.cache_lookup(lookup.as_str());
        match lookup {
            CacheLookup::Hit(bytes) => {
                self.advance(SessionState::CacheHit);
                info!(peer = %self.peer, bytes = bytes.len(), "serving response from cache");
                self.send(&bytes).await
            }
            CacheLookup::Miss => {
                self.advance(SessionState::CacheMiss);
                self.forward(&request, &target, key.as_ref()).await
            }
        }
    }

    async fn forward(
        &mut self,
        request: &Request,
        target: &ResolvedTarget,
        key: Option<&CacheKey>,
    ) -> Result<()> {
        let exchange = self.app.origin.fetch(request, target).await?;
        self.advance(SessionState::OriginContacted);
        self.log
            .upstream_addr(exchange.addr.to_string())
            .status_line(exchange.response.status_line.as_str());
        let response = exchange.response;

        // The complete origin response is persisted even if the client has gone away.
        if let Err(err) = self.send(&response.raw).await {
            warn!(peer = %self.peer, error = %format!("{err:#}"), "failed to deliver response to client");
            self.log.error_reason("client_write");
        }

        let admission = classify_response(&response, self.app.settings.status_match);
        self.advance(SessionState::ResponseClassified);

        let Some(key) = key else {
            self.log.cache_store("uncacheable");
            return Ok(());
        };
        if let Some(skip) = admission.skip {
            debug!(key = %key, reason = skip.as_str(), "response not admitted");
        }
        let outcome = self
            .app
            .cache
            .write(key, &response.raw, admission.should_cache)
            .await?;
        self.log.cache_store(outcome.as_str());
        self.advance(SessionState::Cached);
        Ok(())
    }

    async fn send(&mut self, bytes: &[u8]) -> Result<()> {
        let timeout_dur = self.app.settings.client_timeout();
        timeout_with_context(
            timeout_dur,
            self.stream.write_all(bytes),
            "writing response to client",
        )
        .await?;
        timeout_with_context(timeout_dur, self.stream.flush(), "flushing client stream").await?;
        self.log.bytes_out(bytes.len() as u64);
        Ok(())
    }

    async fn close(&mut self) {
        let timeout_dur = self.app.settings.client_timeout();
        if let Err(err) = shutdown_stream(&mut self.stream, timeout_dur).await {
            warn!(peer = %self.peer, error = %format!("{err:#}"), "client stream shutdown failed");
        }
        self.advance(SessionState::Closed);
    }
}

/// Reads until the request line is complete, at EOF, or once `limit` bytes have arrived. Headers
/// that arrive in the same segment are kept but never waited for.
async fn read_request<S>(stream: &mut S, limit: usize, timeout_dur: Duration) -> Result<Vec<u8>>
where
    S: AsyncRead + Unpin,
{
    timeout_with_context(
        timeout_dur,
        read_head(stream, limit),
        "reading client request",
    )
    .await
}

async fn read_head<S>(stream: &mut S, limit: usize) -> std::io::Result<Vec<u8>>
where
    S: AsyncRead + Unpin,
{
    let mut buf = Vec::with_capacity(limit.min(READ_CHUNK));
    let mut chunk = vec![0u8; READ_CHUNK.min(limit.max(1))];
    while buf.len() < limit {
        let want = chunk.len().min(limit - buf.len());
        let n = stream.read(&mut chunk[..want]).await?;
        if n == 0 {
            break;
        }
        let scanned = buf.len();
        buf.extend_from_slice(&chunk[..n]);
        if request_line_end(&buf, scanned).is_some() {
            break;
        }
    }
    Ok(buf)
}

pub async fn shutdown_stream<S>(stream: &mut S, timeout_dur: Duration) -> Result<()>
where
    S: AsyncWrite + Unpin,
{
    timeout_with_context(
        timeout_dur,
        stream.shutdown(),
        "shutting down client stream",
    )
    .await
}
