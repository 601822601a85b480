use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use anyhow::{Result, anyhow};
use time::OffsetDateTime;
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::LogFormat;

const DEFAULT_FILTER: &str = "info";

pub fn init_logger(format: LogFormat) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    match format {
        LogFormat::Json => fmt::fmt()
            .with_env_filter(filter)
            .json()
            .with_current_span(false)
            .with_span_list(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .try_init()
            .map_err(|err| anyhow!(err))?,
        LogFormat::Text => fmt::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .try_init()
            .map_err(|err| anyhow!(err))?,
    }

    Ok(())
}

/// Summary of one client session, emitted once when the connection closes.
#[derive(Debug, Clone)]
pub struct SessionLogEvent {
    pub peer_ip: IpAddr,
    pub peer_port: u16,
    pub method: String,
    pub host: String,
    pub path: String,
    pub cache_lookup: Option<String>,
    pub cache_store: Option<String>,
    pub status_line: Option<String>,
    pub bytes_out: u64,
    pub elapsed_ms: u128,
    pub state: String,
    pub upstream_addr: Option<String>,
    pub error_reason: Option<String>,
}

/// Collects session fields as the state machine advances. Setters borrow mutably so the
/// builder can live alongside the session.
#[derive(Debug)]
pub struct SessionLogBuilder {
    event: SessionLogEvent,
}

impl SessionLogBuilder {
    pub fn new(peer: SocketAddr) -> Self {
        Self {
            event: SessionLogEvent {
                peer_ip: peer.ip(),
                peer_port: peer.port(),
                method: String::new(),
                host: String::new(),
                path: String::new(),
                cache_lookup: None,
                cache_store: None,
                status_line: None,
                bytes_out: 0,
                elapsed_ms: 0,
                state: String::from("accepted"),
                upstream_addr: None,
                error_reason: None,
            },
        }
    }

    pub fn method(&mut self, method: impl Into<String>) -> &mut Self {
        self.event.method = method.into();
        self
    }

    pub fn host(&mut self, host: impl Into<String>) -> &mut Self {
        self.event.host = host.into();
        self
    }

    pub fn path(&mut self, path: impl Into<String>) -> &mut Self {
        self.event.path = path.into();
        self
    }

    pub fn cache_lookup(&mut self, value: impl Into<String>) -> &mut Self {
        self.event.cache_lookup = Some(value.into());
        self
    }

    pub fn cache_store(&mut self, value: impl Into<String>) -> &mut Self {
        self.event.cache_store = Some(value.into());
        self
    }

    pub fn status_line(&mut self, line: impl Into<String>) -> &mut Self {
        self.event.status_line = Some(line.into());
        self
    }

    pub fn bytes_out(&mut self, bytes: u64) -> &mut Self {
        self.event.bytes_out = bytes;
        self
    }

    pub fn elapsed(&mut self, elapsed: Duration) -> &mut Self {
        self.event.elapsed_ms = elapsed.as_millis();
        self
    }

    pub fn state(&mut self, state: impl Into<String>) -> &mut Self {
        self.event.state = state.into();
        self
    }

    pub fn upstream_addr(&mut self, addr: impl Into<String>) -> &mut Self {
        self.event.upstream_addr = Some(addr.into());
        self
    }

    /// Keeps the first reason recorded; later failures in the same session are logged on their own.
    pub fn error_reason(&mut self, reason: impl Into<String>) -> &mut Self {
        if self.event.error_reason.is_none() {
            self.event.error_reason = Some(reason.into());
        }
        self
    }

    pub fn build(self) -> SessionLogEvent {
        self.event
    }

    pub fn log(self) {
        log_session(self.build());
    }
}

pub fn log_session(event: SessionLogEvent) {
    let SessionLogEvent {
        peer_ip,
        peer_port,
        method,
        host,
        path,
        cache_lookup,
        cache_store,
        status_line,
        bytes_out,
        elapsed_ms,
        state,
        upstream_addr,
        error_reason,
    } = event;

    let ts = timestamp(OffsetDateTime::now_utc());

    tracing::info!(
        target = "session_log",
        ts,
        peer_ip = %peer_ip,
        peer_port,
        method,
        host,
        path,
        cache_lookup = cache_lookup.as_deref(),
        cache_store = cache_store.as_deref(),
        status_line = status_line.as_deref(),
        bytes_out,
        elapsed_ms,
        state,
        upstream_addr = upstream_addr.as_deref(),
        error_reason = error_reason.as_deref()
    );
}

fn timestamp(now: OffsetDateTime) -> String {
    let (year, month, day) = now.to_calendar_date();
    let (hour, minute, second) = now.to_hms();
    let month_number: u8 = month.into();
    format!(
        "{year:04}-{month_number:02}-{day:02}T{hour:02}:{minute:02}:{second:02}.{:03}Z",
        now.millisecond()
    )
}
