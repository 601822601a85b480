use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Error;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
#[error("malformed request line: expected method, target and version, found {tokens} token(s)")]
pub struct MalformedRequest {
    pub tokens: usize,
}

/// Step of the origin exchange that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OriginStage {
    Resolve,
    Connect,
    Send,
    Receive,
}

impl fmt::Display for OriginStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            OriginStage::Resolve => "resolve",
            OriginStage::Connect => "connect",
            OriginStage::Send => "send",
            OriginStage::Receive => "receive",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Error)]
#[error("origin {host} unavailable during {stage}: {cause:#}")]
pub struct OriginUnavailable {
    pub host: String,
    pub stage: OriginStage,
    pub cause: Error,
}

impl OriginUnavailable {
    pub fn new(host: &str, stage: OriginStage, cause: impl Into<Error>) -> Self {
        Self {
            host: host.to_string(),
            stage,
            cause: cause.into(),
        }
    }
}

#[derive(Debug, Error)]
#[error("cache {operation} failed for {}", path.display())]
pub struct CacheIo {
    pub operation: &'static str,
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

impl CacheIo {
    pub fn new(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self {
            operation,
            path: path.into(),
            source,
        }
    }
}

/// Normalized classification of session failures so every exit path logs consistently.
pub enum SessionErrorKind<'a> {
    MalformedRequest(&'a MalformedRequest),
    OriginUnavailable(&'a OriginUnavailable),
    CacheIo(&'a CacheIo),
    Other,
}

impl SessionErrorKind<'_> {
    pub fn reason(&self) -> &'static str {
        match self {
            SessionErrorKind::MalformedRequest(_) => "malformed_request",
            SessionErrorKind::OriginUnavailable(_) => "origin_unavailable",
            SessionErrorKind::CacheIo(_) => "cache_io",
            SessionErrorKind::Other => "io_error",
        }
    }
}

pub fn classify_session_error(err: &Error) -> SessionErrorKind<'_> {
    if let Some(malformed) = err.downcast_ref::<MalformedRequest>() {
        SessionErrorKind::MalformedRequest(malformed)
    } else if let Some(origin) = err.downcast_ref::<OriginUnavailable>() {
        SessionErrorKind::OriginUnavailable(origin)
    } else if let Some(cache) = err.downcast_ref::<CacheIo>() {
        SessionErrorKind::CacheIo(cache)
    } else {
        SessionErrorKind::Other
    }
}

pub fn log_session_error(kind: &SessionErrorKind<'_>, peer: SocketAddr, err: &Error) {
    match kind {
        SessionErrorKind::MalformedRequest(malformed) => warn!(
            peer = %peer,
            tokens = malformed.tokens,
            "rejected malformed request"
        ),
        SessionErrorKind::OriginUnavailable(origin) => warn!(
            peer = %peer,
            host = %origin.host,
            stage = %origin.stage,
            error = %format!("{:#}", origin.cause),
            "origin server request failed"
        ),
        SessionErrorKind::CacheIo(cache) => warn!(
            peer = %peer,
            operation = cache.operation,
            path = %cache.path.display(),
            error = %cache.source,
            "cache operation failed"
        ),
        SessionErrorKind::Other => warn!(
            peer = %peer,
            error = %err,
            "session failed"
        ),
    }
}
