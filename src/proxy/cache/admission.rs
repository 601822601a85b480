use std::time::Duration;

use http::StatusCode;
use tracing::{debug, info};

use crate::proxy::http::OriginResponse;
use crate::proxy::http::cache_control::parse_cache_control;
use crate::settings::StatusMatch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CacheSkipReason {
    Redirect,
    NotCacheable,
}

impl CacheSkipReason {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            CacheSkipReason::Redirect => "redirect",
            CacheSkipReason::NotCacheable => "not_cacheable",
        }
    }
}

/// Admission decision made once per origin response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheAdmission {
    pub should_cache: bool,
    pub max_age: Option<Duration>,
    pub(crate) skip: Option<CacheSkipReason>,
}

impl CacheAdmission {
    pub fn max_age_seconds(&self) -> Option<u64> {
        self.max_age.map(|age| age.as_secs())
    }
}

pub fn classify_response(response: &OriginResponse, mode: StatusMatch) -> CacheAdmission {
    let skip = match mode {
        StatusMatch::Substring => classify_status_substring(&response.status_line),
        StatusMatch::Exact => classify_status_exact(&response.status_line),
    };
    if skip == Some(CacheSkipReason::Redirect) {
        info!(status_line = %response.status_line, "302 redirect found; response will not be cached");
    }

    let cache_control = parse_cache_control(response);
    if let Some(max_age) = cache_control.max_age {
        debug!(max_age = max_age.as_secs(), "max-age detected");
    }
    if cache_control.no_store && skip.is_none() {
        debug!("origin sent no-store; admission follows the status line only");
    }

    CacheAdmission {
        should_cache: skip.is_none(),
        max_age: cache_control.max_age,
        skip,
    }
}

/// `200` or `301` anywhere in the line admits, then `302` anywhere rejects as a redirect.
fn classify_status_substring(status_line: &str) -> Option<CacheSkipReason> {
    if status_line.contains("200") || status_line.contains("301") {
        None
    } else if status_line.contains("302") {
        Some(CacheSkipReason::Redirect)
    } else {
        Some(CacheSkipReason::NotCacheable)
    }
}

fn classify_status_exact(status_line: &str) -> Option<CacheSkipReason> {
    let status = status_line
        .split_whitespace()
        .nth(1)
        .and_then(|code| StatusCode::from_bytes(code.as_bytes()).ok());
    match status {
        Some(StatusCode::OK | StatusCode::MOVED_PERMANENTLY) => None,
        Some(StatusCode::FOUND) => Some(CacheSkipReason::Redirect),
        _ => Some(CacheSkipReason::NotCacheable),
    }
}
