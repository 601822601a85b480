use std::time::Duration;

use super::codec::{OriginResponse, split_header};

/// Directives from the origin's Cache-Control header. Informational only; nothing here
/// expires or revalidates stored entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheControl {
    pub max_age: Option<Duration>,
    pub no_store: bool,
}

pub fn parse_cache_control(response: &OriginResponse) -> CacheControl {
    let mut cc = CacheControl::default();

    for line in response.header_lines() {
        let Some((name, value)) = split_header(line) else {
            continue;
        };
        if !name.eq_ignore_ascii_case("cache-control") {
            continue;
        }
        for part in value.split(',') {
            let part = part.trim();
            if part.eq_ignore_ascii_case("no-store") {
                cc.no_store = true;
            } else if let Some((directive, arg)) = part.split_once('=')
                && directive.trim().eq_ignore_ascii_case("max-age")
                && let Ok(secs) = arg.trim().trim_matches('"').parse::<u64>()
            {
                cc.max_age = Some(Duration::from_secs(secs));
            }
        }
    }
    cc
}
