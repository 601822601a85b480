//! Turns a request target into the origin hostname and resource path.
//!
//! The rules are deliberately coarse: one protocol prefix is stripped, every literal `/..` is
//! removed, and the remainder is split at the first `/`. Hostnames are not validated here; a bad
//! hostname surfaces later as an origin failure.

const PROTOCOL_PREFIXES: [&str; 2] = ["http://", "https://"];
const TRAVERSAL_TOKEN: &str = "/..";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub hostname: String,
    pub resource_path: String,
}

impl ResolvedTarget {
    pub fn resolve(target: &str) -> Self {
        let stripped = strip_protocol(target);
        let cleaned = remove_traversal(stripped);
        match cleaned.split_once('/') {
            Some((hostname, remainder)) => Self {
                hostname: hostname.to_string(),
                resource_path: format!("/{remainder}"),
            },
            None => Self {
                hostname: cleaned,
                resource_path: "/".to_string(),
            },
        }
    }
}

/// Strips one leading `http://` or `https://`, optionally preceded by a single `/`.
fn strip_protocol(target: &str) -> &str {
    let candidate = target.strip_prefix('/').unwrap_or(target);
    for prefix in PROTOCOL_PREFIXES {
        if let Some(rest) = candidate.strip_prefix(prefix) {
            return rest;
        }
    }
    target
}

/// Removes `/..` until none is left; removal can join characters into a new token.
fn remove_traversal(value: &str) -> String {
    let mut cleaned = value.replace(TRAVERSAL_TOKEN, "");
    while cleaned.contains(TRAVERSAL_TOKEN) {
        cleaned = cleaned.replace(TRAVERSAL_TOKEN, "");
    }
    cleaned
}
