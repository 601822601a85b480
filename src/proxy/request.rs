use anyhow::Result;

use crate::util::lossy_text;

use super::session_error::MalformedRequest;

/// Request line of a client request. Headers after the request line are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    pub target: String,
    pub version: String,
}

impl Request {
    /// Splits the raw request on whitespace and takes the first three tokens.
    pub fn parse(raw: &[u8]) -> Result<Self, MalformedRequest> {
        let text = lossy_text(raw);
        let mut tokens = text.split_whitespace();
        match (tokens.next(), tokens.next(), tokens.next()) {
            (Some(method), Some(target), Some(version)) => Ok(Self {
                method: method.to_string(),
                target: target.to_string(),
                version: version.to_string(),
            }),
            (method, target, _) => Err(MalformedRequest {
                tokens: usize::from(method.is_some()) + usize::from(target.is_some()),
            }),
        }
    }

    /// Request line sent to the origin for `resource_path`.
    pub fn origin_request_line(&self, resource_path: &str) -> String {
        format!("{} {} {}", self.method, resource_path, self.version)
    }
}

/// Returns the offset just past the first line feed at or after `from`. Only the request line is
/// used, so a client's request is complete once this is found.
pub(crate) fn request_line_end(buf: &[u8], from: usize) -> Option<usize> {
    buf.get(from..)?
        .iter()
        .position(|&byte| byte == b'\n')
        .map(|idx| from + idx + 1)
}

pub(crate) fn parse_request_bytes(raw: &[u8]) -> Result<Request> {
    Ok(Request::parse(raw)?)
}
