use bytes::Bytes;

use crate::util::lossy_text;

const LINE_END: &str = "\r\n";
const HEAD_END: &str = "\r\n\r\n";

/// Response as read from the origin, with the text needed for classification split out.
#[derive(Debug, Clone)]
pub struct OriginResponse {
    pub status_line: String,
    pub header_block: String,
    pub raw: Bytes,
}

impl OriginResponse {
    pub fn from_raw(raw: Bytes) -> Self {
        let text = lossy_text(&raw);
        let status_line = text
            .split_once(LINE_END)
            .map(|(line, _)| line)
            .unwrap_or(text.as_str())
            .to_string();
        let header_block = text
            .split_once(HEAD_END)
            .map(|(head, _)| head.to_string())
            .unwrap_or_default();
        Self {
            status_line,
            header_block,
            raw,
        }
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Header lines after the status line, without their line endings.
    pub fn header_lines(&self) -> impl Iterator<Item = &str> {
        self.header_block.split(LINE_END).skip(1)
    }
}

/// Splits a header line into its name and trimmed value.
pub(crate) fn split_header(line: &str) -> Option<(&str, &str)> {
    let (name, value) = line.split_once(':')?;
    Some((name.trim(), value.trim()))
}
