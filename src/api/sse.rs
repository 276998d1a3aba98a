//! Framing for streamed completion replies.
//!
//! A streamed reply is a sequence of `data: <json>` lines ending with
//! `data: [DONE]`. Bytes are buffered until a newline so that a multi-byte
//! UTF-8 sequence split across network chunks is only decoded once complete.

use super::ChatCompletionChunk;

/// Sentinel payload that terminates a stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Interpretation of one complete line of a streamed reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamLine {
    /// A non-empty `choices[0].delta.content` fragment.
    Fragment(String),
    /// The `[DONE]` sentinel.
    Done,
}

/// Buffer-until-newline line splitter over raw body bytes.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: Vec<u8>,
}

impl LineBuffer {
    /// Create an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every line it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = find_newline(&self.buf) {
            let raw = self.buf.drain(..=pos).collect::<Vec<_>>();
            lines.push(decode_line(&raw[..pos]));
        }
        lines
    }

    /// Take whatever is left once the body has ended.
    pub fn finish(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        let raw = std::mem::take(&mut self.buf);
        Some(decode_line(&raw))
    }

    /// Number of bytes waiting for a newline.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

/// Interpret a single line of a streamed reply.
///
/// Returns `None` for lines that carry nothing to render: non-`data:` lines,
/// empty deltas, and payloads that fail to parse.
pub fn parse_line(line: &str) -> Option<StreamLine> {
    let rest = line.strip_prefix("data:")?;
    let data = rest.strip_prefix(' ').unwrap_or(rest);

    if data.trim() == DONE_SENTINEL {
        return Some(StreamLine::Done);
    }

    match serde_json::from_str::<ChatCompletionChunk>(data) {
        Ok(chunk) => chunk
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.delta.content)
            .filter(|s| !s.is_empty())
            .map(StreamLine::Fragment),
        Err(e) => {
            tracing::trace!(error = %e, payload_len = data.len(), "Skipping malformed stream payload");
            None
        }
    }
}

fn find_newline(buf: &[u8]) -> Option<usize> {
    buf.iter().position(|b| *b == b'\n')
}

fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}
