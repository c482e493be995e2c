use std::ops::Range;

use kconfig_tree::Envelope;
use thiserror::Error;

/// Errors for a complete but unusable envelope.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The envelope is not valid JSON of the expected shape.
    #[error("malformed envelope `{raw}`: {source}")]
    Malformed {
        raw: String,
        #[source]
        source: serde_json::Error,
    },
    /// The envelope carries a non-empty `error` field.
    #[error("backend reported error: {0}")]
    Backend(String),
}

/// Extracts snapshots from the backend's stdout.
///
/// Chunks are accumulated until at least one complete top-level JSON object
/// is present. Then only the last complete object is returned, since earlier
/// ones are superseded, and the whole buffer is cleared, including any
/// trailing partial data.
#[derive(Debug, Default)]
pub struct Framer {
    buffer: Vec<u8>,
}

impl Framer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return the latest complete envelope, if any.
    pub fn feed(&mut self, chunk: &[u8]) -> Option<Result<Envelope, FrameError>> {
        self.buffer.extend_from_slice(chunk);
        let span = last_complete_object(&self.buffer)?;
        let frame = parse_envelope(&self.buffer[span]);
        self.buffer.clear();
        Some(frame)
    }

    /// Bytes retained while waiting for a complete envelope.
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

fn parse_envelope(raw: &[u8]) -> Result<Envelope, FrameError> {
    let envelope: Envelope =
        serde_json::from_slice(raw).map_err(|source| FrameError::Malformed {
            raw: String::from_utf8_lossy(raw).into_owned(),
            source,
        })?;
    if let Some(message) = envelope.error_message() {
        return Err(FrameError::Backend(message));
    }
    Ok(envelope)
}

/// Locate the last complete top-level `{...}` in `buf`.
///
/// Braces inside string literals are ignored. Envelopes never contain raw
/// newlines, so a newline outside a string drops the partial candidate.
///
/// A stray `{` earlier on the same line keeps the envelope nested. An inner
/// object closed by `}}` then counts as a complete envelope, since every
/// envelope ends with its last map.
fn last_complete_object(buf: &[u8]) -> Option<Range<usize>> {
    let mut open: Vec<usize> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    let mut last = None;

    for (i, &b) in buf.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'{' => open.push(i),
            b'}' => {
                let Some(start) = open.pop() else {
                    continue;
                };
                if open.is_empty() || closes_map(&buf[..i]) {
                    last = Some(start..i + 1);
                }
            }
            b'"' if !open.is_empty() => in_string = true,
            b'\n' if !open.is_empty() => {
                trace!("dropping unterminated candidate at byte {}", open[0]);
                open.clear();
            }
            _ => {}
        }
    }
    last
}

/// Whether the last non-whitespace byte of `head` is `}`.
fn closes_map(head: &[u8]) -> bool {
    head.iter()
        .rev()
        .find(|b| !b.is_ascii_whitespace())
        .is_some_and(|&b| b == b'}')
}
