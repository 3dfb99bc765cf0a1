//! Pattern buffer with tail-search optimization.
//!
//! Prompt patterns are only searched for in the last N bytes of the buffer,
//! not the whole output. Config block echoes on a loaded device can run to
//! many kilobytes, and the prompt is always at the end.

use std::fmt;

use bytes::BytesMut;
use regex::bytes::Regex;
use vte::{Parser, Perform};

/// Buffer for accumulating terminal output and searching it for patterns.
///
/// Incoming bytes are run through a VT parser so ANSI escape sequences
/// (colors, cursor movement, the `ESC[16D` redraws some CLIs emit on long
/// lines) never reach the pattern matcher.
pub struct PatternBuffer {
    /// The accumulated, escape-free output.
    buffer: BytesMut,

    /// How many bytes from the end to search for patterns.
    search_depth: usize,

    /// Parser state persists across chunks so split escape sequences are
    /// still recognised.
    parser: Parser,
}

impl PatternBuffer {
    /// Create a new pattern buffer with the specified search depth.
    pub fn new(search_depth: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
            search_depth,
            parser: Parser::new(),
        }
    }

    /// Extend the buffer with new data, stripping escape sequences.
    pub fn extend(&mut self, data: &[u8]) {
        let mut sink = PrintableSink {
            out: &mut self.buffer,
        };
        self.parser.advance(&mut sink, data);
    }

    /// Search only the tail of the buffer for the pattern.
    ///
    /// Offsets in the returned match are relative to the start of the
    /// searched region.
    pub fn search_tail(&self, pattern: &Regex) -> Option<regex::bytes::Match<'_>> {
        pattern.find(self.tail())
    }

    /// Search the entire buffer for a pattern.
    pub fn search_full(&self, pattern: &Regex) -> Option<regex::bytes::Match<'_>> {
        pattern.find(&self.buffer)
    }

    /// Check if the tail contains a pattern match.
    pub fn tail_contains(&self, pattern: &Regex) -> bool {
        self.search_tail(pattern).is_some()
    }

    /// Check if `pattern` matches after the first match of `marker`.
    ///
    /// Searches the whole buffer. Used to find the prompt that follows a
    /// particular echoed line rather than any earlier prompt.
    pub fn contains_after(&self, marker: &Regex, pattern: &Regex) -> bool {
        marker
            .find(&self.buffer)
            .is_some_and(|m| pattern.is_match_at(&self.buffer, m.end()))
    }

    /// The last non-empty line of the buffer, trimmed.
    pub fn last_line(&self) -> Option<String> {
        last_line(&self.buffer)
    }

    /// Take ownership of the buffer contents and reset.
    pub fn take(&mut self) -> Vec<u8> {
        self.buffer.split().to_vec()
    }

    /// Get a reference to the buffer contents.
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    /// Get the current buffer length.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Clear the buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    fn tail(&self) -> &[u8] {
        let start = self.buffer.len().saturating_sub(self.search_depth);
        &self.buffer[start..]
    }
}

impl Default for PatternBuffer {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl fmt::Debug for PatternBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatternBuffer")
            .field("len", &self.buffer.len())
            .field("search_depth", &self.search_depth)
            .finish()
    }
}

/// The last non-empty line of `data`, trimmed.
///
/// After a bare return this is the device prompt.
pub fn last_line(data: &[u8]) -> Option<String> {
    let mut end = data.len();
    while end > 0 {
        let start = memchr::memrchr(b'\n', &data[..end]).map_or(0, |i| i + 1);
        let line = String::from_utf8_lossy(&data[start..end]);
        let line = line.trim();
        if !line.is_empty() {
            return Some(line.to_string());
        }
        end = start.saturating_sub(1);
    }
    None
}

/// Keeps printable characters and line structure, drops everything else.
struct PrintableSink<'a> {
    out: &'a mut BytesMut,
}

impl Perform for PrintableSink<'_> {
    fn print(&mut self, c: char) {
        let mut utf8 = [0u8; 4];
        self.out.extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
    }

    fn execute(&mut self, byte: u8) {
        if matches!(byte, b'\n' | b'\r' | b'\t') {
            self.out.extend_from_slice(&[byte]);
        }
    }
}
