//! Source buffer management.
//!
//! A [`SourceBuffer`] owns the bytes of one input file for the lifetime of a
//! run. Tokens, AST nodes, and diagnostics refer back into it by byte offset
//! only, never by pointer, so the buffer can be swapped for a streaming
//! source later without touching the frontend.
//!
//! A trailing newline is appended when the file does not end with one, which
//! guarantees that every byte position has a defined successor and that every
//! line (including the last) is newline-terminated.

use std::fs;
use std::io;
use std::path::Path;

/// An input file loaded into memory.
#[derive(Debug, Clone)]
pub struct SourceBuffer {
    /// Display name of the file (as given on the command line).
    name: String,
    /// File contents, always ending with `\n`.
    bytes: Vec<u8>,
    /// Byte offset of the start of each line, terminated by a sentinel
    /// equal to the buffer length.
    line_starts: Vec<usize>,
}

impl SourceBuffer {
    /// Create a buffer from in-memory text.
    #[must_use]
    pub fn from_str(name: &str, text: &str) -> Self {
        Self::from_bytes(name, text.as_bytes().to_vec())
    }

    /// Read a file from disk.
    ///
    /// On read failure no buffer is retained; the error is returned as-is.
    pub fn from_file(path: &Path) -> io::Result<Self> {
        let bytes = fs::read(path)?;
        Ok(Self::from_bytes(&path.display().to_string(), bytes))
    }

    fn from_bytes(name: &str, mut bytes: Vec<u8>) -> Self {
        if bytes.last() != Some(&b'\n') {
            bytes.push(b'\n');
        }
        let mut line_starts = vec![0];
        for (idx, &b) in bytes.iter().enumerate() {
            if b == b'\n' {
                line_starts.push(idx + 1);
            }
        }
        // The final entry is the sentinel: the buffer ends with a newline,
        // so the last push above is exactly `bytes.len()`.
        Self {
            name: name.to_owned(),
            bytes,
            line_starts,
        }
    }

    /// Display name of the file.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The raw bytes, including the synthetic trailing newline.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Total length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the buffer holds no bytes at all.
    ///
    /// Never true for a loaded file because of the appended newline.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The zero-based line index containing `offset`, or `None` when the
    /// offset lies past the end of the buffer.
    #[must_use]
    pub fn line_of(&self, offset: usize) -> Option<usize> {
        if offset >= self.len() {
            return None;
        }
        // Predecessor in the line-start table.
        match self.line_starts.binary_search(&offset) {
            Ok(line) => Some(line),
            Err(next) => Some(next - 1),
        }
    }

    /// Byte offset of the start of line `line`.
    #[must_use]
    pub fn line_start(&self, line: usize) -> usize {
        self.line_starts[line]
    }

    /// The text of line `line`, without its terminating newline.
    #[must_use]
    pub fn line_text(&self, line: usize) -> &str {
        let start = self.line_starts[line];
        let mut end = self.line_starts[line + 1];
        if end > start && self.bytes[end - 1] == b'\n' {
            end -= 1;
        }
        std::str::from_utf8(&self.bytes[start..end]).unwrap_or("")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_missing_newline() {
        let buf = SourceBuffer::from_str("t", "abc");
        assert_eq!(buf.bytes(), b"abc\n");
        assert_eq!(buf.len(), 4);
    }

    #[test]
    fn keeps_existing_newline() {
        let buf = SourceBuffer::from_str("t", "abc\n");
        assert_eq!(buf.bytes(), b"abc\n");
    }

    #[test]
    fn line_starts_end_with_sentinel() {
        let buf = SourceBuffer::from_str("t", "ab\ncd\n");
        assert_eq!(buf.line_start(0), 0);
        assert_eq!(buf.line_start(1), 3);
        // sentinel
        assert_eq!(buf.line_start(2), 6);
    }

    #[test]
    fn line_of_maps_offsets() {
        let buf = SourceBuffer::from_str("t", "ab\ncd\n");
        assert_eq!(buf.line_of(0), Some(0));
        assert_eq!(buf.line_of(2), Some(0)); // the newline itself
        assert_eq!(buf.line_of(3), Some(1));
        assert_eq!(buf.line_of(4), Some(1));
        assert_eq!(buf.line_of(6), None); // past the end
    }

    #[test]
    fn line_text_strips_newline() {
        let buf = SourceBuffer::from_str("t", "ab\ncd");
        assert_eq!(buf.line_text(0), "ab");
        assert_eq!(buf.line_text(1), "cd");
    }

    #[test]
    fn empty_input_gets_one_line() {
        let buf = SourceBuffer::from_str("t", "");
        assert_eq!(buf.bytes(), b"\n");
        assert_eq!(buf.line_text(0), "");
    }
}
