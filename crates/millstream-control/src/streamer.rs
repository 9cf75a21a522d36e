//! Incremental G-code line streamer
//!
//! Provides lazy, line-by-line access to a G-code source so jobs stream
//! instead of loading whole files into memory. Blank lines and lines that
//! are nothing but comments are skipped, but their line numbers are still
//! consumed so diagnostics point into the real file.
//!
//! The streamer is not restartable; once EOF is reported it stays reported.

use std::fs::File;
use std::io::{BufRead, BufReader, Cursor};
use std::path::Path;

use millstream_core::Result;

/// Line-by-line G-code source with EOF signal and line numbering.
pub struct GcodeStreamer {
    reader: Box<dyn BufRead>,
    line_number: u32,
    eof: bool,
}

impl GcodeStreamer {
    /// Stream from any buffered reader.
    pub fn new(reader: Box<dyn BufRead>) -> Self {
        Self {
            reader,
            line_number: 0,
            eof: false,
        }
    }

    /// Open a G-code file for streaming.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(Box::new(BufReader::new(file))))
    }

    /// Stream from an in-memory program (used heavily by tests).
    pub fn from_string(text: impl Into<String>) -> Self {
        Self::new(Box::new(Cursor::new(text.into())))
    }

    /// Next executable line as `(line_number, text)`.
    ///
    /// Returns `None` at end of input, and keeps returning `None` on
    /// further calls.
    pub fn next_line(&mut self) -> Result<Option<(u32, String)>> {
        if self.eof {
            return Ok(None);
        }
        loop {
            let mut raw = String::new();
            let read = self.reader.read_line(&mut raw)?;
            if read == 0 {
                self.eof = true;
                return Ok(None);
            }
            self.line_number += 1;

            let line = raw.trim();
            if is_comment_only(line) {
                continue;
            }
            return Ok(Some((self.line_number, line.to_string())));
        }
    }

    /// Number of the last line read (0 before the first read).
    pub fn line_number(&self) -> u32 {
        self.line_number
    }

    /// True once end of input has been reached.
    pub fn eof(&self) -> bool {
        self.eof
    }
}

impl std::fmt::Debug for GcodeStreamer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GcodeStreamer")
            .field("line_number", &self.line_number)
            .field("eof", &self.eof)
            .finish_non_exhaustive()
    }
}

/// True for blank lines and lines containing only comments.
///
/// A line with an unmatched `(` is NOT comment-only: it is handed to the
/// parser, which reports the error with a column.
fn is_comment_only(line: &str) -> bool {
    let mut in_parens = false;
    for c in line.chars() {
        if in_parens {
            if c == ')' {
                in_parens = false;
            }
            continue;
        }
        match c {
            ';' => return true,
            '(' => in_parens = true,
            c if c.is_whitespace() => {}
            _ => return false,
        }
    }
    !in_parens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_streams_lines_with_numbers() {
        let mut s = GcodeStreamer::from_string("G21\nG90\nG1 X10 F600\n");
        assert_eq!(s.next_line().unwrap(), Some((1, "G21".to_string())));
        assert_eq!(s.next_line().unwrap(), Some((2, "G90".to_string())));
        assert_eq!(s.next_line().unwrap(), Some((3, "G1 X10 F600".to_string())));
        assert_eq!(s.next_line().unwrap(), None);
    }

    #[test]
    fn test_skips_blank_and_comment_lines_preserving_numbers() {
        let program = "G21\n\n; full line comment\n(another comment)\nG1 X5 F100\n";
        let mut s = GcodeStreamer::from_string(program);
        assert_eq!(s.next_line().unwrap(), Some((1, "G21".to_string())));
        assert_eq!(s.next_line().unwrap(), Some((5, "G1 X5 F100".to_string())));
        assert_eq!(s.next_line().unwrap(), None);
    }

    #[test]
    fn test_eof_is_idempotent() {
        let mut s = GcodeStreamer::from_string("G21\n");
        assert!(s.next_line().unwrap().is_some());
        for _ in 0..5 {
            assert_eq!(s.next_line().unwrap(), None);
        }
        assert!(s.eof());
    }

    #[test]
    fn test_last_line_without_newline() {
        let mut s = GcodeStreamer::from_string("G21\nG1 X1 F60");
        assert!(s.next_line().unwrap().is_some());
        assert_eq!(s.next_line().unwrap(), Some((2, "G1 X1 F60".to_string())));
        assert_eq!(s.next_line().unwrap(), None);
    }

    #[test]
    fn test_comment_only_detection() {
        assert!(is_comment_only(""));
        assert!(is_comment_only("   "));
        assert!(is_comment_only("; notes"));
        assert!(is_comment_only("(fixture) (second)"));
        assert!(is_comment_only("(lead) ; trailing"));
        assert!(!is_comment_only("G1 X0"));
        assert!(!is_comment_only("(comment) G1 X0"));
        // Unmatched paren goes to the parser for a proper error.
        assert!(!is_comment_only("(unclosed"));
    }

    #[test]
    fn test_inline_comment_lines_are_streamed() {
        let mut s = GcodeStreamer::from_string("G1 X5 F100 ; inline\n");
        let (n, text) = s.next_line().unwrap().unwrap();
        assert_eq!(n, 1);
        assert!(text.contains("G1"));
    }
}
