//! G-code line parser
//!
//! Lexes a single line of G-code text into a structured word list. A word is
//! `<LETTER><NUMBER>` where the letter is case-insensitive A-Z and the number
//! is a signed decimal. Comments (`; ...` to end of line, matched `( ... )`)
//! are stripped before lexing; whitespace is insignificant.
//!
//! The parser separates G words and M words (kept in source order) from
//! parameter words (X, Y, Z, I, J, K, R, F, ...), where the last occurrence
//! of a parameter letter on a line wins.

use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

use millstream_core::GcodeError;

/// A single G-code word: one letter tagged with a signed decimal value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Word {
    /// Upper-cased word letter.
    pub letter: char,
    /// Numeric value as written (no unit conversion).
    pub value: f64,
}

/// A parsed G-code line.
///
/// G and M words keep their source order; parameter letters collapse to the
/// last-seen value. Comment-only and blank lines parse to `None` rather than
/// an empty `ParsedLine`.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedLine {
    /// Source line number (1-based), preserved for diagnostics.
    pub line_number: u32,
    /// G word numbers in source order. Fractional values (e.g. G38.2) are
    /// preserved so the interpreter can report them as unsupported.
    pub gcodes: Vec<f64>,
    /// M word numbers in source order. Passed through; no side effects here.
    pub mcodes: Vec<f64>,
    /// Parameter letters to their last-seen value on this line.
    pub params: HashMap<char, f64>,
}

impl ParsedLine {
    /// Value of a parameter word, if present.
    pub fn param(&self, letter: char) -> Option<f64> {
        self.params.get(&letter).copied()
    }

    /// True when the line names at least one of the given letters.
    pub fn has_any_param(&self, letters: &[char]) -> bool {
        letters.iter().any(|l| self.params.contains_key(l))
    }
}

fn word_regex() -> &'static Regex {
    static WORD_RE: OnceLock<Regex> = OnceLock::new();
    WORD_RE.get_or_init(|| {
        Regex::new(r"([A-Za-z])([-+]?[0-9]*\.?[0-9]+)").expect("invalid word regex")
    })
}

/// Blank out comments in place, preserving column positions.
///
/// `;` comments run to end of line; `( ... )` comments must close on the same
/// line and must not nest. Comment bytes are replaced with spaces so that
/// later error columns still point into the original text.
fn strip_comments(text: &str, line_number: u32) -> Result<String, GcodeError> {
    let mut out: Vec<char> = text.chars().collect();
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            ';' => {
                for slot in out.iter_mut().skip(i) {
                    *slot = ' ';
                }
                break;
            }
            '(' => {
                let open_column = i + 1;
                let mut j = i + 1;
                loop {
                    if j >= chars.len() {
                        return Err(GcodeError::Parse {
                            line: line_number,
                            column: open_column,
                            reason: "unmatched '('".into(),
                        });
                    }
                    match chars[j] {
                        ')' => break,
                        '(' => {
                            return Err(GcodeError::Parse {
                                line: line_number,
                                column: j + 1,
                                reason: "nested '(' in comment".into(),
                            });
                        }
                        _ => j += 1,
                    }
                }
                for slot in out.iter_mut().take(j + 1).skip(i) {
                    *slot = ' ';
                }
                i = j + 1;
            }
            ')' => {
                return Err(GcodeError::Parse {
                    line: line_number,
                    column: i + 1,
                    reason: "unmatched ')'".into(),
                });
            }
            _ => i += 1,
        }
    }
    Ok(out.into_iter().collect())
}

/// Reject any non-whitespace characters between recognized words.
fn check_gap(gap: &str, gap_start: usize, line_number: u32) -> Result<(), GcodeError> {
    for (offset, c) in gap.char_indices() {
        if !c.is_whitespace() {
            return Err(GcodeError::Parse {
                line: line_number,
                column: gap_start + offset + 1,
                reason: format!("stray character '{}'", c),
            });
        }
    }
    Ok(())
}

/// Parse one line of G-code text.
///
/// Returns `Ok(None)` for blank and comment-only lines. Malformed words,
/// stray characters, unmatched parentheses, and non-finite numbers fail with
/// [`GcodeError::Parse`] carrying the line and column.
pub fn parse_line(text: &str, line_number: u32) -> Result<Option<ParsedLine>, GcodeError> {
    let masked = strip_comments(text, line_number)?;

    let mut gcodes = Vec::new();
    let mut mcodes = Vec::new();
    let mut params: HashMap<char, f64> = HashMap::new();
    let mut last_end = 0;
    let mut seen_any = false;

    for m in word_regex().find_iter(&masked) {
        check_gap(&masked[last_end..m.start()], last_end, line_number)?;
        last_end = m.end();
        seen_any = true;

        let text = m.as_str();
        let letter = text
            .chars()
            .next()
            .expect("regex match cannot be empty")
            .to_ascii_uppercase();
        let value: f64 = text[1..].parse().map_err(|_| GcodeError::Parse {
            line: line_number,
            column: m.start() + 2,
            reason: format!("invalid number '{}'", &text[1..]),
        })?;
        if !value.is_finite() {
            return Err(GcodeError::Parse {
                line: line_number,
                column: m.start() + 2,
                reason: format!("numeric overflow in '{}'", text),
            });
        }
        let word = Word { letter, value };

        match word.letter {
            'G' => gcodes.push(word.value),
            'M' => mcodes.push(word.value),
            _ => {
                // Last value of a repeated parameter letter wins.
                params.insert(word.letter, word.value);
            }
        }
    }
    check_gap(&masked[last_end..], last_end, line_number)?;

    if !seen_any {
        return Ok(None);
    }
    Ok(Some(ParsedLine {
        line_number,
        gcodes,
        mcodes,
        params,
    }))
}
