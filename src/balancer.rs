//! Nesting-depth balancer for single-character delimiter pairs.
//!
//! Every delimiter byte counts, including ones inside string literals and
//! comments. Spans built on top of this are best-effort.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delimiters {
    pub open: u8,
    pub close: u8,
}

pub const BRACES: Delimiters = Delimiters { open: b'{', close: b'}' };
pub const PARENS: Delimiters = Delimiters { open: b'(', close: b')' };
pub const BRACKETS: Delimiters = Delimiters { open: b'[', close: b']' };

/// End of text reached while nesting was still open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unterminated {
    /// Depth left open at end of text.
    pub depth: usize,
}

impl fmt::Display for Unterminated {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unterminated: {} delimiter(s) still open at end of text", self.depth)
    }
}

impl std::error::Error for Unterminated {}

/// Find the close matching an open delimiter that has already been consumed.
///
/// `from` is the byte just after that opening delimiter. Returns the byte just
/// after the closing delimiter that brings depth back to zero.
pub fn balance(text: &str, from: usize, delims: Delimiters) -> Result<usize, Unterminated> {
    let bytes = text.as_bytes();
    let mut depth = 1usize;
    let mut pos = from.min(bytes.len());

    while pos < bytes.len() {
        let b = bytes[pos];
        pos += 1;
        if b == delims.open {
            depth += 1;
        } else if b == delims.close {
            depth -= 1;
            if depth == 0 {
                return Ok(pos);
            }
        }
    }

    Err(Unterminated { depth })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn depth_profile(s: &str, delims: Delimiters) -> (usize, usize, bool) {
        let mut opens = 0;
        let mut closes = 0;
        let mut depth = 0i64;
        let mut went_negative = false;
        for b in s.bytes() {
            if b == delims.open {
                opens += 1;
                depth += 1;
            } else if b == delims.close {
                closes += 1;
                depth -= 1;
                if depth < 0 {
                    went_negative = true;
                }
            }
        }
        (opens, closes, went_negative)
    }

    #[test]
    fn returns_position_after_matching_close() {
        let text = "{ a { b } c } tail";
        let end = balance(text, 1, BRACES).unwrap();
        assert_eq!(&text[..end], "{ a { b } c }");
    }

    #[test]
    fn balanced_inputs_close_cleanly() {
        let samples = [
            "{}",
            "{ { } { { } } }",
            "{ if (x) { y(); } else { z(); } }",
            "{\n  {\n  }\n}\n}",
        ];
        for s in samples {
            let end = balance(s, 1, BRACES).unwrap();
            let (opens, closes, negative) = depth_profile(&s[..end], BRACES);
            assert_eq!(opens, closes, "unequal counts in {s:?}");
            assert!(!negative, "depth dipped below zero in {s:?}");
        }
    }

    #[test]
    fn works_for_other_pairs() {
        let text = "(a, (b, c), d) + 1";
        assert_eq!(balance(text, 1, PARENS).unwrap(), 14);
        let text = "[[1], [2]]";
        assert_eq!(balance(text, 1, BRACKETS).unwrap(), text.len());
    }

    #[test]
    fn reports_unterminated_input() {
        let err = balance("{ { }", 1, BRACES).unwrap_err();
        assert_eq!(err, Unterminated { depth: 1 });
        assert_eq!(balance("", 0, BRACES).unwrap_err().depth, 1);
    }

    #[test]
    fn counts_delimiters_inside_strings() {
        // The brace inside the literal opens a level that is never closed.
        let text = "{ let s = \"{\"; }";
        assert!(balance(text, 1, BRACES).is_err());
    }
}
