use serde::Serialize;
use std::ops::Range;

/// Where a definition lives and what it says.
///
/// Lines are 1-based and inclusive; `start_line <= end_line` always holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DefinitionSpan {
    pub name: String,
    pub start_line: usize,
    pub end_line: usize,
    pub content: String,

    /// Byte range of the definition in its file. Used to attribute calls to a body.
    #[serde(skip)]
    pub bytes: Range<usize>,
}

impl DefinitionSpan {
    pub fn contains_offset(&self, offset: usize) -> bool {
        self.bytes.contains(&offset)
    }
}

/// A bare name seen in call position.
///
/// No receiver, scope or arguments are kept. `offset` is the byte where the
/// call expression starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallIdentifier {
    pub name: String,
    pub offset: usize,
}

/// Byte offset of the start of each line (index 0 = line 1).
pub fn line_byte_offsets(text: &str) -> Vec<usize> {
    let mut offsets = vec![0usize];
    for (i, b) in text.bytes().enumerate() {
        if b == b'\n' {
            offsets.push(i + 1);
        }
    }
    offsets
}

/// 1-based line number containing `byte`.
pub fn line_at_byte(text: &str, byte: usize) -> usize {
    let end = byte.min(text.len());
    text.as_bytes()[..end].iter().filter(|&&b| b == b'\n').count() + 1
}

/// Literal text of lines `start..=end` (1-based), each keeping its newline.
pub fn slice_lines(text: &str, start: usize, end: usize) -> String {
    if start == 0 || end < start {
        return String::new();
    }
    text.split_inclusive('\n')
        .skip(start - 1)
        .take(end - start + 1)
        .collect()
}

/// Byte range covered by lines `start..=end` (1-based).
pub fn line_range_bytes(offsets: &[usize], text_len: usize, start: usize, end: usize) -> Range<usize> {
    let from = offsets.get(start.saturating_sub(1)).copied().unwrap_or(text_len);
    let to = offsets.get(end).copied().unwrap_or(text_len);
    from..to.max(from)
}
