//! Lua locator: `function <name>(...)` by regex, then a forward scan for the
//! terminating `end`.
//!
//! [`LuaTerminator::Literal`] stops at the first `e`,`n`,`d` byte sequence after
//! the signature, wherever it appears: inside a nested block, a string, a
//! comment or a longer identifier such as `pending`. Spans of any function with
//! a nested block are therefore cut short. [`LuaTerminator::BlockAware`] tokenizes
//! instead and tracks block depth.

use anyhow::{Context, Result};
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use crate::config::{AnalysisConfig, LuaTerminator};
use crate::dispatch::{LanguageDriver, SourceAnalysis};
use crate::language::Language;
use crate::span::{line_at_byte, CallIdentifier, DefinitionSpan};

pub struct LuaDriver;

impl LanguageDriver for LuaDriver {
    fn language(&self) -> Language {
        Language::Lua
    }

    fn analyze<'s>(&self, source: &'s str, opts: &AnalysisConfig) -> Result<Box<dyn SourceAnalysis + 's>> {
        Ok(Box::new(LuaSource {
            source,
            terminator: opts.lua_terminator,
        }))
    }
}

pub struct LuaSource<'s> {
    source: &'s str,
    terminator: LuaTerminator,
}

#[derive(Debug)]
struct LuaPatterns {
    /// `function` + name + `(...)`
    signature: Regex,
    /// name + `(`
    call: Regex,
}

impl LuaPatterns {
    fn new(target: &str) -> Result<Self> {
        let name = regex::escape(target);
        Ok(Self {
            signature: Regex::new(&format!(r"\bfunction\s+{name}\b\s*\(.*?\)"))
                .with_context(|| format!("Failed to build Lua signature regex for `{target}`"))?,
            call: Regex::new(&format!(r"\b{name}\b\s*\("))
                .with_context(|| format!("Failed to build Lua call regex for `{target}`"))?,
        })
    }
}

fn lua_patterns(target: &str) -> Result<Arc<LuaPatterns>> {
    static CACHE: OnceLock<Mutex<HashMap<String, Arc<LuaPatterns>>>> = OnceLock::new();
    let mut cache = CACHE
        .get_or_init(|| Mutex::new(HashMap::new()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    if let Some(p) = cache.get(target) {
        return Ok(Arc::clone(p));
    }
    let built = Arc::new(LuaPatterns::new(target)?);
    cache.insert(target.to_string(), Arc::clone(&built));
    Ok(built)
}

impl<'s> LuaSource<'s> {
    pub fn new(source: &'s str, terminator: LuaTerminator) -> Self {
        Self { source, terminator }
    }

    fn patterns(&self, target: &str) -> Option<Arc<LuaPatterns>> {
        match lua_patterns(target) {
            Ok(p) => Some(p),
            Err(e) => {
                crate::debug_log!("[callspan] {e:#}");
                None
            }
        }
    }

    fn body_end(&self, from: usize) -> Option<usize> {
        match self.terminator {
            LuaTerminator::Literal => literal_end(self.source, from),
            LuaTerminator::BlockAware => block_aware_end(self.source, from),
        }
    }
}

impl SourceAnalysis for LuaSource<'_> {
    fn locate_definitions(&self, target: &str) -> Vec<DefinitionSpan> {
        let Some(patterns) = self.patterns(target) else { return vec![] };
        let source = self.source;

        let mut out = Vec::new();
        for m in patterns.signature.find_iter(source) {
            let Some(end) = self.body_end(m.end()) else {
                crate::debug_log!(
                    "[callspan] dropping `{target}` at line {}: no terminating `end`",
                    line_at_byte(source, m.start())
                );
                continue;
            };

            out.push(DefinitionSpan {
                name: target.to_string(),
                start_line: line_at_byte(source, m.start()),
                end_line: line_at_byte(source, end - 1),
                content: source[m.start()..end].to_string(),
                bytes: m.start()..end,
            });
        }
        out
    }

    fn extract_calls(&self, target: &str) -> Vec<CallIdentifier> {
        let Some(patterns) = self.patterns(target) else { return vec![] };
        let declared: Vec<_> = patterns
            .signature
            .find_iter(self.source)
            .map(|m| m.range())
            .collect();

        patterns
            .call
            .find_iter(self.source)
            .filter(|m| !declared.iter().any(|r| r.contains(&m.start())))
            .map(|m| CallIdentifier {
                name: target.to_string(),
                offset: m.start(),
            })
            .collect()
    }
}

/// Byte just past the first `end` trigram at or after `from`.
pub fn literal_end(source: &str, from: usize) -> Option<usize> {
    let rest = source.get(from..)?;
    rest.find("end").map(|rel| from + rel + 3)
}

/// Byte just past the `end` closing the block opened before `from`.
///
/// `function`, `if`, `do` and `repeat` open a block; `end` and `until` close one.
/// `for`/`while` are covered by their `do`. Strings, long brackets and comments
/// are skipped.
pub fn block_aware_end(source: &str, from: usize) -> Option<usize> {
    let bytes = source.as_bytes();
    let mut depth = 1usize;
    let mut pos = from;

    while pos < bytes.len() {
        let b = bytes[pos];
        match b {
            b'-' if bytes.get(pos + 1) == Some(&b'-') => {
                pos += 2;
                if let Some(level) = long_bracket_level(bytes, pos) {
                    pos = skip_long_bracket(bytes, pos, level)?;
                } else {
                    while pos < bytes.len() && bytes[pos] != b'\n' {
                        pos += 1;
                    }
                }
            }
            b'"' | b'\'' => pos = skip_quoted(bytes, pos)?,
            b'[' => match long_bracket_level(bytes, pos) {
                Some(level) => pos = skip_long_bracket(bytes, pos, level)?,
                None => pos += 1,
            },
            b if b.is_ascii_alphabetic() || b == b'_' => {
                let start = pos;
                while pos < bytes.len() && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'_') {
                    pos += 1;
                }
                match &source[start..pos] {
                    "function" | "if" | "do" | "repeat" => depth += 1,
                    "end" | "until" => {
                        depth -= 1;
                        if depth == 0 {
                            return Some(pos);
                        }
                    }
                    _ => {}
                }
            }
            b if b.is_ascii_digit() => {
                while pos < bytes.len() && (bytes[pos].is_ascii_alphanumeric() || matches!(bytes[pos], b'_' | b'.')) {
                    pos += 1;
                }
            }
            _ => pos += 1,
        }
    }

    None
}

/// `Some(n)` when `pos` starts a long bracket `[` `=`*n `[`.
fn long_bracket_level(bytes: &[u8], pos: usize) -> Option<usize> {
    if bytes.get(pos) != Some(&b'[') {
        return None;
    }
    let mut i = pos + 1;
    while bytes.get(i) == Some(&b'=') {
        i += 1;
    }
    if bytes.get(i) == Some(&b'[') {
        Some(i - pos - 1)
    } else {
        None
    }
}

fn skip_long_bracket(bytes: &[u8], pos: usize, level: usize) -> Option<usize> {
    let mut i = pos + level + 2;
    while i < bytes.len() {
        if bytes[i] == b']' {
            let mut j = i + 1;
            while j < bytes.len() && bytes[j] == b'=' && j - i - 1 < level {
                j += 1;
            }
            if j - i - 1 == level && bytes.get(j) == Some(&b']') {
                return Some(j + 1);
            }
        }
        i += 1;
    }
    None
}

/// Past the closing quote. An unclosed quote ends at the newline, like Lua's lexer gives up.
fn skip_quoted(bytes: &[u8], pos: usize) -> Option<usize> {
    let quote = bytes[pos];
    let mut i = pos + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'\n' => return Some(i),
            b if b == quote => return Some(i + 1),
            _ => i += 1,
        }
    }
    None
}
