//! Signature regex + brace balancing for the C family.
//!
//! A definition is a run of known modifier/type keywords, the target name as a
//! whole word, a parameter list on one line (lazy, not balanced) and an opening
//! brace. The body ends where [`balance`] closes that brace. Generic return
//! types, qualified names (`Foo::bar`) and trailing qualifiers (`const`,
//! `noexcept`) are not recognised.

use anyhow::{Context, Result};
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use crate::balancer::{balance, BRACES};
use crate::config::AnalysisConfig;
use crate::dispatch::{LanguageDriver, SourceAnalysis};
use crate::language::Language;
use crate::span::{line_at_byte, CallIdentifier, DefinitionSpan};

const CSHARP_KEYWORDS: &[&str] = &[
    "public", "private", "protected", "internal", "static", "virtual", "override", "abstract", "async",
    "sealed", "extern", "unsafe", "new", "partial", "ref", "readonly", "volatile", "void", "int",
    "float", "double", "string", "bool", "char", "byte", "short", "long", "decimal", "object",
    "dynamic", "var",
];

const CPP_KEYWORDS: &[&str] = &[
    "void", "int", "float", "double", "string", "bool", "char", "byte", "short", "long", "unsigned",
    "signed", "const", "static", "inline", "virtual", "template", "typename", "class", "struct",
    "auto", "constexpr", "size_t",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    CSharp,
    Cpp,
}

impl Dialect {
    fn keywords(self) -> &'static [&'static str] {
        match self {
            Dialect::CSharp => CSHARP_KEYWORDS,
            Dialect::Cpp => CPP_KEYWORDS,
        }
    }

    /// One or more keywords separated by spaces or tabs, never by a newline,
    /// so a keyword ending the previous line cannot pull the match start up.
    fn keyword_run(self) -> &'static str {
        static CSHARP: OnceLock<String> = OnceLock::new();
        static CPP: OnceLock<String> = OnceLock::new();
        let cell = match self {
            Dialect::CSharp => &CSHARP,
            Dialect::Cpp => &CPP,
        };
        cell.get_or_init(|| format!(r"(?:\b(?:{})[ \t]+)+", self.keywords().join("|")))
    }
}

pub struct CSharpDriver;

impl LanguageDriver for CSharpDriver {
    fn language(&self) -> Language {
        Language::CSharp
    }

    fn analyze<'s>(&self, source: &'s str, _opts: &AnalysisConfig) -> Result<Box<dyn SourceAnalysis + 's>> {
        Ok(Box::new(PatternSource::new(Dialect::CSharp, source)))
    }
}

pub struct CppDriver;

impl LanguageDriver for CppDriver {
    fn language(&self) -> Language {
        Language::Cpp
    }

    fn analyze<'s>(&self, source: &'s str, _opts: &AnalysisConfig) -> Result<Box<dyn SourceAnalysis + 's>> {
        Ok(Box::new(PatternSource::new(Dialect::Cpp, source)))
    }
}

/// Regexes for one target name in one dialect.
#[derive(Debug)]
struct TargetPatterns {
    /// keywords + name + `(...)` + `{`
    signature: Regex,
    /// keywords + name + `(`; covers prototypes as well as definitions.
    declaration: Regex,
    /// name + `(`
    call: Regex,
}

impl TargetPatterns {
    fn new(dialect: Dialect, target: &str) -> Result<Self> {
        let name = regex::escape(target);
        let run = dialect.keyword_run();
        Ok(Self {
            signature: Regex::new(&format!(r"{run}\b{name}\b\s*\(.*?\)\s*\{{"))
                .with_context(|| format!("Failed to build signature regex for `{target}`"))?,
            declaration: Regex::new(&format!(r"{run}\b{name}\b\s*\("))
                .with_context(|| format!("Failed to build declaration regex for `{target}`"))?,
            call: Regex::new(&format!(r"\b{name}\b\s*\("))
                .with_context(|| format!("Failed to build call regex for `{target}`"))?,
        })
    }
}

/// Built once per (dialect, target) for the life of the process.
fn target_patterns(dialect: Dialect, target: &str) -> Result<Arc<TargetPatterns>> {
    static CACHE: OnceLock<Mutex<HashMap<(Dialect, String), Arc<TargetPatterns>>>> = OnceLock::new();
    let mut cache = CACHE
        .get_or_init(|| Mutex::new(HashMap::new()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    if let Some(p) = cache.get(&(dialect, target.to_string())) {
        return Ok(Arc::clone(p));
    }
    let built = Arc::new(TargetPatterns::new(dialect, target)?);
    cache.insert((dialect, target.to_string()), Arc::clone(&built));
    Ok(built)
}

pub struct PatternSource<'s> {
    dialect: Dialect,
    source: &'s str,
}

impl<'s> PatternSource<'s> {
    pub fn new(dialect: Dialect, source: &'s str) -> Self {
        Self { dialect, source }
    }

    fn patterns(&self, target: &str) -> Option<Arc<TargetPatterns>> {
        match target_patterns(self.dialect, target) {
            Ok(p) => Some(p),
            Err(e) => {
                crate::debug_log!("[callspan] {e:#}");
                None
            }
        }
    }
}

impl SourceAnalysis for PatternSource<'_> {
    fn locate_definitions(&self, target: &str) -> Vec<DefinitionSpan> {
        let Some(patterns) = self.patterns(target) else { return vec![] };
        let source = self.source;

        let mut out = Vec::new();
        for m in patterns.signature.find_iter(source) {
            // The match ends just past the opening brace.
            let end = match balance(source, m.end(), BRACES) {
                Ok(end) => end,
                Err(e) => {
                    crate::debug_log!(
                        "[callspan] dropping `{target}` at line {}: {e}",
                        line_at_byte(source, m.start())
                    );
                    continue;
                }
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
            .declaration
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
