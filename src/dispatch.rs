use anyhow::Result;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::config::{AnalysisConfig, CallScope};
use crate::language::{Language, SourceFile};
use crate::pattern::{CSharpDriver, CppDriver};
use crate::span::{CallIdentifier, DefinitionSpan};
use crate::structured::{JavaDriver, PythonDriver};
use crate::token_scan::LuaDriver;

/// Per-language entry point. `analyze` fails only when the file is unparseable.
pub trait LanguageDriver: Send + Sync {
    fn language(&self) -> Language;

    fn analyze<'s>(&self, source: &'s str, opts: &AnalysisConfig) -> Result<Box<dyn SourceAnalysis + 's>>;
}

/// The two queries every backend answers for one file.
pub trait SourceAnalysis {
    /// Every definition of `target`, in source order. Empty when there is none.
    fn locate_definitions(&self, target: &str) -> Vec<DefinitionSpan>;

    /// Identifiers in call position. Backends without a call-expression parse
    /// only report `target(` occurrences.
    fn extract_calls(&self, target: &str) -> Vec<CallIdentifier>;
}

impl Language {
    pub fn driver(self) -> &'static dyn LanguageDriver {
        match self {
            Language::Python => &PythonDriver,
            Language::Java => &JavaDriver,
            Language::CSharp => &CSharpDriver,
            Language::Cpp => &CppDriver,
            Language::Lua => &LuaDriver,
        }
    }
}

/// Result for one file: queried name to its self-recursive definition, if any.
#[derive(Debug, Clone, Serialize)]
pub struct FileResult {
    pub path: PathBuf,
    pub language: Language,
    pub functions: BTreeMap<String, Option<DefinitionSpan>>,
}

impl FileResult {
    pub fn has_match(&self) -> bool {
        self.functions.values().any(Option::is_some)
    }
}

/// Keep a definition of `target` only when `target` is also called.
///
/// With [`CallScope::File`] any call in the file qualifies; with [`CallScope::Body`]
/// the call has to sit inside that definition. Several qualifying definitions
/// (overloads, redefinitions) collapse to the last one.
pub fn self_recursive_definition(
    definitions: &[DefinitionSpan],
    calls: &[CallIdentifier],
    target: &str,
    scope: CallScope,
) -> Option<DefinitionSpan> {
    let mut target_calls = calls.iter().filter(|c| c.name == target);

    match scope {
        CallScope::File => {
            if target_calls.next().is_some() {
                definitions.last().cloned()
            } else {
                None
            }
        }
        CallScope::Body => {
            let offsets: Vec<usize> = target_calls.map(|c| c.offset).collect();
            definitions
                .iter()
                .filter(|d| offsets.iter().any(|&off| d.contains_offset(off)))
                .last()
                .cloned()
        }
    }
}

/// Run the file's backend once and answer every target name against it.
pub fn dispatch_file(
    file: &SourceFile,
    source: &str,
    targets: &[String],
    opts: &AnalysisConfig,
) -> Result<FileResult> {
    let analysis = file.language.driver().analyze(source, opts)?;

    let mut functions = BTreeMap::new();
    for target in targets {
        let definitions = analysis.locate_definitions(target);
        let found = if definitions.is_empty() {
            None
        } else {
            let calls = analysis.extract_calls(target);
            self_recursive_definition(&definitions, &calls, target, opts.call_scope)
        };
        functions.insert(target.clone(), found);
    }

    Ok(FileResult {
        path: file.path.clone(),
        language: file.language,
        functions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(name: &str, start: usize, end: usize, bytes: std::ops::Range<usize>) -> DefinitionSpan {
        DefinitionSpan {
            name: name.to_string(),
            start_line: start,
            end_line: end,
            content: String::new(),
            bytes,
        }
    }

    fn call(name: &str, offset: usize) -> CallIdentifier {
        CallIdentifier {
            name: name.to_string(),
            offset,
        }
    }

    #[test]
    fn drivers_match_their_language() {
        for lang in Language::ALL {
            assert_eq!(lang.driver().language(), lang);
        }
    }

    #[test]
    fn analyze_is_the_only_failure_point() {
        let opts = AnalysisConfig::default();
        assert!(Language::Python.driver().analyze("def f(:\n", &opts).is_err());

        // Unterminated candidates are dropped, not reported as errors.
        for (lang, text) in [
            (Language::Cpp, "int f(int n) {\n    return f(n);\n"),
            (Language::CSharp, "public int f(int n) {\n    return f(n);\n"),
            (Language::Lua, "function f(n)\n  return f(n)\n"),
        ] {
            let analysis = lang.driver().analyze(text, &opts).unwrap();
            assert!(analysis.locate_definitions("f").is_empty(), "{lang}");
            assert_eq!(analysis.extract_calls("f").len(), 1, "{lang}");
        }
    }

    #[test]
    fn no_self_call_means_absent() {
        let defs = vec![span("f", 1, 3, 0..30)];
        let calls = vec![call("g", 10)];
        assert!(self_recursive_definition(&defs, &calls, "f", CallScope::File).is_none());
        assert!(self_recursive_definition(&defs, &calls, "f", CallScope::Body).is_none());
    }

    #[test]
    fn file_scope_takes_last_definition() {
        let defs = vec![span("f", 1, 3, 0..30), span("f", 5, 8, 40..80)];
        let calls = vec![call("f", 10)];
        let found = self_recursive_definition(&defs, &calls, "f", CallScope::File).unwrap();
        assert_eq!(found.start_line, 5);
    }

    #[test]
    fn body_scope_requires_call_inside_definition() {
        let defs = vec![span("f", 1, 3, 0..30), span("f", 5, 8, 40..80)];

        let inside_first = vec![call("f", 10)];
        let found = self_recursive_definition(&defs, &inside_first, "f", CallScope::Body).unwrap();
        assert_eq!(found.start_line, 1);

        let outside = vec![call("f", 100)];
        assert!(self_recursive_definition(&defs, &outside, "f", CallScope::Body).is_none());
    }

    #[test]
    fn dispatch_records_absent_names() {
        let file = SourceFile::detect("calc.py").unwrap();
        let src = "def f():\n    return f()\n\ndef g():\n    return 1\n";
        let targets = vec!["f".to_string(), "g".to_string(), "h".to_string()];
        let result = dispatch_file(&file, src, &targets, &AnalysisConfig::default()).unwrap();

        assert!(result.has_match());
        assert_eq!(result.functions["f"].as_ref().unwrap().start_line, 1);
        assert!(result.functions["g"].is_none());
        assert!(result.functions["h"].is_none());
    }
}
