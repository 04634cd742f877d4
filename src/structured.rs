//! Grammar-backed locators: the whole file is parsed with tree-sitter, every
//! function/method declaration is recorded, and every call expression whose
//! callee is a plain identifier is collected.

use anyhow::{anyhow, Context, Result};
use std::sync::OnceLock;
use tree_sitter::{Language as Grammar, Node, Parser, Query, QueryCursor, StreamingIterator, Tree};

use crate::config::{AnalysisConfig, StructuredEnd};
use crate::dispatch::{LanguageDriver, SourceAnalysis};
use crate::language::Language;
use crate::span::{slice_lines, CallIdentifier, DefinitionSpan};

/// Node names one structured language needs.
struct Syntax {
    language: Language,
    /// Query with `@name` (declared identifier) and `@def` (whole declaration) captures.
    definitions: &'static str,
    call_kind: &'static str,
    /// Field of the call node holding the callee. Only `identifier` callees count.
    callee_field: &'static str,
}

const PYTHON: Syntax = Syntax {
    language: Language::Python,
    definitions: r#"(function_definition name: (identifier) @name) @def"#,
    call_kind: "call",
    callee_field: "function",
};

#[cfg_attr(not(feature = "lang-java"), allow(dead_code))]
const JAVA: Syntax = Syntax {
    language: Language::Java,
    definitions: r#"(method_declaration name: (identifier) @name) @def"#,
    call_kind: "method_invocation",
    callee_field: "name",
};

pub struct PythonDriver;

impl LanguageDriver for PythonDriver {
    fn language(&self) -> Language {
        Language::Python
    }

    fn analyze<'s>(&self, source: &'s str, opts: &AnalysisConfig) -> Result<Box<dyn SourceAnalysis + 's>> {
        let grammar: Grammar = tree_sitter_python::LANGUAGE.into();
        Ok(Box::new(ParsedSource::build(&PYTHON, &grammar, source, opts)?))
    }
}

pub struct JavaDriver;

impl LanguageDriver for JavaDriver {
    fn language(&self) -> Language {
        Language::Java
    }

    #[cfg(feature = "lang-java")]
    fn analyze<'s>(&self, source: &'s str, opts: &AnalysisConfig) -> Result<Box<dyn SourceAnalysis + 's>> {
        let grammar: Grammar = tree_sitter_java::LANGUAGE.into();
        Ok(Box::new(ParsedSource::build(&JAVA, &grammar, source, opts)?))
    }

    #[cfg(not(feature = "lang-java"))]
    fn analyze<'s>(&self, _source: &'s str, _opts: &AnalysisConfig) -> Result<Box<dyn SourceAnalysis + 's>> {
        Err(anyhow!("java support not compiled in (enable the `lang-java` feature)"))
    }
}

/// Full definition table and call list of one parsed file.
#[derive(Debug, Default)]
pub struct ParsedSource {
    pub definitions: Vec<DefinitionSpan>,
    pub calls: Vec<CallIdentifier>,
}

impl ParsedSource {
    fn build(syntax: &Syntax, grammar: &Grammar, source: &str, opts: &AnalysisConfig) -> Result<Self> {
        let tree = parse_strict(grammar, source, syntax.language)?;
        let root = tree.root_node();

        let definitions = definition_table(syntax, grammar, root, source, opts.structured_end)?;

        let mut calls = Vec::new();
        collect_calls(root, source.as_bytes(), syntax, &mut calls);

        Ok(Self { definitions, calls })
    }
}

impl SourceAnalysis for ParsedSource {
    fn locate_definitions(&self, target: &str) -> Vec<DefinitionSpan> {
        self.definitions
            .iter()
            .filter(|d| d.name == target)
            .cloned()
            .collect()
    }

    // Every call in the file; the recursion filter does the name matching.
    fn extract_calls(&self, _target: &str) -> Vec<CallIdentifier> {
        self.calls.clone()
    }
}

/// Parse `source`, treating any syntax error as an unparseable file.
fn parse_strict(grammar: &Grammar, source: &str, language: Language) -> Result<Tree> {
    let mut parser = Parser::new();
    parser
        .set_language(grammar)
        .context("Failed to set tree-sitter language")?;

    let tree = parser
        .parse(source, None)
        .ok_or_else(|| anyhow!("tree-sitter parse failed for {language} source"))?;

    let root = tree.root_node();
    if root.has_error() {
        let line = first_error_line(root).unwrap_or(1);
        return Err(anyhow!("unparseable {language} source: syntax error near line {line}"));
    }
    Ok(tree)
}

fn first_error_line(node: Node) -> Option<usize> {
    if node.is_error() || node.is_missing() {
        return Some(node.start_position().row + 1);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if let Some(line) = first_error_line(child) {
            return Some(line);
        }
    }
    None
}

/// The `definitions` query, compiled once per language.
fn definitions_query(syntax: &Syntax, grammar: &Grammar) -> Result<&'static Query> {
    static PYTHON_QUERY: OnceLock<Result<Query, String>> = OnceLock::new();
    static JAVA_QUERY: OnceLock<Result<Query, String>> = OnceLock::new();
    let cell = match syntax.language {
        Language::Java => &JAVA_QUERY,
        _ => &PYTHON_QUERY,
    };
    cell.get_or_init(|| Query::new(grammar, syntax.definitions).map_err(|e| e.to_string()))
        .as_ref()
        .map_err(|e| anyhow!("{e}"))
        .context("Failed to compile tree-sitter query")
}

fn definition_table(
    syntax: &Syntax,
    grammar: &Grammar,
    root: Node,
    source: &str,
    end: StructuredEnd,
) -> Result<Vec<DefinitionSpan>> {
    let query = definitions_query(syntax, grammar)?;
    let mut cursor = QueryCursor::new();
    let bytes = source.as_bytes();

    let mut out: Vec<DefinitionSpan> = Vec::new();
    let mut matches = cursor.matches(query, root, bytes);
    while let Some(m) = matches.next() {
        let mut name_node: Option<Node> = None;
        let mut def_node: Option<Node> = None;

        for cap in m.captures {
            match query.capture_names()[cap.index as usize] {
                "name" => name_node = Some(cap.node),
                "def" => def_node = Some(cap.node),
                _ => {}
            }
        }

        let (Some(name_node), Some(def_node)) = (name_node, def_node) else { continue };
        let name = name_node.utf8_text(bytes).unwrap_or("").trim().to_string();
        if name.is_empty() {
            continue;
        }

        out.push(span_for(source, name, name_node, def_node, end));
    }

    // Pre-order, outer before nested.
    out.sort_by_key(|d| d.bytes.start);
    Ok(out)
}

fn span_for(source: &str, name: String, name_node: Node, def_node: Node, end: StructuredEnd) -> DefinitionSpan {
    // The declared name's line, so decorators and annotations above it don't count.
    let start_line = name_node.start_position().row + 1;

    let end_line = match end {
        StructuredEnd::NodeEnd => last_line(def_node),
        StructuredEnd::LastStatementStart => last_statement(def_node)
            .map(|stmt| stmt.start_position().row + 1)
            .unwrap_or(start_line),
    }
    .max(start_line);

    DefinitionSpan {
        name,
        start_line,
        end_line,
        content: slice_lines(source, start_line, end_line),
        bytes: def_node.start_byte()..def_node.end_byte(),
    }
}

/// 1-based last line a node occupies. A node ending at column 0 ends on the previous line.
fn last_line(node: Node) -> usize {
    let end = node.end_position();
    if end.column == 0 && end.row > node.start_position().row {
        end.row
    } else {
        end.row + 1
    }
}

fn last_statement(def_node: Node) -> Option<Node> {
    let body = def_node.child_by_field_name("body")?;
    let mut cursor = body.walk();
    let last = body
        .named_children(&mut cursor)
        .filter(|n| !n.kind().contains("comment"))
        .last();
    last
}

fn collect_calls(node: Node, source: &[u8], syntax: &Syntax, out: &mut Vec<CallIdentifier>) {
    if node.kind() == syntax.call_kind {
        if let Some(callee) = node.child_by_field_name(syntax.callee_field) {
            if callee.kind() == "identifier" {
                if let Ok(text) = callee.utf8_text(source) {
                    out.push(CallIdentifier {
                        name: text.to_string(),
                        offset: node.start_byte(),
                    });
                }
            }
        }
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_calls(child, source, syntax, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PY_SRC: &str = r#"import os


def walk(node):
    if node is None:
        return 0
    return 1 + walk(
        node.next,
    )


def helper():
    return os.getcwd()
"#;

    fn analyze_py(src: &str, end: StructuredEnd) -> Result<Box<dyn SourceAnalysis + '_>> {
        let opts = AnalysisConfig {
            structured_end: end,
            ..AnalysisConfig::default()
        };
        PythonDriver.analyze(src, &opts)
    }

    #[test]
    fn definitions_query_is_compiled_once() {
        let grammar: Grammar = tree_sitter_python::LANGUAGE.into();
        let a = definitions_query(&PYTHON, &grammar).unwrap();
        let b = definitions_query(&PYTHON, &grammar).unwrap();
        assert!(std::ptr::eq(a, b));

        // Two files through the driver reuse it.
        for _ in 0..2 {
            let parsed = analyze_py(PY_SRC, StructuredEnd::NodeEnd).unwrap();
            assert_eq!(parsed.locate_definitions("walk").len(), 1);
        }
        assert!(std::ptr::eq(a, definitions_query(&PYTHON, &grammar).unwrap()));
    }

    #[test]
    fn python_definition_uses_node_end() {
        let parsed = analyze_py(PY_SRC, StructuredEnd::NodeEnd).unwrap();
        let defs = parsed.locate_definitions("walk");
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].start_line, 4);
        assert_eq!(defs[0].end_line, 9);
        assert!(defs[0].content.starts_with("def walk(node):"));
        assert!(defs[0].content.trim_end().ends_with(')'));
    }

    #[test]
    fn python_last_statement_start_undercounts() {
        let parsed = analyze_py(PY_SRC, StructuredEnd::LastStatementStart).unwrap();
        let defs = parsed.locate_definitions("walk");
        assert_eq!(defs[0].start_line, 4);
        // `return 1 + walk(` starts on line 7 even though it runs to line 9.
        assert_eq!(defs[0].end_line, 7);
    }

    #[test]
    fn python_calls_are_bare_identifiers_only() {
        let parsed = analyze_py(PY_SRC, StructuredEnd::NodeEnd).unwrap();
        let names: Vec<String> = parsed.extract_calls("walk").into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["walk".to_string()]);
    }

    #[test]
    fn python_missing_name_is_empty_not_error() {
        let parsed = analyze_py(PY_SRC, StructuredEnd::NodeEnd).unwrap();
        assert!(parsed.locate_definitions("nope").is_empty());
    }

    #[test]
    fn python_decorated_and_async_definitions() {
        let src = "@cache\ndef fib(n):\n    return n if n < 2 else fib(n - 1) + fib(n - 2)\n\nasync def poll():\n    await poll()\n";
        let parsed = analyze_py(src, StructuredEnd::NodeEnd).unwrap();
        let fib = parsed.locate_definitions("fib");
        assert_eq!(fib[0].start_line, 2);
        assert_eq!(fib[0].end_line, 3);
        let poll = parsed.locate_definitions("poll");
        assert_eq!(poll[0].start_line, 5);
    }

    #[test]
    fn python_syntax_error_is_unparseable() {
        let err = analyze_py("def broken(:\n    pass\n", StructuredEnd::NodeEnd).err().unwrap();
        assert!(err.to_string().contains("unparseable python source"), "{err}");
    }

    #[cfg(feature = "lang-java")]
    const JAVA_SRC: &str = r#"public class MathOps {
    public int fact(int n) {
        if (n <= 1) {
            return 1;
        }
        return n * fact(n - 1);
    }

    @Override
    public int twice(int n) {
        return this.add(n, n);
    }

    abstract void hook();
}
"#;

    #[cfg(feature = "lang-java")]
    #[test]
    fn java_method_spans() {
        let parsed = JavaDriver.analyze(JAVA_SRC, &AnalysisConfig::default()).unwrap();
        let fact = parsed.locate_definitions("fact");
        assert_eq!(fact.len(), 1);
        assert_eq!((fact[0].start_line, fact[0].end_line), (2, 7));
        assert!(fact[0].content.trim_start().starts_with("public int fact(int n) {"));
        assert!(fact[0].content.trim_end().ends_with('}'));

        let twice = parsed.locate_definitions("twice");
        assert_eq!(twice[0].start_line, 10, "annotation line is not the declaration line");

        let hook = parsed.locate_definitions("hook");
        assert_eq!((hook[0].start_line, hook[0].end_line), (14, 14));
    }

    #[cfg(feature = "lang-java")]
    #[test]
    fn java_last_statement_start() {
        let opts = AnalysisConfig {
            structured_end: StructuredEnd::LastStatementStart,
            ..AnalysisConfig::default()
        };
        let parsed = JavaDriver.analyze(JAVA_SRC, &opts).unwrap();
        let fact = parsed.locate_definitions("fact");
        assert_eq!((fact[0].start_line, fact[0].end_line), (2, 6));
    }

    #[cfg(feature = "lang-java")]
    #[test]
    fn java_calls_keep_names_only() {
        let parsed = JavaDriver.analyze(JAVA_SRC, &AnalysisConfig::default()).unwrap();
        let names: Vec<String> = parsed.extract_calls("fact").into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["fact".to_string(), "add".to_string()]);
    }
}
