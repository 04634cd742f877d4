use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Name of the optional per-tree config file, looked up at the scan root.
pub const CONFIG_FILE_NAME: &str = ".callspan.json";

/// Controls which files the tree walk hands to the dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Directory *names* to skip anywhere in the tree (e.g. "vendor", "build").
    ///
    /// These are compared against path components, not full paths.
    pub exclude_dir_names: Vec<String>,

    /// Honour `.gitignore` / `.ignore` files while walking.
    ///
    /// Off by default: every file under the root is considered, hidden ones included.
    pub respect_ignore_files: bool,

    /// Files larger than this are skipped without being read.
    pub max_file_bytes: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            exclude_dir_names: vec![],
            respect_ignore_files: false,
            max_file_bytes: 4 * 1024 * 1024,
        }
    }
}

/// Where a call to the target has to appear for a definition to count as self-recursive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum CallScope {
    /// Anywhere in the file.
    #[default]
    File,
    /// Inside the byte range of the definition itself.
    Body,
}

/// How grammar-backed locators compute `end_line`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum StructuredEnd {
    /// Last line of the declaration node.
    #[default]
    NodeEnd,
    /// Start line of the last statement in the body. Undercounts when that
    /// statement spans several lines.
    LastStatementStart,
}

/// How the Lua locator finds the end of a function body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum LuaTerminator {
    /// First raw `end` trigram after the signature, with no lexical awareness.
    #[default]
    Literal,
    /// Keyword scanner that tracks block depth and skips strings and comments.
    BlockAware,
}

/// Knobs for the extraction backends.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub call_scope: CallScope,
    pub structured_end: StructuredEnd,
    pub lua_terminator: LuaTerminator,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Settings that govern file discovery and exclusion.
    pub scan: ScanConfig,
    /// Settings that govern span computation and the recursion filter.
    pub analysis: AnalysisConfig,
}

/// Load `.callspan.json` from `root`, falling back to defaults when it is absent or malformed.
pub fn load_config(root: &Path) -> Config {
    let primary = root.join(CONFIG_FILE_NAME);

    let text = std::fs::read_to_string(&primary);
    let Ok(text) = text else { return Config::default() };

    match serde_json::from_str::<Config>(&text) {
        Ok(cfg) => cfg,
        Err(e) => {
            crate::debug_log!("[callspan] ignoring malformed {}: {e}", primary.display());
            Config::default()
        }
    }
}
