use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Languages the scanner understands. Closed set; dispatch is a `match`, not a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    Java,
    CSharp,
    Cpp,
    Lua,
}

/// Extension (lowercase, without dot) to language.
static EXTENSIONS: &[(&str, Language)] = &[
    ("py", Language::Python),
    ("java", Language::Java),
    ("cs", Language::CSharp),
    ("cpp", Language::Cpp),
    ("lua", Language::Lua),
];

impl Language {
    pub const ALL: [Language; 5] = [
        Language::Python,
        Language::Java,
        Language::CSharp,
        Language::Cpp,
        Language::Lua,
    ];

    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.to_ascii_lowercase();
        EXTENSIONS
            .iter()
            .find(|(e, _)| *e == ext)
            .map(|(_, lang)| *lang)
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    pub fn name(self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::Java => "java",
            Language::CSharp => "csharp",
            Language::Cpp => "cpp",
            Language::Lua => "lua",
        }
    }

    pub fn extension(self) -> &'static str {
        EXTENSIONS
            .iter()
            .find(|(_, lang)| *lang == self)
            .map(|(e, _)| *e)
            .unwrap_or("")
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A file selected for scanning, tagged with the language its extension maps to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub language: Language,
}

impl SourceFile {
    /// `None` for any extension outside the supported table.
    pub fn detect(path: impl Into<PathBuf>) -> Option<Self> {
        let path = path.into();
        let language = Language::from_path(&path)?;
        Some(Self { path, language })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_supported_extensions() {
        assert_eq!(Language::from_path(Path::new("a/b.py")), Some(Language::Python));
        assert_eq!(Language::from_path(Path::new("Main.java")), Some(Language::Java));
        assert_eq!(Language::from_path(Path::new("Orbit.CS")), Some(Language::CSharp));
        assert_eq!(Language::from_path(Path::new("x.cpp")), Some(Language::Cpp));
        assert_eq!(Language::from_path(Path::new("init.lua")), Some(Language::Lua));
    }

    #[test]
    fn ignores_everything_else() {
        for p in ["notes.txt", "lib.rs", "header.h", "x.cc", "Makefile", ".py"] {
            assert!(SourceFile::detect(p).is_none(), "{p} should not be detected");
        }
    }

    #[test]
    fn extension_round_trips_through_table() {
        for lang in Language::ALL {
            assert_eq!(Language::from_extension(lang.extension()), Some(lang));
        }
    }
}
