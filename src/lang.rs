//! Language detection and tree-sitter grammar loading

use std::path::Path;
use tree_sitter::Language;

/// The eight languages the engine analyzes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    Python,
    JavaScript,
    TypeScript,
    Rust,
    Go,
    Java,
    C,
    Cpp,
}

impl Lang {
    /// Detect language from file path extension.
    ///
    /// Returns None for anything outside the supported set; the scanner
    /// silently skips such files.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension().and_then(|e| e.to_str())?;
        Self::from_extension(ext)
    }

    /// Detect language from file extension string
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "py" | "pyi" => Some(Self::Python),
            "js" | "mjs" | "cjs" | "jsx" => Some(Self::JavaScript),
            "ts" | "mts" | "cts" | "tsx" => Some(Self::TypeScript),
            "rs" => Some(Self::Rust),
            "go" => Some(Self::Go),
            "java" => Some(Self::Java),
            "c" | "h" => Some(Self::C),
            "cpp" | "cc" | "cxx" | "hpp" | "hxx" | "hh" => Some(Self::Cpp),
            _ => None,
        }
    }

    /// Get the canonical name of the language
    pub fn name(&self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::JavaScript => "javascript",
            Self::TypeScript => "typescript",
            Self::Rust => "rust",
            Self::Go => "go",
            Self::Java => "java",
            Self::C => "c",
            Self::Cpp => "cpp",
        }
    }

    /// Get the tree-sitter Language for parsing
    pub fn tree_sitter_language(&self) -> Language {
        match self {
            Self::Python => tree_sitter_python::LANGUAGE.into(),
            Self::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            Self::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Self::Rust => tree_sitter_rust::LANGUAGE.into(),
            Self::Go => tree_sitter_go::LANGUAGE.into(),
            Self::Java => tree_sitter_java::LANGUAGE.into(),
            Self::C => tree_sitter_c::LANGUAGE.into(),
            Self::Cpp => tree_sitter_cpp::LANGUAGE.into(),
        }
    }

    /// Common file extensions for this language
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Self::Python => &["py", "pyi"],
            Self::JavaScript => &["js", "mjs", "cjs", "jsx"],
            Self::TypeScript => &["ts", "mts", "cts", "tsx"],
            Self::Rust => &["rs"],
            Self::Go => &["go"],
            Self::Java => &["java"],
            Self::C => &["c", "h"],
            Self::Cpp => &["cpp", "cc", "cxx", "hpp", "hxx", "hh"],
        }
    }

    /// All supported languages
    pub fn all() -> &'static [Lang] {
        &[
            Self::Python,
            Self::JavaScript,
            Self::TypeScript,
            Self::Rust,
            Self::Go,
            Self::Java,
            Self::C,
            Self::Cpp,
        ]
    }

    /// Parse a language name as used in config inclusion policies
    pub fn from_name(name: &str) -> Option<Self> {
        Self::all().iter().copied().find(|l| l.name() == name.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_language_detection() {
        assert_eq!(Lang::from_extension("py"), Some(Lang::Python));
        assert_eq!(Lang::from_extension("tsx"), Some(Lang::TypeScript));
        assert_eq!(Lang::from_extension("jsx"), Some(Lang::JavaScript));
        assert_eq!(Lang::from_extension("rs"), Some(Lang::Rust));
        assert_eq!(Lang::from_extension("go"), Some(Lang::Go));
        assert_eq!(Lang::from_extension("java"), Some(Lang::Java));
        assert_eq!(Lang::from_extension("h"), Some(Lang::C));
        assert_eq!(Lang::from_extension("hpp"), Some(Lang::Cpp));
    }

    #[test]
    fn test_language_from_path() {
        let path = PathBuf::from("src/app/main.py");
        assert_eq!(Lang::from_path(&path), Some(Lang::Python));

        let path = PathBuf::from("lib.rs");
        assert_eq!(Lang::from_path(&path), Some(Lang::Rust));
    }

    #[test]
    fn test_unsupported_extension() {
        assert_eq!(Lang::from_extension("xyz"), None);
        assert_eq!(Lang::from_extension("md"), None);
    }

    #[test]
    fn test_name_round_trip() {
        for lang in Lang::all() {
            assert_eq!(Lang::from_name(lang.name()), Some(*lang));
        }
    }
}
