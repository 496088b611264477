//! Syntactic fact types produced by the scanner

use crate::lang::Lang;

/// Per-file counters and content digests
#[derive(Debug, Clone)]
pub struct FileMetrics {
    /// Path relative to the analysis root, forward-slash normalized
    pub path: String,
    /// Detected language
    pub lang: Lang,
    /// Total line count
    pub lines: usize,
    /// Token count across the whole file
    pub token_count: usize,
    /// Number of function definitions
    pub function_count: usize,
    /// Number of class-like definitions
    pub class_count: usize,
    /// Raw import strings, verbatim from source
    pub raw_imports: Vec<String>,
    /// Deflate-compressed size over raw size, in (0, 1]
    pub compression_ratio: f64,
    /// File cognitive load: sum of nesting-weighted branch increments
    pub cognitive_load: f64,
    /// Per-line content hashes, for rename detection across runs
    pub line_hashes: Vec<u64>,
    /// Truncated token hashes, the corpus for clone detection
    pub token_hashes: Vec<u32>,
}

/// A single function definition
#[derive(Debug, Clone)]
pub struct FunctionInfo {
    pub name: String,
    /// Token count of the signature (name through parameter list)
    pub signature_tokens: usize,
    /// Token count of the body
    pub body_tokens: usize,
    /// Maximum nesting depth of control structures inside the body
    pub nesting_depth: usize,
    /// Count of branching control structures in the body
    pub branch_count: usize,
    /// Cognitive complexity: one increment per control structure plus one
    /// per level of nesting it sits under
    pub cognitive: f64,
    /// Decorator / attribute / annotation names attached to the definition
    pub decorators: Vec<String>,
    /// Callee names observed in the body.
    ///
    /// None means the producer could not observe calls (regex fallback);
    /// Some(empty) means the body genuinely makes no calls.
    pub call_targets: Option<Vec<String>>,
    /// Whether the definition carries a doc comment or docstring
    pub has_docstring: bool,
    pub start_line: usize,
    pub end_line: usize,
}

/// A class-like definition (class, struct + impl, interface, trait)
#[derive(Debug, Clone)]
pub struct ClassInfo {
    pub name: String,
    /// Base class / extended interface names
    pub bases: Vec<String>,
    /// Abstract base class, interface, or trait
    pub is_abstract: bool,
    pub decorators: Vec<String>,
}

/// One import with its resolution state
#[derive(Debug, Clone)]
pub struct ImportInfo {
    /// Verbatim import string
    pub raw: String,
    /// Scanned file path this import resolved to, when it did
    pub resolved: Option<String>,
    /// Whether the import looks project-local (candidate for resolution).
    /// External imports (stdlib, third-party) never count as phantom.
    pub is_local: bool,
}

/// Parsed syntactic shape of a file
#[derive(Debug, Clone, Default)]
pub struct FileSyntax {
    pub functions: Vec<FunctionInfo>,
    pub classes: Vec<ClassInfo>,
    pub imports: Vec<ImportInfo>,
    /// Whether the file carries a language entry-point idiom
    pub has_main_guard: bool,
    /// Identifier occurrence counts, for concept extraction
    pub identifiers: Vec<(String, u32)>,
    /// TODO/FIXME/HACK marker count
    pub todo_count: usize,
    /// True when produced by the regex fallback rather than a full parse
    pub from_fallback: bool,
}

/// Scanner output for one discovered file
#[derive(Debug, Clone)]
pub struct ScannedFile {
    pub metrics: FileMetrics,
    pub syntax: Option<FileSyntax>,
}

impl ScannedFile {
    /// Fraction of functions carrying a docstring; 1.0 for functionless files
    pub fn docstring_coverage(&self) -> f64 {
        let Some(syntax) = &self.syntax else { return 0.0 };
        if syntax.functions.is_empty() {
            return 1.0;
        }
        let documented = syntax.functions.iter().filter(|f| f.has_docstring).count();
        documented as f64 / syntax.functions.len() as f64
    }

    /// TODO markers per 100 lines
    pub fn todo_density(&self) -> f64 {
        let todos = self.syntax.as_ref().map(|s| s.todo_count).unwrap_or(0);
        if self.metrics.lines == 0 {
            return 0.0;
        }
        todos as f64 * 100.0 / self.metrics.lines as f64
    }
}
