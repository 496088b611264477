//! Scanner façade: directory walk, limits, binary sniff, parse-or-fallback
//!
//! Given a root and a language policy, produces one `ScannedFile` per
//! discovered source file. Files that cannot be read, are too large, or
//! look binary are skipped with a warning; the run always continues.

mod fallback;
mod grammar;
mod parse;
mod resolve;
pub mod tokens;
mod types;

pub use types::{ClassInfo, FileMetrics, FileSyntax, FunctionInfo, ImportInfo, ScannedFile};

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use flate2::write::DeflateEncoder;
use flate2::Compression;
use ignore::overrides::OverrideBuilder;
use ignore::WalkBuilder;
use once_cell::sync::Lazy;
use rayon::prelude::*;
use regex::Regex;
use tracing::{debug, warn};

use crate::config::{InsightConfig, LanguagePolicy};
use crate::error::{InsightError, Result};
use crate::lang::Lang;
use crate::scanner::tokens::{count_todo_markers, lex, line_hashes, token_hashes, TokenKind};

/// Bytes inspected by the binary sniff
const SNIFF_LEN: usize = 8192;
/// Fraction of non-text bytes above which a file is treated as binary
const BINARY_THRESHOLD: f64 = 0.10;

/// Scan statistics reported alongside the file set
#[derive(Debug, Clone, Default)]
pub struct ScanStats {
    pub discovered: usize,
    pub scanned: usize,
    pub skipped_oversize: usize,
    pub skipped_binary: usize,
    pub skipped_unreadable: usize,
    pub fallback_parses: usize,
}

/// Walk the root and scan every matching source file.
///
/// Output is sorted by path; the set and contents are reproducible for
/// identical inputs.
pub fn scan(root: &Path, config: &InsightConfig) -> Result<(Vec<ScannedFile>, ScanStats)> {
    if !root.is_dir() {
        return Err(InsightError::RootNotFound { path: root.display().to_string() });
    }

    let candidates = discover(root, config)?;
    let discovered = candidates.len();

    let skipped_oversize = AtomicUsize::new(0);
    let skipped_binary = AtomicUsize::new(0);
    let skipped_unreadable = AtomicUsize::new(0);
    let fallback_parses = AtomicUsize::new(0);

    let max_bytes = config.max_file_bytes();
    let mut files: Vec<ScannedFile> = candidates
        .par_iter()
        .filter_map(|(abs, rel, lang)| {
            let bytes = match std::fs::read(abs) {
                Ok(b) => b,
                Err(e) => {
                    warn!(path = %rel, error = %e, "skipping unreadable file");
                    skipped_unreadable.fetch_add(1, Ordering::Relaxed);
                    return None;
                }
            };
            if bytes.len() as u64 > max_bytes {
                warn!(path = %rel, size = bytes.len(), "skipping oversize file");
                skipped_oversize.fetch_add(1, Ordering::Relaxed);
                return None;
            }
            if looks_binary(&bytes) {
                warn!(path = %rel, "skipping binary file");
                skipped_binary.fetch_add(1, Ordering::Relaxed);
                return None;
            }
            let source = String::from_utf8_lossy(&bytes).into_owned();

            let syntax = match parse::parse_file(&source, *lang) {
                Some(parsed) => parsed,
                None => {
                    debug!(path = %rel, "full parse failed, using regex fallback");
                    fallback_parses.fetch_add(1, Ordering::Relaxed);
                    fallback::scan_fallback(&source, *lang)
                }
            };

            Some(build_scanned_file(rel.clone(), *lang, &source, syntax))
        })
        .collect();

    files.sort_by(|a, b| a.metrics.path.cmp(&b.metrics.path));
    resolve::resolve_imports(&mut files);

    // Mirror resolved raw imports onto the metrics record
    for file in &mut files {
        if let Some(syntax) = &file.syntax {
            file.metrics.raw_imports = syntax.imports.iter().map(|i| i.raw.clone()).collect();
        }
    }

    let stats = ScanStats {
        discovered,
        scanned: files.len(),
        skipped_oversize: skipped_oversize.load(Ordering::Relaxed),
        skipped_binary: skipped_binary.load(Ordering::Relaxed),
        skipped_unreadable: skipped_unreadable.load(Ordering::Relaxed),
        fallback_parses: fallback_parses.load(Ordering::Relaxed),
    };
    Ok((files, stats))
}

/// Collect candidate (absolute, relative, language) triples up to max_files
fn discover(root: &Path, config: &InsightConfig) -> Result<Vec<(PathBuf, String, Lang)>> {
    let mut overrides = OverrideBuilder::new(root);
    for pattern in &config.exclude_patterns {
        // Overrides use gitignore syntax; a leading ! whitelists, so
        // exclusions are written inverted
        let inverted = format!("!{}", pattern);
        overrides.add(&inverted).map_err(|e| InsightError::Config {
            message: format!("bad exclude pattern {:?}: {}", pattern, e),
        })?;
    }
    let overrides = overrides.build().map_err(|e| InsightError::Config {
        message: format!("exclude patterns: {}", e),
    })?;

    let walker = WalkBuilder::new(root)
        .overrides(overrides)
        .hidden(true)
        .git_ignore(true)
        .build();

    let mut candidates = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "walk error");
                continue;
            }
        };
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }
        let Some(lang) = Lang::from_path(entry.path()) else { continue };
        if let LanguagePolicy::Explicit(allowed) = &config.languages {
            if !allowed.contains(&lang) {
                continue;
            }
        }
        let rel = normalize_path(entry.path(), root);
        candidates.push((entry.path().to_path_buf(), rel, lang));
        if candidates.len() >= config.max_files {
            warn!(max_files = config.max_files, "file limit reached, truncating scan");
            break;
        }
    }
    candidates.sort_by(|a, b| a.1.cmp(&b.1));
    Ok(candidates)
}

fn build_scanned_file(path: String, lang: Lang, source: &str, syntax: FileSyntax) -> ScannedFile {
    let tokens = lex(source);
    let identifiers = intern_identifiers(&tokens);
    let cognitive_load: f64 = syntax.functions.iter().map(|f| f.cognitive).sum();

    let mut syntax = syntax;
    syntax.identifiers = identifiers;
    syntax.todo_count = count_todo_markers(source);
    syntax.has_main_guard = has_main_guard(source, lang);

    let metrics = FileMetrics {
        path,
        lang,
        lines: source.lines().count(),
        token_count: tokens.len(),
        function_count: syntax.functions.len(),
        class_count: syntax.classes.len(),
        raw_imports: Vec::new(),
        compression_ratio: compression_ratio(source.as_bytes()),
        cognitive_load,
        line_hashes: line_hashes(source),
        token_hashes: token_hashes(&tokens),
    };

    ScannedFile { metrics, syntax: Some(syntax) }
}

fn intern_identifiers(tokens: &[(TokenKind, &str)]) -> Vec<(String, u32)> {
    let mut counts: ahash::AHashMap<&str, u32> = ahash::AHashMap::new();
    for (kind, text) in tokens {
        if *kind == TokenKind::Identifier && text.len() >= 2 {
            *counts.entry(text).or_insert(0) += 1;
        }
    }
    let mut out: Vec<(String, u32)> =
        counts.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
    out.sort();
    out
}

/// Deflate-compressed size over raw size; 1.0 for empty input
pub fn compression_ratio(bytes: &[u8]) -> f64 {
    if bytes.is_empty() {
        return 1.0;
    }
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    if encoder.write_all(bytes).is_err() {
        return 1.0;
    }
    match encoder.finish() {
        Ok(compressed) => (compressed.len() as f64 / bytes.len() as f64).min(1.0),
        Err(_) => 1.0,
    }
}

fn looks_binary(bytes: &[u8]) -> bool {
    let chunk = &bytes[..bytes.len().min(SNIFF_LEN)];
    if chunk.is_empty() {
        return false;
    }
    if chunk.contains(&0) {
        return true;
    }
    let suspect = chunk
        .iter()
        .filter(|b| matches!(**b, 0x01..=0x08 | 0x0B..=0x0C | 0x0E..=0x1F))
        .count();
    suspect as f64 / chunk.len() as f64 > BINARY_THRESHOLD
}

static PY_MAIN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"if\s+__name__\s*==\s*['"]__main__['"]"#).unwrap());
static JS_MAIN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"require\.main\s*===?\s*module|import\.meta\.main").unwrap());
static RUST_MAIN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bfn\s+main\s*\(").unwrap());
static GO_MAIN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bfunc\s+main\s*\(").unwrap());
static JAVA_MAIN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"public\s+static\s+void\s+main\s*\(").unwrap());
static C_MAIN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(?:int|void)\s+main\s*\(").unwrap());

/// Textual check for the language's entry-point idiom
pub fn has_main_guard(source: &str, lang: Lang) -> bool {
    match lang {
        Lang::Python => PY_MAIN.is_match(source),
        Lang::JavaScript | Lang::TypeScript => JS_MAIN.is_match(source),
        Lang::Rust => RUST_MAIN.is_match(source),
        Lang::Go => GO_MAIN.is_match(source) && source.contains("package main"),
        Lang::Java => JAVA_MAIN.is_match(source),
        Lang::C | Lang::Cpp => C_MAIN.is_match(source),
    }
}

fn normalize_path(path: &Path, root: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_sniff() {
        assert!(looks_binary(b"\x00\x01\x02binary"));
        assert!(!looks_binary(b"plain text content\n"));
        assert!(!looks_binary(b""));
    }

    #[test]
    fn main_guard_idioms() {
        assert!(has_main_guard("if __name__ == '__main__':\n    run()", Lang::Python));
        assert!(!has_main_guard("def run(): pass", Lang::Python));
        assert!(has_main_guard("package main\n\nfunc main() {}", Lang::Go));
        assert!(!has_main_guard("package util\n\nfunc main() {}", Lang::Go));
        assert!(has_main_guard("fn main() { }", Lang::Rust));
        assert!(has_main_guard("int main(void) { return 0; }", Lang::C));
    }

    #[test]
    fn compression_ratio_bounds() {
        let repetitive = "aaaa".repeat(200);
        let ratio = compression_ratio(repetitive.as_bytes());
        assert!(ratio > 0.0 && ratio < 0.2);
        assert_eq!(compression_ratio(b""), 1.0);
    }

    #[test]
    fn scan_directory_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("a.py"),
            "import os\n\ndef go():\n    if os.path:\n        print('x')\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("b.py"), "import a\n").unwrap();
        std::fs::write(dir.path().join("data.bin"), [0u8, 159, 146, 150]).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "not source").unwrap();

        let config = InsightConfig::default();
        let (files, stats) = scan(dir.path(), &config).unwrap();

        assert_eq!(files.len(), 2);
        assert_eq!(files[0].metrics.path, "a.py");
        assert_eq!(files[1].metrics.path, "b.py");
        assert_eq!(stats.scanned, 2);

        // b.py's import of a resolves to a.py
        let imports = &files[1].syntax.as_ref().unwrap().imports;
        assert_eq!(imports[0].resolved.as_deref(), Some("a.py"));

        let a = &files[0];
        assert_eq!(a.metrics.function_count, 1);
        assert!(a.metrics.token_count > 0);
        assert!(!a.metrics.line_hashes.is_empty());
    }

    #[test]
    fn exclusions_and_limits() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("vendor")).unwrap();
        std::fs::write(dir.path().join("main.py"), "x = 1\n").unwrap();
        std::fs::write(dir.path().join("vendor/dep.py"), "y = 2\n").unwrap();

        let mut config = InsightConfig::default();
        config.exclude_patterns = vec!["vendor/**".to_string()];
        let (files, _) = scan(dir.path(), &config).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].metrics.path, "main.py");
    }
}
