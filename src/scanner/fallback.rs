//! Regex fallback scanners
//!
//! When the full parse fails, a per-language regex pass still recovers
//! definitions, imports, and a coarse complexity estimate. The fallback
//! marks `call_targets = None` on every function so downstream code can
//! distinguish "no calls" from "unknown".

use once_cell::sync::Lazy;
use regex::Regex;

use crate::lang::Lang;
use crate::scanner::types::{ClassInfo, FileSyntax, FunctionInfo, ImportInfo};

struct FallbackPatterns {
    function: Regex,
    class: Regex,
    imports: Vec<Regex>,
    branch: Regex,
}

static PYTHON_PATTERNS: Lazy<FallbackPatterns> = Lazy::new(|| FallbackPatterns {
    function: Regex::new(r"^\s*(?:async\s+)?def\s+(\w+)").unwrap(),
    class: Regex::new(r"^\s*class\s+(\w+)(?:\(([^)]*)\))?").unwrap(),
    imports: vec![
        Regex::new(r"^\s*from\s+([\w\.]+)\s+import").unwrap(),
        Regex::new(r"^\s*import\s+([\w\.]+)").unwrap(),
    ],
    branch: Regex::new(r"^\s*(?:if|elif|for|while|with|try|match)\b").unwrap(),
});

static JS_PATTERNS: Lazy<FallbackPatterns> = Lazy::new(|| FallbackPatterns {
    function: Regex::new(
        r"(?:function\s+(\w+)|(?:const|let|var)\s+(\w+)\s*=\s*(?:async\s+)?(?:function\b|\())",
    )
    .unwrap(),
    class: Regex::new(r"class\s+(\w+)(?:\s+extends\s+([\w\.]+))?").unwrap(),
    imports: vec![
        Regex::new(r#"from\s+['"]([^'"]+)['"]"#).unwrap(),
        Regex::new(r#"\brequire\(\s*['"]([^'"]+)['"]"#).unwrap(),
        Regex::new(r#"^\s*import\s+['"]([^'"]+)['"]"#).unwrap(),
    ],
    branch: Regex::new(r"\b(?:if|for|while|switch|try)\s*\(|\btry\s*\{").unwrap(),
});

static RUST_PATTERNS: Lazy<FallbackPatterns> = Lazy::new(|| FallbackPatterns {
    function: Regex::new(r"\bfn\s+(\w+)").unwrap(),
    class: Regex::new(r"\b(?:struct|enum|trait)\s+(\w+)").unwrap(),
    imports: vec![Regex::new(r"^\s*(?:pub(?:\([^)]*\))?\s+)?use\s+([\w:]+)").unwrap()],
    branch: Regex::new(r"\b(?:if|match|for|while|loop)\b").unwrap(),
});

static GO_PATTERNS: Lazy<FallbackPatterns> = Lazy::new(|| FallbackPatterns {
    function: Regex::new(r"^func\s+(?:\([^)]*\)\s*)?(\w+)").unwrap(),
    class: Regex::new(r"^type\s+(\w+)\s+(?:struct|interface)\b").unwrap(),
    imports: vec![Regex::new(r#"^\s*(?:import\s+)?(?:\w+\s+)?"([^"]+)"\s*$"#).unwrap()],
    branch: Regex::new(r"^\s*(?:if|for|switch|select)\b").unwrap(),
});

static JAVA_PATTERNS: Lazy<FallbackPatterns> = Lazy::new(|| FallbackPatterns {
    function: Regex::new(
        r"(?:public|protected|private|static|final|synchronized|abstract)[\w<>,\[\]\s]*\s(\w+)\s*\([^;]*\)\s*(?:throws[\w,\s]+)?\{",
    )
    .unwrap(),
    class: Regex::new(r"\b(?:class|interface|enum)\s+(\w+)").unwrap(),
    imports: vec![Regex::new(r"^\s*import\s+(?:static\s+)?([\w\.]+(?:\.\*)?)\s*;").unwrap()],
    branch: Regex::new(r"\b(?:if|for|while|switch|try)\s*[\(\{]").unwrap(),
});

static C_PATTERNS: Lazy<FallbackPatterns> = Lazy::new(|| FallbackPatterns {
    function: Regex::new(r"^[\w\*][\w\s\*:<>,&]*?\b(\w+)\s*\([^;]*\)\s*\{").unwrap(),
    class: Regex::new(r"\b(?:struct|class)\s+(\w+)").unwrap(),
    imports: vec![Regex::new(r#"^\s*#\s*include\s+(["<][^">]+[">])"#).unwrap()],
    branch: Regex::new(r"\b(?:if|for|while|switch|try)\s*\(").unwrap(),
});

fn patterns_for(lang: Lang) -> &'static FallbackPatterns {
    match lang {
        Lang::Python => &PYTHON_PATTERNS,
        Lang::JavaScript | Lang::TypeScript => &JS_PATTERNS,
        Lang::Rust => &RUST_PATTERNS,
        Lang::Go => &GO_PATTERNS,
        Lang::Java => &JAVA_PATTERNS,
        Lang::C | Lang::Cpp => &C_PATTERNS,
    }
}

/// Scan a file with line-oriented regexes.
///
/// Always produces a FileSyntax; never fails.
pub fn scan_fallback(source: &str, lang: Lang) -> FileSyntax {
    let patterns = patterns_for(lang);
    let mut out = FileSyntax { from_fallback: true, ..Default::default() };

    let uses_indentation = lang == Lang::Python;
    let mut brace_depth: i32 = 0;

    for (idx, line) in source.lines().enumerate() {
        let depth = if uses_indentation {
            indent_depth(line)
        } else {
            brace_depth.max(0) as usize
        };

        if let Some(caps) = patterns.function.captures(line) {
            let name = caps
                .iter()
                .skip(1)
                .flatten()
                .next()
                .map(|m| m.as_str().to_string())
                .unwrap_or_default();
            if !name.is_empty() {
                out.functions.push(FunctionInfo {
                    name,
                    signature_tokens: crate::scanner::tokens::lex(line).len(),
                    body_tokens: 0,
                    nesting_depth: 0,
                    branch_count: 0,
                    cognitive: 0.0,
                    decorators: Vec::new(),
                    call_targets: None,
                    has_docstring: false,
                    start_line: idx + 1,
                    end_line: idx + 1,
                });
            }
        } else if let Some(caps) = patterns.class.captures(line) {
            if let Some(name) = caps.get(1) {
                let bases = caps
                    .get(2)
                    .map(|m| {
                        m.as_str()
                            .split(',')
                            .map(|b| b.trim().to_string())
                            .filter(|b| !b.is_empty())
                            .collect()
                    })
                    .unwrap_or_default();
                let is_abstract = line.contains("abstract")
                    || line.contains("interface")
                    || line.contains("trait")
                    || line.contains("Protocol")
                    || line.contains("ABC");
                out.classes.push(ClassInfo {
                    name: name.as_str().to_string(),
                    bases,
                    is_abstract,
                    decorators: Vec::new(),
                });
            }
        }

        for import_re in &patterns.imports {
            if let Some(caps) = import_re.captures(line) {
                if let Some(raw) = caps.get(1) {
                    out.imports.push(ImportInfo {
                        raw: raw.as_str().to_string(),
                        resolved: None,
                        is_local: false,
                    });
                    break;
                }
            }
        }

        if patterns.branch.is_match(line) {
            // One increment per branch plus one per level of nesting
            if let Some(last) = out.functions.last_mut() {
                last.branch_count += 1;
                last.cognitive += 1.0 + depth as f64;
                last.nesting_depth = last.nesting_depth.max(depth + 1);
                last.end_line = idx + 1;
            }
        }

        if !uses_indentation {
            brace_depth += line.matches('{').count() as i32;
            brace_depth -= line.matches('}').count() as i32;
        }
    }

    out
}

fn indent_depth(line: &str) -> usize {
    let spaces = line.len() - line.trim_start_matches([' ', '\t']).len();
    spaces / 4
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn python_fallback_extracts_defs() {
        let source = "import os\n\ndef alpha():\n    if True:\n        pass\n\nclass Beta(Base):\n    pass\n";
        let syntax = scan_fallback(source, Lang::Python);
        assert_eq!(syntax.functions.len(), 1);
        assert_eq!(syntax.functions[0].name, "alpha");
        // Fallback cannot observe calls
        assert!(syntax.functions[0].call_targets.is_none());
        assert_eq!(syntax.classes[0].name, "Beta");
        assert_eq!(syntax.classes[0].bases, vec!["Base"]);
        assert_eq!(syntax.imports[0].raw, "os");
        assert!(syntax.from_fallback);
    }

    #[test]
    fn js_fallback_handles_arrow_and_require() {
        let source = "const util = require('./util');\nconst handler = async (req) => {\n  if (req) { util.go(); }\n};\n";
        let syntax = scan_fallback(source, Lang::JavaScript);
        assert_eq!(syntax.functions[0].name, "handler");
        assert_eq!(syntax.imports[0].raw, "./util");
    }

    #[test]
    fn go_fallback_import_block() {
        let source = "package main\n\nimport (\n\t\"fmt\"\n\t\"example.com/app/util\"\n)\n\nfunc main() {\n\tif true {\n\t}\n}\n";
        let syntax = scan_fallback(source, Lang::Go);
        let raws: Vec<&str> = syntax.imports.iter().map(|i| i.raw.as_str()).collect();
        assert!(raws.contains(&"fmt"));
        assert!(raws.contains(&"example.com/app/util"));
        assert_eq!(syntax.functions[0].name, "main");
    }

    #[test]
    fn rust_fallback() {
        let source = "use crate::graph::DepGraph;\n\npub fn run() {\n    for x in 0..3 {\n        if x > 1 {}\n    }\n}\n";
        let syntax = scan_fallback(source, Lang::Rust);
        assert_eq!(syntax.functions[0].name, "run");
        assert_eq!(syntax.imports[0].raw, "crate::graph::DepGraph");
        assert!(syntax.functions[0].branch_count >= 2);
    }
}
