//! Import resolution against the scanned file set
//!
//! Raw import strings are classified as project-local or external, and
//! local ones are resolved to scanned paths. Only local imports that fail
//! to resolve count as phantom imports; stdlib and third-party imports are
//! external by construction.

use std::collections::{HashMap, HashSet};

use crate::lang::Lang;
use crate::scanner::types::ScannedFile;

/// Lookup indices over the scanned file set
struct ResolveIndex {
    /// Every scanned path
    paths: HashSet<String>,
    /// All directory prefixes present in the scan
    dirs: HashSet<String>,
    /// First path segments (for locality checks on absolute imports)
    top_segments: HashSet<String>,
    /// Basename -> sorted paths carrying it
    by_basename: HashMap<String, Vec<String>>,
}

impl ResolveIndex {
    fn build(files: &[ScannedFile]) -> Self {
        let mut paths = HashSet::new();
        let mut dirs = HashSet::new();
        let mut top_segments = HashSet::new();
        let mut by_basename: HashMap<String, Vec<String>> = HashMap::new();

        let mut sorted: Vec<&str> = files.iter().map(|f| f.metrics.path.as_str()).collect();
        sorted.sort_unstable();

        for path in sorted {
            paths.insert(path.to_string());
            let segments: Vec<&str> = path.split('/').collect();
            if let Some(first) = segments.first() {
                let stem = first.split('.').next().unwrap_or(first);
                top_segments.insert(stem.to_string());
            }
            let mut prefix = String::new();
            for segment in &segments[..segments.len().saturating_sub(1)] {
                if !prefix.is_empty() {
                    prefix.push('/');
                }
                prefix.push_str(segment);
                dirs.insert(prefix.clone());
            }
            if let Some(base) = segments.last() {
                by_basename.entry(base.to_string()).or_default().push(path.to_string());
            }
        }

        Self { paths, dirs, top_segments, by_basename }
    }

    fn first_file_in_dir(&self, dir: &str, ext: &str) -> Option<String> {
        let mut candidates: Vec<&String> = self
            .paths
            .iter()
            .filter(|p| {
                p.ends_with(ext)
                    && p.rfind('/').map(|i| &p[..i]) == Some(dir)
            })
            .collect();
        candidates.sort();
        candidates.first().map(|p| (*p).clone())
    }
}

/// Resolve every import in place. Fills `resolved` and `is_local`.
pub fn resolve_imports(files: &mut [ScannedFile]) {
    let index = ResolveIndex::build(files);

    for file in files.iter_mut() {
        let importer_path = file.metrics.path.clone();
        let importer_dir = parent_dir(&importer_path);
        let lang = file.metrics.lang;
        let Some(syntax) = &mut file.syntax else { continue };

        for import in &mut syntax.imports {
            let (is_local, resolved) =
                resolve_one(&import.raw, lang, &importer_path, importer_dir, &index);
            import.is_local = is_local;
            import.resolved = resolved;
        }
    }
}

fn resolve_one(
    raw: &str,
    lang: Lang,
    importer_path: &str,
    importer_dir: &str,
    index: &ResolveIndex,
) -> (bool, Option<String>) {
    match lang {
        Lang::Python => resolve_python(raw, importer_dir, index),
        Lang::JavaScript | Lang::TypeScript => resolve_js(raw, importer_dir, index),
        Lang::Rust => resolve_rust(raw, importer_path, importer_dir, index),
        Lang::Go => resolve_go(raw, index),
        Lang::Java => resolve_java(raw, index),
        Lang::C | Lang::Cpp => resolve_c(raw, importer_dir, index),
    }
}

fn resolve_python(raw: &str, importer_dir: &str, index: &ResolveIndex) -> (bool, Option<String>) {
    let dots = raw.chars().take_while(|c| *c == '.').count();
    let rest = &raw[dots..];

    if dots > 0 {
        // Relative import: walk up dots-1 levels from the importing file's dir
        let mut base: Vec<&str> =
            if importer_dir.is_empty() { Vec::new() } else { importer_dir.split('/').collect() };
        for _ in 1..dots {
            base.pop();
        }
        let mut segments = base.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        segments.extend(rest.split('.').filter(|s| !s.is_empty()).map(str::to_string));
        return (true, lookup_python_module(&segments, index));
    }

    let segments: Vec<String> = rest.split('.').map(str::to_string).collect();
    let local = segments
        .first()
        .map(|first| index.top_segments.contains(first))
        .unwrap_or(false);
    if !local {
        return (false, None);
    }
    (true, lookup_python_module(&segments, index))
}

fn lookup_python_module(segments: &[String], index: &ResolveIndex) -> Option<String> {
    // Try progressively shorter prefixes: a.b.c may name a symbol in a/b.py
    for end in (1..=segments.len()).rev() {
        let joined = segments[..end].join("/");
        let file_candidate = format!("{}.py", joined);
        if index.paths.contains(&file_candidate) {
            return Some(file_candidate);
        }
        let package_candidate = format!("{}/__init__.py", joined);
        if index.paths.contains(&package_candidate) {
            return Some(package_candidate);
        }
    }
    None
}

fn resolve_js(raw: &str, importer_dir: &str, index: &ResolveIndex) -> (bool, Option<String>) {
    if !raw.starts_with("./") && !raw.starts_with("../") {
        return (false, None);
    }
    let Some(joined) = join_normalize(importer_dir, raw) else { return (true, None) };

    if index.paths.contains(&joined) {
        return (true, Some(joined));
    }
    for ext in ["ts", "tsx", "js", "jsx", "mjs", "cjs"] {
        let with_ext = format!("{}.{}", joined, ext);
        if index.paths.contains(&with_ext) {
            return (true, Some(with_ext));
        }
        let as_index = format!("{}/index.{}", joined, ext);
        if index.paths.contains(&as_index) {
            return (true, Some(as_index));
        }
    }
    (true, None)
}

fn resolve_rust(
    raw: &str,
    importer_path: &str,
    importer_dir: &str,
    index: &ResolveIndex,
) -> (bool, Option<String>) {
    let segments: Vec<&str> = raw.split("::").collect();
    let (local, rel_segments): (bool, Vec<&str>) = match segments.first().copied() {
        Some("crate") => (true, segments[1..].to_vec()),
        Some("self") => (true, segments[1..].to_vec()),
        Some("super") => {
            let mut up = 1;
            let mut idx = 1;
            while segments.get(idx) == Some(&"super") {
                up += 1;
                idx += 1;
            }
            let mut base: Vec<&str> =
                if importer_dir.is_empty() { Vec::new() } else { importer_dir.split('/').collect() };
            for _ in 0..up.min(base.len()) {
                base.pop();
            }
            let mut combined = base;
            combined.extend(&segments[idx..]);
            return (true, lookup_rust_module(&combined, index));
        }
        _ => (false, Vec::new()),
    };
    if !local {
        return (false, None);
    }

    // crate:: resolves against the importing file's source root
    let src_root = importer_path
        .find("src/")
        .map(|i| &importer_path[..i + 3])
        .unwrap_or("src");
    let mut combined: Vec<&str> = src_root.split('/').collect();
    combined.extend(rel_segments.iter());
    lookup_rust_module(&combined, index).map_or((true, None), |p| (true, Some(p)))
}

fn lookup_rust_module(segments: &[&str], index: &ResolveIndex) -> Option<String> {
    for end in (1..=segments.len()).rev() {
        let joined = segments[..end].join("/");
        let file_candidate = format!("{}.rs", joined);
        if index.paths.contains(&file_candidate) {
            return Some(file_candidate);
        }
        let mod_candidate = format!("{}/mod.rs", joined);
        if index.paths.contains(&mod_candidate) {
            return Some(mod_candidate);
        }
    }
    None
}

fn resolve_go(raw: &str, index: &ResolveIndex) -> (bool, Option<String>) {
    // Match the import path's trailing segments against scanned directories
    let segments: Vec<&str> = raw.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        return (false, None);
    }
    for start in 0..segments.len() {
        let suffix = segments[start..].join("/");
        if index.dirs.contains(&suffix) {
            return (true, index.first_file_in_dir(&suffix, ".go"));
        }
    }
    (false, None)
}

fn resolve_java(raw: &str, index: &ResolveIndex) -> (bool, Option<String>) {
    let path_form = raw.trim_end_matches(".*").replace('.', "/");
    // Class import: find a file whose path ends with Path/To/Class.java
    let file_suffix = format!("{}.java", path_form);
    let mut matches: Vec<&String> =
        index.paths.iter().filter(|p| p.ends_with(&file_suffix)).collect();
    matches.sort();
    if let Some(found) = matches.first() {
        return (true, Some((*found).clone()));
    }
    // Wildcard import: the path names a package directory
    if raw.ends_with(".*") {
        let mut dir_matches: Vec<&String> =
            index.dirs.iter().filter(|d| d.ends_with(&path_form)).collect();
        dir_matches.sort();
        if let Some(dir) = dir_matches.first() {
            return (true, index.first_file_in_dir(dir, ".java"));
        }
    }
    (false, None)
}

fn resolve_c(raw: &str, importer_dir: &str, index: &ResolveIndex) -> (bool, Option<String>) {
    if raw.starts_with('<') {
        // System include
        return (false, None);
    }
    let name = raw.trim_matches('"');
    if let Some(joined) = join_normalize(importer_dir, name) {
        if index.paths.contains(&joined) {
            return (true, Some(joined));
        }
    }
    // Fall back to unique basename match anywhere in the tree
    let base = name.rsplit('/').next().unwrap_or(name);
    if let Some(candidates) = index.by_basename.get(base) {
        return (true, candidates.first().cloned());
    }
    (true, None)
}

fn parent_dir(path: &str) -> &str {
    path.rfind('/').map(|i| &path[..i]).unwrap_or("")
}

/// Join a relative import path onto a directory and normalize `.`/`..`
fn join_normalize(dir: &str, rel: &str) -> Option<String> {
    let mut stack: Vec<&str> =
        if dir.is_empty() { Vec::new() } else { dir.split('/').collect() };
    for segment in rel.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                stack.pop()?;
            }
            other => stack.push(other),
        }
    }
    Some(stack.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::types::{FileMetrics, FileSyntax, ImportInfo};

    fn file(path: &str, lang: Lang, imports: Vec<&str>) -> ScannedFile {
        ScannedFile {
            metrics: FileMetrics {
                path: path.to_string(),
                lang,
                lines: 1,
                token_count: 1,
                function_count: 0,
                class_count: 0,
                raw_imports: Vec::new(),
                compression_ratio: 0.5,
                cognitive_load: 0.0,
                line_hashes: Vec::new(),
                token_hashes: Vec::new(),
            },
            syntax: Some(FileSyntax {
                imports: imports
                    .into_iter()
                    .map(|raw| ImportInfo { raw: raw.to_string(), resolved: None, is_local: false })
                    .collect(),
                ..Default::default()
            }),
        }
    }

    fn imports_of(files: &[ScannedFile], path: &str) -> Vec<ImportInfo> {
        files
            .iter()
            .find(|f| f.metrics.path == path)
            .and_then(|f| f.syntax.as_ref())
            .map(|s| s.imports.clone())
            .unwrap_or_default()
    }

    #[test]
    fn python_absolute_and_relative() {
        let mut files = vec![
            file("app/main.py", Lang::Python, vec!["app.util", "os", ".helpers"]),
            file("app/util.py", Lang::Python, vec![]),
            file("app/helpers.py", Lang::Python, vec![]),
        ];
        resolve_imports(&mut files);
        let imports = imports_of(&files, "app/main.py");
        assert_eq!(imports[0].resolved.as_deref(), Some("app/util.py"));
        assert!(imports[0].is_local);
        // stdlib: external, never phantom
        assert!(!imports[1].is_local);
        assert!(imports[1].resolved.is_none());
        // relative
        assert_eq!(imports[2].resolved.as_deref(), Some("app/helpers.py"));
    }

    #[test]
    fn python_unresolved_local_is_phantom_candidate() {
        let mut files = vec![
            file("app/main.py", Lang::Python, vec!["app.missing"]),
            file("app/util.py", Lang::Python, vec![]),
        ];
        resolve_imports(&mut files);
        let imports = imports_of(&files, "app/main.py");
        assert!(imports[0].is_local);
        assert!(imports[0].resolved.is_none());
    }

    #[test]
    fn js_relative_with_extension_guess() {
        let mut files = vec![
            file("src/app.ts", Lang::TypeScript, vec!["./api", "../lib/core", "react"]),
            file("src/api.ts", Lang::TypeScript, vec![]),
            file("lib/core/index.ts", Lang::TypeScript, vec![]),
        ];
        resolve_imports(&mut files);
        let imports = imports_of(&files, "src/app.ts");
        assert_eq!(imports[0].resolved.as_deref(), Some("src/api.ts"));
        assert_eq!(imports[1].resolved.as_deref(), Some("lib/core/index.ts"));
        assert!(!imports[2].is_local);
    }

    #[test]
    fn rust_crate_paths() {
        let mut files = vec![
            file("src/main.rs", Lang::Rust, vec!["crate::graph::DepGraph", "std::fmt"]),
            file("src/graph/mod.rs", Lang::Rust, vec![]),
        ];
        resolve_imports(&mut files);
        let imports = imports_of(&files, "src/main.rs");
        assert_eq!(imports[0].resolved.as_deref(), Some("src/graph/mod.rs"));
        assert!(!imports[1].is_local);
    }

    #[test]
    fn c_quoted_include() {
        let mut files = vec![
            file("src/main.c", Lang::C, vec!["\"util.h\"", "<stdio.h>"]),
            file("src/util.h", Lang::C, vec![]),
        ];
        resolve_imports(&mut files);
        let imports = imports_of(&files, "src/main.c");
        assert_eq!(imports[0].resolved.as_deref(), Some("src/util.h"));
        assert!(!imports[1].is_local);
    }

    #[test]
    fn java_class_import() {
        let mut files = vec![
            file("src/com/acme/App.java", Lang::Java, vec!["com.acme.util.Text", "java.util.List"]),
            file("src/com/acme/util/Text.java", Lang::Java, vec![]),
        ];
        resolve_imports(&mut files);
        let imports = imports_of(&files, "src/com/acme/App.java");
        assert_eq!(imports[0].resolved.as_deref(), Some("src/com/acme/util/Text.java"));
        assert!(!imports[1].is_local);
    }
}
