//! Generic tree-sitter extraction over per-language grammar tables
//!
//! One walker serves all eight languages; the `SyntaxGrammar` tables map
//! node kinds to semantic concepts. Parse failures return None so the
//! façade can fall back to the regex scanner.

use tree_sitter::{Node, Parser};

use crate::lang::Lang;
use crate::scanner::grammar::{SyntaxGrammar, BASE_CLAUSE_NODES};
use crate::scanner::tokens::lex;
use crate::scanner::types::{ClassInfo, FileSyntax, FunctionInfo, ImportInfo};

/// Parse a file with its tree-sitter grammar and extract syntactic facts.
///
/// Returns None when the parse fails or produces an error-bearing tree;
/// the caller then uses the regex fallback.
pub fn parse_file(source: &str, lang: Lang) -> Option<FileSyntax> {
    let mut parser = Parser::new();
    parser.set_language(&lang.tree_sitter_language()).ok()?;
    let tree = parser.parse(source, None)?;
    let root = tree.root_node();
    if root.has_error() {
        return None;
    }

    let grammar = SyntaxGrammar::for_lang(lang);
    let mut out = FileSyntax { from_fallback: false, ..Default::default() };
    let source_lines: Vec<&str> = source.lines().collect();

    walk(&root, source, grammar, &source_lines, &mut out);
    Some(out)
}

fn walk(
    node: &Node,
    source: &str,
    grammar: &SyntaxGrammar,
    source_lines: &[&str],
    out: &mut FileSyntax,
) {
    let kind = node.kind();

    if grammar.function_nodes.contains(&kind) {
        if let Some(func) = extract_function(node, source, grammar, source_lines) {
            out.functions.push(func);
        }
    } else if grammar.class_nodes.contains(&kind) || grammar.interface_nodes.contains(&kind) {
        if let Some(class) = extract_class(node, source, grammar) {
            out.classes.push(class);
        }
    } else if grammar.import_nodes.contains(&kind) {
        for raw in extract_import(node, source, grammar.lang) {
            out.imports.push(ImportInfo { raw, resolved: None, is_local: false });
        }
    }

    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        walk(&child, source, grammar, source_lines, out);
    }
}

/// Extract one function definition; anonymous functions are skipped
fn extract_function(
    node: &Node,
    source: &str,
    grammar: &SyntaxGrammar,
    source_lines: &[&str],
) -> Option<FunctionInfo> {
    let name = function_name(node, source, grammar)?;

    let body = node.child_by_field_name(grammar.body_field);
    let total_tokens = lex(node_text(node, source)).len();
    let body_tokens = body.map(|b| lex(node_text(&b, source)).len()).unwrap_or(0);

    let (nesting_depth, branch_count, cognitive) = match &body {
        Some(b) => measure_control_flow(b, grammar),
        None => (0, 0, 0.0),
    };

    let call_targets = body.map(|b| collect_calls(&b, source, grammar));

    let start_line = node.start_position().row + 1;
    let end_line = node.end_position().row + 1;

    Some(FunctionInfo {
        name,
        signature_tokens: total_tokens.saturating_sub(body_tokens),
        body_tokens,
        nesting_depth,
        branch_count,
        cognitive,
        decorators: collect_decorators(node, source, grammar),
        call_targets,
        has_docstring: has_docstring(node, source, grammar, source_lines),
        start_line,
        end_line,
    })
}

fn function_name(node: &Node, source: &str, grammar: &SyntaxGrammar) -> Option<String> {
    if matches!(grammar.lang, Lang::C | Lang::Cpp) {
        // C-family nests the identifier inside declarator chains
        let mut current = node.child_by_field_name("declarator")?;
        loop {
            if current.kind().ends_with("identifier") {
                return Some(node_text(&current, source).to_string());
            }
            match current.child_by_field_name("declarator") {
                Some(inner) => current = inner,
                None => return None,
            }
        }
    }
    let name_node = node.child_by_field_name(grammar.name_field)?;
    let text = node_text(&name_node, source).trim().to_string();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Nesting depth, branch count, and cognitive complexity of a body.
///
/// Cognitive complexity follows the SonarSource shape: each control
/// structure costs 1 plus its nesting depth.
fn measure_control_flow(body: &Node, grammar: &SyntaxGrammar) -> (usize, usize, f64) {
    struct Acc {
        max: usize,
        count: usize,
        cognitive: f64,
    }
    fn recurse(node: &Node, grammar: &SyntaxGrammar, depth: usize, acc: &mut Acc) {
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            // Do not descend into nested function definitions
            if grammar.function_nodes.contains(&child.kind()) {
                continue;
            }
            if grammar.control_flow_nodes.contains(&child.kind()) {
                acc.count += 1;
                acc.cognitive += 1.0 + depth as f64;
                acc.max = acc.max.max(depth + 1);
                recurse(&child, grammar, depth + 1, acc);
            } else {
                recurse(&child, grammar, depth, acc);
            }
        }
    }
    let mut acc = Acc { max: 0, count: 0, cognitive: 0.0 };
    recurse(body, grammar, 0, &mut acc);
    (acc.max, acc.count, acc.cognitive)
}

/// Callee names observed in a function body
fn collect_calls(body: &Node, source: &str, grammar: &SyntaxGrammar) -> Vec<String> {
    fn recurse(node: &Node, source: &str, grammar: &SyntaxGrammar, out: &mut Vec<String>) {
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            if grammar.function_nodes.contains(&child.kind()) {
                continue;
            }
            if grammar.call_nodes.contains(&child.kind()) {
                if let Some(callee) = child.child_by_field_name(grammar.callee_field) {
                    let text = node_text(&callee, source);
                    // Keep the trailing segment of member chains
                    let last = text
                        .rsplit(|c: char| c == '.' || c == ':')
                        .next()
                        .unwrap_or(text)
                        .trim();
                    if !last.is_empty() && last.len() < 80 {
                        out.push(last.to_string());
                    }
                }
            }
            recurse(&child, source, grammar, out);
        }
    }
    let mut calls = Vec::new();
    recurse(body, source, grammar, &mut calls);
    calls
}

fn collect_decorators(node: &Node, source: &str, grammar: &SyntaxGrammar) -> Vec<String> {
    let mut decorators = Vec::new();

    // Python wraps decorated defs in a parent node carrying the decorators
    if let Some(parent) = node.parent() {
        if parent.kind() == "decorated_definition" {
            let mut cursor = parent.walk();
            for child in parent.named_children(&mut cursor) {
                if grammar.decorator_nodes.contains(&child.kind()) {
                    decorators.push(clean_decorator(node_text(&child, source)));
                }
            }
            return decorators;
        }
    }

    // Rust attributes and TS decorators precede the definition as siblings
    let mut prev = node.prev_named_sibling();
    while let Some(sibling) = prev {
        if grammar.decorator_nodes.contains(&sibling.kind()) {
            decorators.push(clean_decorator(node_text(&sibling, source)));
            prev = sibling.prev_named_sibling();
        } else {
            break;
        }
    }

    // Java annotations live inside a modifiers child
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "modifiers" {
            let mut inner = child.walk();
            for modifier in child.named_children(&mut inner) {
                if grammar.decorator_nodes.contains(&modifier.kind()) {
                    decorators.push(clean_decorator(node_text(&modifier, source)));
                }
            }
        }
    }

    decorators.reverse();
    decorators
}

fn clean_decorator(text: &str) -> String {
    let first_line = text.lines().next().unwrap_or(text);
    first_line
        .trim()
        .trim_start_matches('@')
        .trim_start_matches("#[")
        .trim_end_matches(']')
        .split('(')
        .next()
        .unwrap_or(first_line)
        .trim()
        .to_string()
}

fn extract_class(node: &Node, source: &str, grammar: &SyntaxGrammar) -> Option<ClassInfo> {
    // Go declares structs and interfaces inside a type_declaration wrapper
    if grammar.lang == Lang::Go {
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            if child.kind() == "type_spec" {
                let name = child
                    .child_by_field_name("name")
                    .map(|n| node_text(&n, source).to_string())?;
                let is_abstract = child
                    .child_by_field_name("type")
                    .map(|t| t.kind() == "interface_type")
                    .unwrap_or(false);
                return Some(ClassInfo { name, bases: Vec::new(), is_abstract, decorators: Vec::new() });
            }
        }
        return None;
    }

    let name = node
        .child_by_field_name("name")
        .map(|n| node_text(&n, source).trim().to_string())
        .filter(|n| !n.is_empty())?;

    let mut bases = Vec::new();
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if BASE_CLAUSE_NODES.contains(&child.kind()) {
            for (kind, text) in lex(node_text(&child, source)) {
                if kind == crate::scanner::tokens::TokenKind::Identifier
                    && !matches!(text, "extends" | "implements" | "public" | "private" | "virtual")
                {
                    bases.push(text.to_string());
                }
            }
        }
    }

    let is_abstract = is_abstract_class(node, source, grammar, &bases);
    let decorators = collect_decorators(node, source, grammar);
    Some(ClassInfo { name, bases, is_abstract, decorators })
}

fn is_abstract_class(node: &Node, source: &str, grammar: &SyntaxGrammar, bases: &[String]) -> bool {
    if grammar.interface_nodes.contains(&node.kind()) {
        return true;
    }
    if node.kind() == "abstract_class_declaration" {
        return true;
    }
    if grammar.lang == Lang::Python {
        let known_abstract = ["ABC", "ABCMeta", "Protocol"];
        if bases.iter().any(|b| known_abstract.contains(&b.as_str())) {
            return true;
        }
        return node_text(node, source).contains("@abstractmethod");
    }
    if let Some(keyword) = grammar.abstract_keyword {
        let text = node_text(node, source);
        if grammar.lang == Lang::Cpp {
            // Pure virtual member marks the class abstract
            return text.contains(keyword) && text.contains("= 0");
        }
        // Keyword precedes the definition on its first line
        let header = text.lines().next().unwrap_or("");
        if header.contains(keyword) {
            return true;
        }
        // TS/Java put the keyword before the node itself
        if let Some(prev) = node.prev_sibling() {
            if node_text(&prev, source).trim() == keyword {
                return true;
            }
        }
    }
    false
}

/// Raw import strings for one import node
fn extract_import(node: &Node, source: &str, lang: Lang) -> Vec<String> {
    let text = node_text(node, source);
    match lang {
        Lang::Python => {
            if node.kind() == "import_from_statement" {
                // from X import a, b  ->  X.a, X.b (the names may be
                // submodules; resolution falls back to shorter prefixes)
                let Some(module) = node.child_by_field_name("module_name") else {
                    return Vec::new();
                };
                let module_text = node_text(&module, source).to_string();
                let mut cursor = node.walk();
                let names: Vec<String> = node
                    .children_by_field_name("name", &mut cursor)
                    .map(|n| node_text(&n, source).to_string())
                    .collect();
                if names.is_empty() {
                    return vec![module_text];
                }
                names
                    .into_iter()
                    .map(|name| {
                        if module_text.ends_with('.') {
                            format!("{}{}", module_text, name)
                        } else {
                            format!("{}.{}", module_text, name)
                        }
                    })
                    .collect()
            } else {
                // import a.b, c  ->  [a.b, c]
                let mut cursor = node.walk();
                node.named_children(&mut cursor)
                    .filter(|c| c.kind() == "dotted_name" || c.kind() == "aliased_import")
                    .map(|c| {
                        let name = c
                            .child_by_field_name("name")
                            .unwrap_or(c);
                        node_text(&name, source).to_string()
                    })
                    .collect()
            }
        }
        Lang::JavaScript | Lang::TypeScript => find_string_child(node, source)
            .map(|s| vec![s])
            .unwrap_or_default(),
        Lang::Go => find_string_child(node, source).map(|s| vec![s]).unwrap_or_default(),
        Lang::Rust => {
            let body = text.trim_start_matches("use").trim_end_matches(';').trim();
            let prefix = body.split('{').next().unwrap_or(body).trim_end_matches("::").trim();
            if prefix.is_empty() {
                Vec::new()
            } else {
                vec![prefix.to_string()]
            }
        }
        Lang::Java => {
            let body = text
                .trim_start_matches("import")
                .trim()
                .trim_start_matches("static")
                .trim()
                .trim_end_matches(';')
                .trim();
            if body.is_empty() {
                Vec::new()
            } else {
                vec![body.to_string()]
            }
        }
        Lang::C | Lang::Cpp => {
            // Keep the include form: quotes mean project-local, angles system
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                if child.kind() == "string_literal" || child.kind() == "system_lib_string" {
                    return vec![node_text(&child, source).to_string()];
                }
            }
            Vec::new()
        }
    }
}

fn find_string_child(node: &Node, source: &str) -> Option<String> {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.kind() == "string" || child.kind() == "interpreted_string_literal" {
            let text = node_text(&child, source).trim_matches(|c| c == '"' || c == '\'' || c == '`');
            return Some(text.to_string());
        }
        if let Some(found) = find_string_child(&child, source) {
            return Some(found);
        }
    }
    None
}

/// Docstring / doc-comment detection: Python checks the first body
/// statement, everything else checks the lines directly above.
fn has_docstring(
    node: &Node,
    source: &str,
    grammar: &SyntaxGrammar,
    source_lines: &[&str],
) -> bool {
    if grammar.lang == Lang::Python {
        if let Some(body) = node.child_by_field_name("body") {
            let mut cursor = body.walk();
            let first = body.named_children(&mut cursor).next();
            if let Some(first) = first {
                if first.kind() == "expression_statement" {
                    return node_text(&first, source).trim_start().starts_with(['"', '\'']);
                }
            }
        }
        return false;
    }

    // Walk up through decorators to the true definition start
    let mut start_row = node.start_position().row;
    let mut prev = node.prev_named_sibling();
    while let Some(sibling) = prev {
        if grammar.decorator_nodes.contains(&sibling.kind()) {
            start_row = sibling.start_position().row;
            prev = sibling.prev_named_sibling();
        } else {
            break;
        }
    }

    let Some(row_above) = start_row.checked_sub(1) else { return false };
    let line = source_lines.get(row_above).map(|l| l.trim()).unwrap_or("");
    line.starts_with("///")
        || line.starts_with("//!")
        || line.starts_with("//")
        || line.starts_with('*')
        || line.starts_with("/*")
        || line.ends_with("*/")
}

fn node_text<'a>(node: &Node, source: &'a str) -> &'a str {
    node.utf8_text(source.as_bytes()).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn python_function_and_imports() {
        let source = r#"
import os
from collections import OrderedDict

def process(items):
    """Process items."""
    for item in items:
        if item:
            handle(item)
"#;
        let syntax = parse_file(source, Lang::Python).unwrap();
        assert_eq!(syntax.functions.len(), 1);
        let func = &syntax.functions[0];
        assert_eq!(func.name, "process");
        assert!(func.has_docstring);
        assert_eq!(func.nesting_depth, 2);
        assert_eq!(func.branch_count, 2);
        assert_eq!(func.call_targets.as_deref(), Some(&["handle".to_string()][..]));

        let raws: Vec<&str> = syntax.imports.iter().map(|i| i.raw.as_str()).collect();
        assert!(raws.contains(&"os"));
        assert!(raws.contains(&"collections.OrderedDict"));
    }

    #[test]
    fn python_abstract_class() {
        let source = r#"
from abc import ABC

class Repository(ABC):
    pass

class Concrete(Repository):
    pass
"#;
        let syntax = parse_file(source, Lang::Python).unwrap();
        assert_eq!(syntax.classes.len(), 2);
        assert!(syntax.classes[0].is_abstract);
        assert!(!syntax.classes[1].is_abstract);
        assert_eq!(syntax.classes[1].bases, vec!["Repository"]);
    }

    #[test]
    fn rust_function_and_use() {
        let source = r#"
use std::collections::HashMap;

/// Adds numbers.
pub fn add(a: u32, b: u32) -> u32 {
    if a > 0 {
        helper(a);
    }
    a + b
}
"#;
        let syntax = parse_file(source, Lang::Rust).unwrap();
        assert_eq!(syntax.functions.len(), 1);
        assert_eq!(syntax.functions[0].name, "add");
        assert!(syntax.functions[0].has_docstring);
        assert_eq!(syntax.imports[0].raw, "std::collections::HashMap");
    }

    #[test]
    fn typescript_imports_and_class() {
        let source = r#"
import { api } from "./api";

export class Service {
    run(): void {
        if (this.ready) {
            api.call();
        }
    }
}
"#;
        let syntax = parse_file(source, Lang::TypeScript).unwrap();
        assert_eq!(syntax.imports[0].raw, "./api");
        assert_eq!(syntax.classes.len(), 1);
        assert_eq!(syntax.classes[0].name, "Service");
        assert_eq!(syntax.functions.len(), 1);
    }

    #[test]
    fn c_include_forms() {
        let source = "#include \"local.h\"\n#include <stdio.h>\n\nint main(void) { return 0; }\n";
        let syntax = parse_file(source, Lang::C).unwrap();
        let raws: Vec<&str> = syntax.imports.iter().map(|i| i.raw.as_str()).collect();
        assert!(raws.contains(&"\"local.h\""));
        assert!(raws.contains(&"<stdio.h>"));
        assert_eq!(syntax.functions[0].name, "main");
    }

    #[test]
    fn parse_error_returns_none() {
        assert!(parse_file("def broken(:\n  nope", Lang::Python).is_none());
    }
}
