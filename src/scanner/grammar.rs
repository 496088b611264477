//! Per-language AST node mappings for the full-parse path
//!
//! Each language maps semantic concepts to tree-sitter node kinds; the
//! generic extractor in `parse.rs` walks the tree against these tables so
//! extraction logic exists once, not per language.

use crate::lang::Lang;

/// Node-kind tables for one language
#[derive(Debug, Clone)]
pub struct SyntaxGrammar {
    pub lang: Lang,

    /// Function/method definition nodes
    pub function_nodes: &'static [&'static str],
    /// Class/struct definition nodes
    pub class_nodes: &'static [&'static str],
    /// Interface/trait definition nodes; always abstract
    pub interface_nodes: &'static [&'static str],
    /// Control flow nodes that branch and nest
    pub control_flow_nodes: &'static [&'static str],
    /// Function/method call nodes
    pub call_nodes: &'static [&'static str],
    /// Import statement nodes
    pub import_nodes: &'static [&'static str],
    /// Decorator/attribute/annotation nodes
    pub decorator_nodes: &'static [&'static str],

    /// Field name for a definition's name
    pub name_field: &'static str,
    /// Field name for a definition's body
    pub body_field: &'static str,
    /// Field name for a call's callee
    pub callee_field: &'static str,

    /// Keyword whose presence on a class marks it abstract
    pub abstract_keyword: Option<&'static str>,
}

impl SyntaxGrammar {
    /// Look up the grammar table for a language
    pub fn for_lang(lang: Lang) -> &'static SyntaxGrammar {
        match lang {
            Lang::Python => &PYTHON,
            Lang::JavaScript => &JAVASCRIPT,
            Lang::TypeScript => &TYPESCRIPT,
            Lang::Rust => &RUST,
            Lang::Go => &GO,
            Lang::Java => &JAVA,
            Lang::C => &C,
            Lang::Cpp => &CPP,
        }
    }
}

/// Node kinds that introduce base classes / implemented interfaces,
/// shared across languages
pub const BASE_CLAUSE_NODES: &[&str] = &[
    "superclasses",
    "superclass",
    "super_interfaces",
    "class_heritage",
    "extends_clause",
    "implements_clause",
    "base_class_clause",
];

pub static PYTHON: SyntaxGrammar = SyntaxGrammar {
    lang: Lang::Python,
    function_nodes: &["function_definition"],
    class_nodes: &["class_definition"],
    interface_nodes: &[],
    control_flow_nodes: &[
        "if_statement",
        "for_statement",
        "while_statement",
        "match_statement",
        "with_statement",
        "try_statement",
    ],
    call_nodes: &["call"],
    import_nodes: &["import_statement", "import_from_statement"],
    decorator_nodes: &["decorator"],
    name_field: "name",
    body_field: "body",
    callee_field: "function",
    abstract_keyword: None,
};

pub static JAVASCRIPT: SyntaxGrammar = SyntaxGrammar {
    lang: Lang::JavaScript,
    function_nodes: &[
        "function_declaration",
        "function_expression",
        "arrow_function",
        "method_definition",
        "generator_function_declaration",
    ],
    class_nodes: &["class_declaration", "class"],
    interface_nodes: &[],
    control_flow_nodes: &[
        "if_statement",
        "for_statement",
        "for_in_statement",
        "while_statement",
        "do_statement",
        "switch_statement",
        "try_statement",
    ],
    call_nodes: &["call_expression"],
    import_nodes: &["import_statement"],
    decorator_nodes: &["decorator"],
    name_field: "name",
    body_field: "body",
    callee_field: "function",
    abstract_keyword: None,
};

pub static TYPESCRIPT: SyntaxGrammar = SyntaxGrammar {
    lang: Lang::TypeScript,
    function_nodes: &[
        "function_declaration",
        "function_expression",
        "arrow_function",
        "method_definition",
        "generator_function_declaration",
    ],
    class_nodes: &["class_declaration", "abstract_class_declaration", "class"],
    interface_nodes: &["interface_declaration"],
    control_flow_nodes: &[
        "if_statement",
        "for_statement",
        "for_in_statement",
        "while_statement",
        "do_statement",
        "switch_statement",
        "try_statement",
    ],
    call_nodes: &["call_expression"],
    import_nodes: &["import_statement"],
    decorator_nodes: &["decorator"],
    name_field: "name",
    body_field: "body",
    callee_field: "function",
    abstract_keyword: Some("abstract"),
};

pub static RUST: SyntaxGrammar = SyntaxGrammar {
    lang: Lang::Rust,
    function_nodes: &["function_item"],
    class_nodes: &["struct_item", "enum_item"],
    interface_nodes: &["trait_item"],
    control_flow_nodes: &[
        "if_expression",
        "match_expression",
        "for_expression",
        "while_expression",
        "loop_expression",
    ],
    call_nodes: &["call_expression", "macro_invocation"],
    import_nodes: &["use_declaration"],
    decorator_nodes: &["attribute_item"],
    name_field: "name",
    body_field: "body",
    callee_field: "function",
    abstract_keyword: None,
};

pub static GO: SyntaxGrammar = SyntaxGrammar {
    lang: Lang::Go,
    function_nodes: &["function_declaration", "method_declaration"],
    class_nodes: &["type_declaration"],
    interface_nodes: &[],
    control_flow_nodes: &[
        "if_statement",
        "for_statement",
        "switch_statement",
        "select_statement",
        "type_switch_statement",
    ],
    call_nodes: &["call_expression"],
    import_nodes: &["import_spec"],
    decorator_nodes: &[],
    name_field: "name",
    body_field: "body",
    callee_field: "function",
    abstract_keyword: None,
};

pub static JAVA: SyntaxGrammar = SyntaxGrammar {
    lang: Lang::Java,
    function_nodes: &["method_declaration", "constructor_declaration"],
    class_nodes: &["class_declaration"],
    interface_nodes: &["interface_declaration"],
    control_flow_nodes: &[
        "if_statement",
        "for_statement",
        "enhanced_for_statement",
        "while_statement",
        "do_statement",
        "switch_expression",
        "try_statement",
        "try_with_resources_statement",
    ],
    call_nodes: &["method_invocation"],
    import_nodes: &["import_declaration"],
    decorator_nodes: &["annotation", "marker_annotation"],
    name_field: "name",
    body_field: "body",
    callee_field: "name",
    abstract_keyword: Some("abstract"),
};

pub static C: SyntaxGrammar = SyntaxGrammar {
    lang: Lang::C,
    function_nodes: &["function_definition"],
    class_nodes: &["struct_specifier"],
    interface_nodes: &[],
    control_flow_nodes: &[
        "if_statement",
        "for_statement",
        "while_statement",
        "do_statement",
        "switch_statement",
    ],
    call_nodes: &["call_expression"],
    import_nodes: &["preproc_include"],
    decorator_nodes: &[],
    name_field: "declarator",
    body_field: "body",
    callee_field: "function",
    abstract_keyword: None,
};

pub static CPP: SyntaxGrammar = SyntaxGrammar {
    lang: Lang::Cpp,
    function_nodes: &["function_definition"],
    class_nodes: &["struct_specifier", "class_specifier"],
    interface_nodes: &[],
    control_flow_nodes: &[
        "if_statement",
        "for_statement",
        "for_range_loop",
        "while_statement",
        "do_statement",
        "switch_statement",
        "try_statement",
    ],
    call_nodes: &["call_expression"],
    import_nodes: &["preproc_include"],
    decorator_nodes: &[],
    name_field: "declarator",
    body_field: "body",
    callee_field: "function",
    abstract_keyword: Some("virtual"),
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_language_has_a_grammar() {
        for lang in Lang::all() {
            let grammar = SyntaxGrammar::for_lang(*lang);
            assert_eq!(grammar.lang, *lang);
            assert!(!grammar.function_nodes.is_empty());
            assert!(!grammar.import_nodes.is_empty());
        }
    }
}
