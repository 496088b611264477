//! Lightweight code tokenizer shared by the scanner, clone detection, and
//! concept extraction

use std::hash::Hasher;

/// One lexed token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Identifier,
    Number,
    StringLit,
    Symbol,
}

/// Lex source text into coarse tokens.
///
/// Comments and string bodies are collapsed rather than skipped so the token
/// stream still reflects file bulk; identifiers are returned verbatim.
pub fn lex(source: &str) -> Vec<(TokenKind, &str)> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i] as char;
        if c.is_whitespace() {
            i += 1;
        } else if c == '"' || c == '\'' || c == '`' {
            let quote = bytes[i];
            let start = i;
            i += 1;
            while i < bytes.len() && bytes[i] != quote {
                if bytes[i] == b'\\' {
                    i += 1;
                }
                i += 1;
            }
            i = (i + 1).min(bytes.len());
            tokens.push((TokenKind::StringLit, &source[start..i]));
        } else if c.is_ascii_alphabetic() || c == '_' {
            let start = i;
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                i += 1;
            }
            tokens.push((TokenKind::Identifier, &source[start..i]));
        } else if c.is_ascii_digit() {
            let start = i;
            while i < bytes.len()
                && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'.' || bytes[i] == b'_')
            {
                i += 1;
            }
            tokens.push((TokenKind::Number, &source[start..i]));
        } else if c.is_ascii() {
            tokens.push((TokenKind::Symbol, &source[i..i + 1]));
            i += 1;
        } else {
            // Skip over one multi-byte char
            let mut end = i + 1;
            while end < bytes.len() && (bytes[end] & 0xC0) == 0x80 {
                end += 1;
            }
            i = end;
        }
    }

    tokens
}

/// FNV-1a over a byte slice; the crate-wide content hash primitive
pub fn fnv1a(bytes: &[u8]) -> u64 {
    const FNV_OFFSET: u64 = 14695981039346656037;
    const FNV_PRIME: u64 = 1099511628211;
    let mut hash = FNV_OFFSET;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Hash each token to a truncated value for the clone-detection corpus
pub fn token_hashes(tokens: &[(TokenKind, &str)]) -> Vec<u32> {
    tokens.iter().map(|(_, text)| fnv1a(text.as_bytes()) as u32).collect()
}

/// Hash each line for rename detection (blank lines dropped)
pub fn line_hashes(source: &str) -> Vec<u64> {
    source
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|l| fnv1a(l.as_bytes()))
        .collect()
}

/// Split an identifier on camelCase and snake_case boundaries.
///
/// "parseHttpRequest" and "parse_http_request" both yield
/// ["parse", "http", "request"]. Segments shorter than 2 chars are dropped.
pub fn split_identifier(ident: &str) -> Vec<String> {
    let mut parts = Vec::new();
    for word in ident.split(|c: char| !c.is_alphanumeric()) {
        if word.is_empty() {
            continue;
        }
        let mut current = String::new();
        let mut prev_upper = false;
        for c in word.chars() {
            if c.is_uppercase() && !current.is_empty() && !prev_upper {
                push_segment(&mut parts, &current);
                current.clear();
            }
            prev_upper = c.is_uppercase();
            current.push(c.to_ascii_lowercase());
        }
        push_segment(&mut parts, &current);
    }
    parts
}

fn push_segment(parts: &mut Vec<String>, segment: &str) {
    if segment.len() >= 2 && !segment.chars().all(|c| c.is_ascii_digit()) {
        parts.push(segment.to_string());
    }
}

/// Count TODO-style markers in comment-looking positions
pub fn count_todo_markers(source: &str) -> usize {
    source
        .lines()
        .filter(|line| {
            let upper = line.to_uppercase();
            upper.contains("TODO") || upper.contains("FIXME") || upper.contains("HACK:")
        })
        .count()
}

/// Per-scan deterministic hasher for identifier interning
pub fn stable_hasher() -> ahash::AHasher {
    use std::hash::BuildHasher;
    ahash::RandomState::with_seeds(0x517c_c1b7, 0x2772_0a95, 0xfb5d_1fb6, 0x3352_7b6e).build_hasher()
}

/// Hash an identifier with the deterministic hasher
pub fn stable_hash(text: &str) -> u64 {
    let mut hasher = stable_hasher();
    hasher.write(text.as_bytes());
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lex_basic_code() {
        let tokens = lex("fn add(a: i32) -> i32 { a + 1 }");
        let idents: Vec<&str> = tokens
            .iter()
            .filter(|(k, _)| *k == TokenKind::Identifier)
            .map(|(_, t)| *t)
            .collect();
        assert_eq!(idents, vec!["fn", "add", "a", "i32", "i32", "a"]);
    }

    #[test]
    fn lex_string_is_one_token() {
        let tokens = lex(r#"x = "hello world + 3""#);
        let strings = tokens.iter().filter(|(k, _)| *k == TokenKind::StringLit).count();
        assert_eq!(strings, 1);
    }

    #[test]
    fn split_camel_and_snake() {
        assert_eq!(split_identifier("parseHttpRequest"), vec!["parse", "http", "request"]);
        assert_eq!(split_identifier("parse_http_request"), vec!["parse", "http", "request"]);
        assert_eq!(split_identifier("HTTPServer"), vec!["httpserver"]);
        assert_eq!(split_identifier("x"), Vec::<String>::new());
    }

    #[test]
    fn fnv1a_is_stable() {
        assert_eq!(fnv1a(b"abc"), fnv1a(b"abc"));
        assert_ne!(fnv1a(b"abc"), fnv1a(b"abd"));
    }

    #[test]
    fn line_hashes_skip_blanks() {
        let hashes = line_hashes("a\n\n  \nb\n");
        assert_eq!(hashes.len(), 2);
    }

    #[test]
    fn todo_markers_counted() {
        let src = "// TODO: fix\nlet x = 1;\n# FIXME broken\n";
        assert_eq!(count_todo_markers(src), 2);
    }
}
