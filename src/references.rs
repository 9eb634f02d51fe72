//! Snippet reference extraction.
//!
//! A snippet refers to another snippet `name` in one of two equivalent forms:
//!
//! - **Short form**: `@name`
//! - **Long form**: `${name}` (surrounding whitespace inside the braces is allowed)
//!
//! Identifiers match `[A-Za-z0-9_]+`. A braced form holding anything other than
//! a bare identifier (`${a ~ "!"}`, `${len(x)}`) is an opaque expression for the
//! template evaluator and is not a reference. Short-form references written
//! inside such an expression (`${@a ~ "!"}`) still count.
//!
//! # Usage
//!
//! ```rust,no_run
//! use snipweave::references::extract_references;
//!
//! let refs = extract_references("Hi @name, see ${signature} and ${1 + 2}");
//! assert_eq!(refs.into_iter().collect::<Vec<_>>(), vec!["name", "signature"]);
//! ```

use regex::Regex;
use std::collections::{BTreeSet, HashSet};
use std::sync::LazyLock;

use crate::core::Snippet;

static REFERENCE_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"@([A-Za-z0-9_]+)|\$\{\s*([A-Za-z0-9_]+)\s*\}").ok());

/// A reference to a snippet that does not exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingReference {
    /// The snippet whose dependency text holds the reference, if any.
    pub source_snippet: Option<String>,
    /// The referenced name with no matching snippet.
    pub referenced_name: String,
}

impl MissingReference {
    #[must_use]
    pub fn new(source_snippet: Option<String>, referenced_name: String) -> Self {
        Self {
            source_snippet,
            referenced_name,
        }
    }
}

/// Extract the set of snippet names referenced by `text`.
///
/// Duplicates collapse and the result is ordered by name, so the output does
/// not depend on how often or in which order references appear.
#[must_use]
pub fn extract_references(text: &str) -> BTreeSet<String> {
    let Some(pattern) = REFERENCE_PATTERN.as_ref() else {
        return BTreeSet::new();
    };
    pattern
        .captures_iter(text)
        .filter_map(|cap| cap.get(1).or_else(|| cap.get(2)))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// List names referenced by `text` that match no snippet in `snippets`.
///
/// This is the warning surface: missing references never form graph edges
/// and never block saving.
#[must_use]
pub fn list_non_existent_references(text: &str, snippets: &[Snippet]) -> Vec<String> {
    let existing: HashSet<&str> = snippets.iter().map(|s| s.name.as_str()).collect();
    extract_references(text).into_iter().filter(|name| !existing.contains(name.as_str())).collect()
}

/// Collect every missing reference across the dependency texts of `snippets`.
#[must_use]
pub fn find_missing_references(snippets: &[Snippet]) -> Vec<MissingReference> {
    snippets
        .iter()
        .flat_map(|snippet| {
            list_non_existent_references(snippet.dependency_text(), snippets)
                .into_iter()
                .map(|name| MissingReference::new(Some(snippet.name.clone()), name))
        })
        .collect()
}

/// Rewrite every short-form reference to the long form.
///
/// Outside braces `@name` becomes `${name}`. Inside a braced expression
/// `@name` becomes the bare binding `name`, so `${@a ~ "!"}` turns into
/// `${a ~ "!"}`. Quoted strings inside expressions are left alone. An
/// unterminated `${` and everything after it is copied unchanged.
#[must_use]
pub fn normalize_references(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(pos) = rest.find(['@', '$']) {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        if let Some(body) = tail.strip_prefix("${") {
            let Some(end) = find_expression_end(body) else {
                out.push_str(tail);
                return out;
            };
            out.push_str("${");
            out.push_str(&strip_short_form(&body[..end]));
            out.push('}');
            rest = &body[end + 1..];
        } else if let Some(after) = tail.strip_prefix('@') {
            let len = identifier_len(after);
            if len == 0 {
                out.push('@');
            } else {
                out.push_str("${");
                out.push_str(&after[..len]);
                out.push('}');
            }
            rest = &after[len..];
        } else {
            out.push('$');
            rest = &tail[1..];
        }
    }

    out.push_str(rest);
    out
}

/// Byte offset of the `}` closing an expression whose body starts at `body[0]`.
///
/// Nested braces are balanced and quoted strings (`"`, `'`, `` ` ``) are skipped.
pub(crate) fn find_expression_end(body: &str) -> Option<usize> {
    find_closing(body, '{', '}')
}

/// Byte offset of the character closing a bracketed region, balancing `open`
/// and skipping quoted strings.
pub(crate) fn find_closing(body: &str, open: char, close: char) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;

    for (i, c) in body.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if matches!(c, '"' | '\'' | '`') => quote = Some(c),
            None if c == open => depth += 1,
            None if c == close => {
                if depth == 0 {
                    return Some(i);
                }
                depth -= 1;
            }
            None => {}
        }
    }
    None
}

/// Length in bytes of the identifier at the start of `text`.
pub(crate) fn identifier_len(text: &str) -> usize {
    text.bytes().take_while(|b| b.is_ascii_alphanumeric() || *b == b'_').count()
}

pub(crate) fn is_identifier(text: &str) -> bool {
    !text.is_empty() && identifier_len(text) == text.len()
}

fn strip_short_form(expression: &str) -> String {
    let mut out = String::with_capacity(expression.len());
    let mut quote: Option<char> = None;

    for (i, c) in expression.char_indices() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
                out.push(c);
            }
            None if matches!(c, '"' | '\'' | '`') => {
                quote = Some(c);
                out.push(c);
            }
            None if c == '@' && identifier_len(&expression[i + 1..]) > 0 => {}
            None => out.push(c),
        }
    }
    out
}
