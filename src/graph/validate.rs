//! Path-reporting cycle validation.
//!
//! The Kahn sorter reports *which* names are cyclic but not the offending
//! path. This validator walks dependency text depth-first from a starting
//! text, carrying the current path, and fails with the closed cycle path
//! (`@a -> @b -> @a`) as soon as a name repeats on the path.
//!
//! References to names with no live snippet are skipped here; they are a
//! warning surface of their own (see [`crate::references`]).

use std::collections::{HashMap, HashSet};

use super::builder::live_snippets;
use crate::core::{Snippet, SnippetError};
use crate::references::extract_references;

/// Fail with [`SnippetError::Cycle`] if anything reachable from `text` is circular.
pub fn validate_snippet_dependencies(text: &str, snippets: &[Snippet]) -> Result<(), SnippetError> {
    let by_name: HashMap<&str, &Snippet> =
        live_snippets(snippets).into_iter().map(|s| (s.name.as_str(), s)).collect();

    let mut path: Vec<String> = Vec::new();
    let mut finished: HashSet<String> = HashSet::new();

    for name in extract_references(text) {
        if by_name.contains_key(name.as_str()) {
            visit(&name, &by_name, &mut path, &mut finished)?;
        }
    }
    Ok(())
}

/// Validate starting from the snippet `name` itself.
pub fn validate_from_snippet(name: &str, snippets: &[Snippet]) -> Result<(), SnippetError> {
    validate_snippet_dependencies(&format!("@{name}"), snippets)
}

fn visit(
    name: &str,
    by_name: &HashMap<&str, &Snippet>,
    path: &mut Vec<String>,
    finished: &mut HashSet<String>,
) -> Result<(), SnippetError> {
    if let Some(start) = path.iter().position(|entry| entry == name) {
        let mut cycle = path[start..].to_vec();
        // Close the loop so the message reads @a -> @b -> @a
        cycle.push(name.to_string());
        return Err(SnippetError::Cycle {
            path: cycle,
        });
    }
    if finished.contains(name) {
        return Ok(());
    }
    let Some(snippet) = by_name.get(name) else {
        return Ok(());
    };

    path.push(name.to_string());
    for reference in extract_references(snippet.dependency_text()) {
        if by_name.contains_key(reference.as_str()) {
            visit(&reference, by_name, path, finished)?;
        }
    }
    path.pop();
    finished.insert(name.to_string());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::sort::topological_sort_for_execution;

    fn lit(name: &str, content: &str) -> Snippet {
        Snippet::literal(name, content)
    }

    fn cycle_message(result: Result<(), SnippetError>) -> String {
        match result {
            Err(err @ SnippetError::Cycle { .. }) => err.to_string(),
            other => panic!("expected cycle error, got {other:?}"),
        }
    }

    #[test]
    fn test_direct_self_cycle() {
        let snippets = vec![lit("a", "@a")];
        let message = cycle_message(validate_snippet_dependencies("@a", &snippets));
        assert_eq!(message, "Snippet cycle detected: @a -> @a");
    }

    #[test]
    fn test_indirect_cycle() {
        let snippets = vec![lit("a", "@b"), lit("b", "@a")];
        let message = cycle_message(validate_snippet_dependencies("@a", &snippets));
        assert_eq!(message, "Snippet cycle detected: @a -> @b -> @a");
    }

    #[test]
    fn test_reports_minimal_cycle_not_entry_path() {
        let snippets = vec![lit("entry", "@a"), lit("a", "@b"), lit("b", "@c"), lit("c", "@b")];
        let message = cycle_message(validate_snippet_dependencies("@entry", &snippets));
        assert_eq!(message, "Snippet cycle detected: @b -> @c -> @b");
    }

    #[test]
    fn test_missing_references_are_skipped() {
        let snippets = vec![lit("a", "@ghost ${phantom}")];
        assert!(validate_snippet_dependencies("@a @nobody", &snippets).is_ok());
    }

    #[test]
    fn test_diamond_is_not_a_cycle() {
        let snippets = vec![lit("a", "x"), lit("b", "@a"), lit("c", "@a"), lit("d", "@b @c")];
        assert!(validate_snippet_dependencies("@d", &snippets).is_ok());
    }

    #[test]
    fn test_long_form_references_are_followed() {
        let snippets = vec![lit("a", "${b}"), lit("b", "${ a }")];
        let message = cycle_message(validate_from_snippet("a", &snippets));
        assert_eq!(message, "Snippet cycle detected: @a -> @b -> @a");
    }

    #[test]
    fn test_agrees_with_kahn_membership() {
        let snippets = vec![
            lit("a", "@b"),
            lit("b", "@c"),
            lit("c", "@a"),
            lit("tail", "@a"),
            lit("free", "x"),
            lit("uses_free", "@free"),
        ];
        let sort = topological_sort_for_execution(&snippets);
        for name in ["a", "b", "c", "tail"] {
            assert!(sort.cyclic.contains(name));
            assert!(validate_from_snippet(name, &snippets).is_err());
        }
        for name in ["free", "uses_free"] {
            assert!(!sort.cyclic.contains(name));
            assert!(validate_from_snippet(name, &snippets).is_ok());
        }
    }
}
