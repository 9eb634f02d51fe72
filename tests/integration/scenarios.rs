//! Resolution, ordering and cycle detection over whole snippet sets.

use snipweave::core::{Snippet, SnippetError};
use snipweave::graph::{
    build_forward_graph, build_reverse_graph, find_transitive_dependents,
    group_snippets_into_waves, snippet_display_order, topological_sort_for_execution,
    validate_from_snippet,
};
use snipweave::references::extract_references;
use snipweave::templating::resolve_snippets_with_templates;

fn lit(name: &str, content: &str) -> Snippet {
    Snippet::literal(name, content)
}

fn names(snippets: &[Snippet]) -> Vec<&str> {
    snippets.iter().map(|s| s.name.as_str()).collect()
}

#[tokio::test]
async fn test_linear_chain_resolves_through_every_level() {
    let snippets = vec![lit("C", "@B z"), lit("A", "x"), lit("B", "@A y")];
    assert_eq!(resolve_snippets_with_templates("@C", &snippets).await.unwrap(), "x y z");
}

#[test]
fn test_diamond_groups_into_three_waves() {
    let snippets =
        vec![lit("A", "a"), lit("B", "@A"), lit("C", "@A"), lit("D", "@B @C")];
    let mut waves = group_snippets_into_waves(&snippets);
    for wave in &mut waves {
        wave.sort();
    }
    assert_eq!(waves, vec![vec!["A"], vec!["B", "C"], vec!["D"]]);
}

#[tokio::test]
async fn test_cycles_are_reported_with_their_path() {
    let err = resolve_snippets_with_templates("@a", &[lit("a", "@a")]).await.unwrap_err();
    assert_eq!(err.to_string(), "Snippet cycle detected: @a -> @a");

    let snippets = vec![lit("a", "@b"), lit("b", "@a")];
    let err = resolve_snippets_with_templates("@a", &snippets).await.unwrap_err();
    assert_eq!(err.to_string(), "Snippet cycle detected: @a -> @b -> @a");
}

#[tokio::test]
async fn test_missing_reference_message() {
    let err = resolve_snippets_with_templates("${x}", &[lit("y", "1")]).await.unwrap_err();
    assert!(matches!(err, SnippetError::NotFound { .. }));
    assert_eq!(err.to_string(), "Snippet '@x' not found.");
}

#[tokio::test]
async fn test_text_without_references_is_unchanged() {
    let snippets = vec![lit("a", "1")];
    for text in ["", "plain text", "{{ not a template }}", "mail me at a@"] {
        assert_eq!(resolve_snippets_with_templates(text, &snippets).await.unwrap(), text);
    }
}

#[tokio::test]
async fn test_expressions_combine_snippet_values() {
    let snippets = vec![lit("first", "Ada"), lit("last", "Lovelace")];
    let text = "${ first | upper }: ${ first ~ \" \" ~ last }, ${@last}";
    assert_eq!(
        resolve_snippets_with_templates(text, &snippets).await.unwrap(),
        "ADA: Ada Lovelace, Lovelace"
    );
}

#[test]
fn test_execution_order_respects_dependencies() {
    let snippets = vec![
        lit("e", "@d @a"),
        lit("d", "@c"),
        lit("c", "@b @a"),
        lit("b", "@a"),
        lit("a", "root"),
    ];
    let sort = topological_sort_for_execution(&snippets);
    assert!(sort.cyclic.is_empty());

    let order = names(&sort.sorted);
    let position = |name: &str| order.iter().position(|n| *n == name).unwrap();
    for snippet in &snippets {
        for dependency in extract_references(&snippet.content) {
            assert!(position(&dependency) < position(&snippet.name));
        }
    }
}

#[test]
fn test_sorter_and_validator_agree_on_cycles() {
    let snippets = vec![
        lit("ok", "fine"),
        lit("x", "@y"),
        lit("y", "@z"),
        lit("z", "@x"),
        lit("tail", "@x"),
    ];
    let sort = topological_sort_for_execution(&snippets);
    assert!(sort.cyclic.contains("x") && sort.cyclic.contains("z"));
    assert!(!names(&sort.sorted).contains(&"x"));

    for name in &sort.cyclic {
        assert!(validate_from_snippet(name, &snippets).is_err(), "{name} should fail");
    }
    assert!(validate_from_snippet("ok", &snippets).is_ok());

    let display = snippet_display_order(&snippets);
    assert_eq!(display.len(), snippets.len());
    let tail: Vec<&str> = names(&display).into_iter().skip(1).collect();
    assert_eq!(tail, vec!["tail", "x", "y", "z"]);
}

#[test]
fn test_dependents_exclude_the_queried_name() {
    let snippets = vec![lit("a", "@a @b"), lit("b", "@a"), lit("c", "@b")];
    let reverse = build_reverse_graph(&snippets);
    let dependents = find_transitive_dependents("a", &reverse);
    assert!(!dependents.contains("a"));
    assert!(dependents.contains("b") && dependents.contains("c"));

    let forward = build_forward_graph(&snippets);
    assert!(forward["c"].contains("b"));
}

#[test]
fn test_reference_extraction_ignores_order_and_duplicates() {
    let one = extract_references("@a @b ${c} @a");
    let two = extract_references("${c} @b @a");
    assert_eq!(one, two);
}
