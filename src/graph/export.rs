//! Human- and tool-readable renderings of the reference graph.

use petgraph::dot::{Config, Dot};
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

use super::builder::DependencyGraph;
use crate::core::Snippet;

/// Build a petgraph graph where an edge `a -> b` means `a` references `b`.
#[must_use]
pub fn to_petgraph(graph: &DependencyGraph) -> DiGraph<String, &'static str> {
    let mut digraph = DiGraph::new();
    let mut indices: HashMap<&str, NodeIndex> = HashMap::new();

    for name in graph.names() {
        indices.insert(name.as_str(), digraph.add_node(name.clone()));
    }
    for name in graph.names() {
        for dependency in graph.dependencies(name) {
            if let (Some(&from), Some(&to)) =
                (indices.get(name.as_str()), indices.get(dependency.as_str()))
            {
                digraph.add_edge(from, to, "");
            }
        }
    }
    digraph
}

/// Render the whole snippet graph in Graphviz DOT format.
#[must_use]
pub fn to_dot(snippets: &[Snippet]) -> String {
    let graph = DependencyGraph::build(snippets);
    let digraph = to_petgraph(&graph);
    format!("{}", Dot::with_config(&digraph, &[Config::EdgeNoLabel]))
}

/// Render the dependencies of `root` as a tree.
///
/// A name that repeats on its own branch is printed once more and marked
/// `(circular reference)` instead of being expanded again.
#[must_use]
pub fn to_tree_string(root: &str, graph: &DependencyGraph) -> String {
    let mut result = String::new();
    let mut path = Vec::new();
    build_tree_string(root, graph, &mut result, "", true, &mut path);
    result
}

fn build_tree_string<'g>(
    node: &'g str,
    graph: &'g DependencyGraph,
    result: &mut String,
    prefix: &str,
    is_last: bool,
    path: &mut Vec<&'g str>,
) {
    let connector = if is_last {
        "└── "
    } else {
        "├── "
    };
    result.push_str(&format!("{prefix}{connector}@{node}\n"));

    let child_prefix = if is_last {
        format!("{prefix}    ")
    } else {
        format!("{prefix}│   ")
    };

    if path.contains(&node) {
        result.push_str(&format!("{child_prefix}└── (circular reference)\n"));
        return;
    }

    path.push(node);
    let deps: Vec<&'g str> = graph.dependencies(node).map(String::as_str).collect();
    for (i, dep) in deps.iter().copied().enumerate() {
        let is_last_child = i == deps.len() - 1;
        build_tree_string(dep, graph, result, &child_prefix, is_last_child, path);
    }
    path.pop();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(name: &str, content: &str) -> Snippet {
        Snippet::literal(name, content)
    }

    #[test]
    fn test_tree_string() {
        let snippets = vec![lit("a", "x"), lit("b", "@a"), lit("c", "@a @b")];
        let graph = DependencyGraph::build(&snippets);
        let tree = to_tree_string("c", &graph);
        let expected = "└── @c\n    ├── @a\n    └── @b\n        └── @a\n";
        assert_eq!(tree, expected);
    }

    #[test]
    fn test_tree_marks_cycles() {
        let snippets = vec![lit("a", "@b"), lit("b", "@a")];
        let graph = DependencyGraph::build(&snippets);
        let tree = to_tree_string("a", &graph);
        assert!(tree.contains("(circular reference)"));
        assert_eq!(tree.matches("@a").count(), 2);
    }

    #[test]
    fn test_dot_contains_nodes_and_edges() {
        let snippets = vec![lit("a", "x"), lit("b", "@a @ghost")];
        let dot = to_dot(&snippets);
        assert!(dot.starts_with("digraph"));
        assert!(dot.contains("\"a\""));
        assert!(dot.contains("\"b\""));
        assert!(dot.contains("1 -> 0"));
        assert!(!dot.contains("ghost"));
    }

    #[test]
    fn test_petgraph_edge_count_matches() {
        let snippets = vec![lit("a", "x"), lit("b", "@a"), lit("c", "@a @b")];
        let graph = DependencyGraph::build(&snippets);
        assert_eq!(to_petgraph(&graph).edge_count(), graph.edge_count());
    }
}
