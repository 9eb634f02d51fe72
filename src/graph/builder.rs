//! Forward and reverse reference graphs over a snippet snapshot.
//!
//! Edges only connect live snippets: a reference to a name with no matching
//! snippet is a warning elsewhere and never becomes an edge here.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use crate::core::Snippet;
use crate::references::extract_references;

/// name -> names it references (dependencies).
pub type ForwardGraph = HashMap<String, BTreeSet<String>>;

/// name -> names whose dependency text references it (dependents), in input order.
pub type ReverseGraph = HashMap<String, Vec<String>>;

/// Keep the first snippet for every name, preserving input order.
///
/// Names are unique among live snippets; a snapshot that violates this is
/// logged and the later duplicates are ignored.
#[must_use]
pub fn live_snippets(snippets: &[Snippet]) -> Vec<&Snippet> {
    let mut seen = HashSet::new();
    snippets
        .iter()
        .filter(|snippet| {
            let first = seen.insert(snippet.name.as_str());
            if !first {
                tracing::warn!("Ignoring duplicate snippet name '@{}' ({})", snippet.name, snippet.id);
            }
            first
        })
        .collect()
}

/// Build the forward graph: every live name maps to the live names it references.
#[must_use]
pub fn build_forward_graph(snippets: &[Snippet]) -> ForwardGraph {
    DependencyGraph::build(snippets).forward
}

/// Build the reverse graph: every live name maps to its direct dependents.
///
/// Every name is present, even with no dependents. Dependents appear in the
/// order their snippets appear in `snippets`.
#[must_use]
pub fn build_reverse_graph(snippets: &[Snippet]) -> ReverseGraph {
    DependencyGraph::build(snippets).reverse
}

/// Every name reachable from `name` over the reverse graph.
///
/// Breadth-first with a visited set, so cycles terminate. The queried name is
/// never part of the result, even when it depends on itself.
#[must_use]
pub fn find_transitive_dependents(name: &str, reverse: &ReverseGraph) -> HashSet<String> {
    breadth_first(name, |current| reverse.get(current).into_iter().flatten())
}

/// Every name `name` depends on, directly or indirectly.
#[must_use]
pub fn find_transitive_dependencies(name: &str, forward: &ForwardGraph) -> HashSet<String> {
    breadth_first(name, |current| forward.get(current).into_iter().flatten())
}

fn breadth_first<'g, F, I>(start: &str, neighbors: F) -> HashSet<String>
where
    F: Fn(&str) -> I,
    I: Iterator<Item = &'g String>,
{
    let mut visited: HashSet<String> = HashSet::new();
    let mut queue = VecDeque::new();
    queue.push_back(start.to_string());

    while let Some(current) = queue.pop_front() {
        for next in neighbors(current.as_str()) {
            if visited.insert(next.clone()) {
                queue.push_back(next.clone());
            }
        }
    }

    visited.remove(start);
    visited
}

/// Both directions of the reference graph plus the live name order.
///
/// A pure view over one snapshot; rebuild it after any mutation.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    order: Vec<String>,
    forward: ForwardGraph,
    reverse: ReverseGraph,
}

impl DependencyGraph {
    /// Build the graph for `snippets`, restricted to edges between them.
    #[must_use]
    pub fn build(snippets: &[Snippet]) -> Self {
        let live = live_snippets(snippets);
        let names: HashSet<&str> = live.iter().map(|s| s.name.as_str()).collect();

        let mut order = Vec::with_capacity(live.len());
        let mut forward = ForwardGraph::with_capacity(live.len());
        let mut reverse = ReverseGraph::with_capacity(live.len());
        for snippet in &live {
            order.push(snippet.name.clone());
            reverse.insert(snippet.name.clone(), Vec::new());
        }

        for snippet in &live {
            let dependencies: BTreeSet<String> = extract_references(snippet.dependency_text())
                .into_iter()
                .filter(|name| names.contains(name.as_str()))
                .collect();

            for dependency in &dependencies {
                if let Some(dependents) = reverse.get_mut(dependency) {
                    dependents.push(snippet.name.clone());
                }
            }
            forward.insert(snippet.name.clone(), dependencies);
        }

        Self {
            order,
            forward,
            reverse,
        }
    }

    /// Live names in input order.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.order
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.forward.contains_key(name)
    }

    /// Direct dependencies of `name`, ordered by name.
    pub fn dependencies(&self, name: &str) -> impl Iterator<Item = &String> {
        self.forward.get(name).into_iter().flatten()
    }

    /// Direct dependents of `name`, in input order.
    pub fn dependents(&self, name: &str) -> impl Iterator<Item = &String> {
        self.reverse.get(name).into_iter().flatten()
    }

    /// Number of live dependencies of `name`.
    #[must_use]
    pub fn in_degree(&self, name: &str) -> usize {
        self.forward.get(name).map_or(0, BTreeSet::len)
    }

    #[must_use]
    pub fn forward(&self) -> &ForwardGraph {
        &self.forward
    }

    #[must_use]
    pub fn reverse(&self) -> &ReverseGraph {
        &self.reverse
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.forward.values().map(BTreeSet::len).sum()
    }
}
