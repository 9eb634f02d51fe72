//! Kahn topological sorting with cycle membership.
//!
//! In-degrees count only edges to live snippets. Names whose in-degree never
//! reaches zero are *cyclic*: they sit on a cycle or depend on one. Two views
//! share the core:
//!
//! - [`topological_sort_for_execution`] drops every cyclic snippet, so nothing
//!   built from circular content is ever evaluated or regenerated.
//! - [`snippet_display_order`] lists everything: the acyclic snippets in the
//!   same order, followed by the cyclic ones sorted by name.

use std::collections::{BTreeSet, HashMap, VecDeque};

use super::builder::{DependencyGraph, live_snippets};
use crate::core::Snippet;

/// Result of the execution-safe sort.
#[derive(Debug, Clone, Default)]
pub struct TopologicalSort {
    /// Acyclic snippets, each after every snippet it depends on.
    pub sorted: Vec<Snippet>,
    /// Names involved in (or blocked behind) a cycle.
    pub cyclic: BTreeSet<String>,
}

impl TopologicalSort {
    #[must_use]
    pub fn has_cycles(&self) -> bool {
        !self.cyclic.is_empty()
    }
}

/// Sort names so dependencies come first; report the names that never free up.
///
/// Returns `(sorted names, cyclic names)`.
#[must_use]
pub fn kahn_order(graph: &DependencyGraph) -> (Vec<String>, BTreeSet<String>) {
    let mut in_degree: HashMap<&str, usize> =
        graph.names().iter().map(|name| (name.as_str(), graph.in_degree(name))).collect();

    let mut queue: VecDeque<&str> = graph
        .names()
        .iter()
        .map(String::as_str)
        .filter(|name| in_degree.get(name) == Some(&0))
        .collect();

    let mut sorted = Vec::with_capacity(graph.names().len());
    while let Some(name) = queue.pop_front() {
        sorted.push(name.to_string());
        for dependent in graph.dependents(name) {
            if let Some(degree) = in_degree.get_mut(dependent.as_str()) {
                *degree = degree.saturating_sub(1);
                if *degree == 0 {
                    queue.push_back(dependent.as_str());
                }
            }
        }
    }

    let cyclic: BTreeSet<String> = in_degree
        .into_iter()
        .filter(|(_, degree)| *degree > 0)
        .map(|(name, _)| name.to_string())
        .collect();

    (sorted, cyclic)
}

/// Execution-safe ordering: cyclic snippets are excluded from `sorted`.
#[must_use]
pub fn topological_sort_for_execution(snippets: &[Snippet]) -> TopologicalSort {
    let graph = DependencyGraph::build(snippets);
    let (order, cyclic) = kahn_order(&graph);

    let by_name: HashMap<&str, &Snippet> =
        live_snippets(snippets).into_iter().map(|s| (s.name.as_str(), s)).collect();
    let sorted = order
        .iter()
        .filter_map(|name| by_name.get(name.as_str()))
        .map(|s| (*s).clone())
        .collect();

    if !cyclic.is_empty() {
        tracing::debug!("Excluding {} cyclic snippet(s) from execution order", cyclic.len());
    }

    TopologicalSort {
        sorted,
        cyclic,
    }
}

/// Display ordering: every live snippet, cyclic ones last and sorted by name.
#[must_use]
pub fn snippet_display_order(snippets: &[Snippet]) -> Vec<Snippet> {
    let TopologicalSort {
        mut sorted,
        cyclic,
    } = topological_sort_for_execution(snippets);

    let by_name: HashMap<&str, &Snippet> =
        live_snippets(snippets).into_iter().map(|s| (s.name.as_str(), s)).collect();
    // BTreeSet iteration is already lexicographic.
    sorted.extend(cyclic.iter().filter_map(|name| by_name.get(name.as_str())).map(|s| (*s).clone()));
    sorted
}
