//! Breadth-first level decomposition ("waves") of a snippet subset.
//!
//! Wave *k* holds exactly the names whose dependencies, among the snippets
//! passed in, all lie in waves `0..k`. Members of one wave share no dependency
//! relation and may regenerate concurrently.

use std::collections::{HashMap, HashSet};

use super::builder::DependencyGraph;
use crate::core::Snippet;

/// One group of snippet names with no dependencies among themselves.
pub type Wave = Vec<String>;

/// Group `snippets` into dependency waves.
///
/// Only edges between the given snippets count. Names on (or behind) a cycle
/// never reach in-degree zero and are left out of the result; callers must
/// have rejected cycles before getting here.
#[must_use]
pub fn group_snippets_into_waves(snippets: &[Snippet]) -> Vec<Wave> {
    let graph = DependencyGraph::build(snippets);

    let mut in_degree: HashMap<&str, usize> =
        graph.names().iter().map(|name| (name.as_str(), graph.in_degree(name))).collect();
    let mut processed: HashSet<&str> = HashSet::new();
    let mut waves = Vec::new();

    loop {
        let wave: Vec<&str> = graph
            .names()
            .iter()
            .map(String::as_str)
            .filter(|name| !processed.contains(name) && in_degree.get(name) == Some(&0))
            .collect();
        if wave.is_empty() {
            break;
        }

        for name in &wave {
            processed.insert(*name);
            for dependent in graph.dependents(name) {
                if let Some(degree) = in_degree.get_mut(dependent.as_str()) {
                    *degree = degree.saturating_sub(1);
                }
            }
        }
        waves.push(wave.into_iter().map(String::from).collect());
    }

    let left_out = graph.names().len() - processed.len();
    if left_out > 0 {
        tracing::debug!("{left_out} cyclic snippet(s) left out of the wave plan");
    }

    waves
}
