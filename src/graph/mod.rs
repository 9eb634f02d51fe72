//! Dependency graph algorithms over snippet snapshots.
//!
//! Every function here takes the snippet collection as a parameter and returns
//! a pure result; nothing is cached across mutations. Edges are by-name
//! lookups into that one collection, so no node owns another and every
//! traversal carries its own visited set.
//!
//! - [`builder`] - forward/reverse graphs and transitive closure queries
//! - [`sort`] - Kahn ordering with cyclic-name reporting
//! - [`validate`] - depth-first validation that reports the cycle path
//! - [`waves`] - breadth-first level decomposition for parallel regeneration
//! - [`export`] - tree and Graphviz renderings

pub mod builder;
pub mod export;
pub mod sort;
pub mod validate;
pub mod waves;

pub use builder::{
    DependencyGraph, ForwardGraph, ReverseGraph, build_forward_graph, build_reverse_graph,
    find_transitive_dependencies, find_transitive_dependents,
};
pub use sort::{TopologicalSort, snippet_display_order, topological_sort_for_execution};
pub use validate::{validate_from_snippet, validate_snippet_dependencies};
pub use waves::{Wave, group_snippets_into_waves};
