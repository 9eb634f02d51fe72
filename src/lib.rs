//! snipweave - snippets that reference and generate each other
//!
//! A snippet is a named piece of text. Its content is either written by hand
//! (a *literal* snippet) or produced by a language model from a prompt (a
//! *generated* snippet). Both kinds may reference other snippets by name, and
//! any text can be resolved against the whole collection.
//!
//! # Architecture Overview
//!
//! - References (`@name`, `${ expression }`) form a dependency graph between
//!   snippets. Snippets on a cycle are never resolved or regenerated.
//! - Resolution evaluates snippets in topological order, so every reference
//!   sees the fully resolved value of what it names.
//! - Changing a snippet marks the generated snippets downstream of it dirty
//!   and regenerates them wave by wave: a generated snippet is only
//!   regenerated once everything it depends on holds fresh content.
//! - Dirty flags are persisted, so work interrupted by a restart resumes.
//!
//! # Core Modules
//!
//! - [`core`] - Snippet records and error types
//! - [`references`] - Reference extraction and normalization
//! - [`graph`] - Dependency graphs, cycle detection, topological order and waves
//! - [`templating`] - Expression evaluation and full-document resolution
//! - [`regen`] - Lifecycle operations and regeneration orchestration
//!
//! # Collaborators
//!
//! - [`store`] - Snippet persistence (in memory or a JSON file)
//! - [`llm`] - Text generation service client and credential cell
//! - [`config`] - Global configuration (`~/.snipweave/config.toml`)
//! - [`cli`] - The `snipweave` command line
//!
//! # Example
//!
//! ```rust,no_run
//! use snipweave::core::Snippet;
//! use snipweave::templating::resolve_snippets_with_templates;
//!
//! # async fn example() -> Result<(), snipweave::core::SnippetError> {
//! let snippets = vec![
//!     Snippet::literal("customer", "Ada"),
//!     Snippet::literal("greeting", "Dear @customer"),
//! ];
//! let text = resolve_snippets_with_templates("${ greeting | upper },", &snippets).await?;
//! assert_eq!(text, "DEAR ADA,");
//! # Ok(())
//! # }
//! ```

// Core functionality modules
pub mod core;
pub mod graph;
pub mod references;
pub mod regen;
pub mod templating;

// Collaborators and outer surfaces
pub mod cli;
pub mod config;
pub mod constants;
pub mod llm;
pub mod store;

// test_utils module is available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
