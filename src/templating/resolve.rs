//! Full-document resolution of snippet references.
//!
//! Resolution never evaluates anything while a cycle exists among the
//! snippets. Without cycles, every snippet is resolved in topological order
//! against the values resolved before it, then the caller's text is evaluated
//! against the completed scope.

use std::collections::{HashMap, HashSet};

use super::error::TemplateError;
use super::evaluator::TemplateEvaluator;
use crate::core::{Snippet, SnippetError};
use crate::graph::{topological_sort_for_execution, validate_from_snippet};

/// Resolve `text` against `snippets` with the default evaluator.
pub async fn resolve_snippets_with_templates(
    text: &str,
    snippets: &[Snippet],
) -> Result<String, SnippetError> {
    resolve(text, snippets, &TemplateEvaluator::default()).await
}

/// Resolve `text` against `snippets` with `evaluator` and its async functions.
///
/// Generated snippets contribute their stored output verbatim; literal
/// snippets are evaluated so their own references resolve.
///
/// # Errors
///
/// - [`SnippetError::Cycle`] with the offending path when any snippet is cyclic
/// - [`SnippetError::NotFound`] when a referenced name matches no snippet
/// - [`SnippetError::NotYetResolved`] when a snippet is referenced before its
///   value entered the scope
/// - [`SnippetError::Evaluation`] / [`SnippetError::TemplateSyntax`] for
///   expression failures
pub async fn resolve(
    text: &str,
    snippets: &[Snippet],
    evaluator: &TemplateEvaluator,
) -> Result<String, SnippetError> {
    let sort = topological_sort_for_execution(snippets);
    if let Some(seed) = sort.cyclic.iter().next() {
        validate_from_snippet(seed, snippets)?;
        // The validator reaches a cycle from every cyclic name, so this only
        // fires if the two detectors ever disagree.
        return Err(SnippetError::Cycle {
            path: sort.cyclic.iter().cloned().collect(),
        });
    }

    let existing: HashSet<&str> = snippets.iter().map(|s| s.name.as_str()).collect();
    let mut scope: HashMap<String, String> = HashMap::with_capacity(sort.sorted.len());

    for snippet in &sort.sorted {
        let value = if snippet.is_generated {
            snippet.content.clone()
        } else {
            evaluator
                .evaluate(&snippet.content, &scope)
                .await
                .map_err(|error| map_template_error(error, &existing))?
        };
        scope.insert(snippet.name.clone(), value);
    }

    tracing::debug!("Resolving text against {} snippet value(s)", scope.len());
    evaluator.evaluate(text, &scope).await.map_err(|error| map_template_error(error, &existing))
}

fn map_template_error(error: TemplateError, existing: &HashSet<&str>) -> SnippetError {
    match error {
        TemplateError::NotBound { name } if existing.contains(name.as_str()) => {
            SnippetError::NotYetResolved { name }
        }
        other => other.into(),
    }
}
