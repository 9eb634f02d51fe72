//! Error handling for snipweave
//!
//! The error system follows two rules:
//! 1. **Strongly-typed errors** ([`SnippetError`], [`StoreError`], [`GenerationError`])
//!    so callers can match on the exact failure
//! 2. **User-friendly messages** through [`ErrorContext`], which adds details and
//!    suggestions before the binary prints a failure
//!
//! # Error Categories
//!
//! - **Cycles**: [`SnippetError::Cycle`] blocks resolution and regeneration of the
//!   cyclic set but never blocks saving a single snippet
//! - **Missing references**: [`SnippetError::NotFound`] fails a resolution; the same
//!   condition is only a warning in listings and validation
//! - **Evaluation**: [`SnippetError::Evaluation`] and [`SnippetError::TemplateSyntax`]
//!   carry the expression engine's message unchanged
//! - **Generation**: [`GenerationError`] is isolated per snippet during regeneration;
//!   [`GenerationError::MissingCredential`] is the retryable case
//! - **Persistence**: [`StoreError`] from the snippet store
//!
//! # Examples
//!
//! ```rust,no_run
//! use snipweave::core::{SnippetError, user_friendly_error};
//!
//! let err = SnippetError::Cycle {
//!     path: vec!["a".to_string(), "b".to_string(), "a".to_string()],
//! };
//! assert_eq!(err.to_string(), "Snippet cycle detected: @a -> @b -> @a");
//!
//! let ctx = user_friendly_error(anyhow::Error::from(err));
//! ctx.display();
//! ```

use colored::Colorize;
use std::fmt;
use strsim::levenshtein;
use thiserror::Error;
use uuid::Uuid;

/// Maximum Levenshtein distance, as a percentage of the target length, for name suggestions.
const SIMILARITY_THRESHOLD_PERCENT: usize = 50;

/// The main error type for snippet graph, resolution and lifecycle operations.
#[derive(Error, Debug)]
pub enum SnippetError {
    /// The reference graph among live snippets contains a cycle.
    ///
    /// `path` is closed: its last element repeats the name the cycle starts at.
    #[error("Snippet cycle detected: {}", format_cycle_path(path))]
    Cycle { path: Vec<String> },

    /// A reference names a snippet that does not exist.
    #[error("Snippet '@{name}' not found.")]
    NotFound { name: String },

    /// A snippet exists but was referenced before its value entered the scope.
    ///
    /// Topological ordering rules this out; seeing it means the ordering is broken.
    #[error("Internal error: snippet '@{name}' was referenced before it was resolved")]
    NotYetResolved { name: String },

    /// An embedded expression failed for a reason other than an unbound name.
    #[error("{message}")]
    Evaluation { message: String },

    /// The template text itself is malformed (e.g. an unterminated `${`).
    #[error("Template syntax error: {message}")]
    TemplateSyntax { message: String },

    #[error("A snippet named '@{name}' already exists")]
    DuplicateName { name: String },

    #[error("Invalid snippet name '{name}': names may only contain letters, digits and '_'")]
    InvalidName { name: String },

    #[error("No snippet with id {id}")]
    UnknownSnippet { id: Uuid },

    /// A generated snippet has no model to run its prompt against.
    #[error("Generated snippet '@{name}' has no model configured")]
    MissingModel { name: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("{message}")]
    Other { message: String },
}

impl SnippetError {
    /// Whether this failure should be retried once a credential shows up.
    #[must_use]
    pub const fn is_missing_credential(&self) -> bool {
        matches!(self, Self::Generation(GenerationError::MissingCredential))
    }
}

/// Errors raised by a snippet store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Snippet store I/O failed for {path}: {message}")]
    Io { path: String, message: String },

    #[error("Snippet store data is invalid: {message}")]
    Serialization { message: String },

    #[error("No stored snippet with id {id}")]
    NotFound { id: Uuid },
}

/// Errors raised by the text-generation service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    /// No credential is configured; retried automatically once one is published.
    #[error("Generation service credential is missing")]
    MissingCredential,

    #[error("Authentication with the generation service failed: {message}")]
    Authentication { message: String },

    #[error("Network error while calling the generation service: {message}")]
    Network { message: String },

    #[error("Generation service returned HTTP {status}: {message}")]
    Service { status: u16, message: String },

    #[error("Failed to parse generation service response: {message}")]
    Parse { message: String },
}

/// Render a closed cycle path as `@a -> @b -> @a`.
#[must_use]
pub fn format_cycle_path(path: &[String]) -> String {
    path.iter().map(|name| format!("@{name}")).collect::<Vec<_>>().join(" -> ")
}

/// Find existing names close to `target`, closest first, at most three.
#[must_use]
pub fn suggest_similar_names<'a>(
    target: &str,
    available: impl IntoIterator<Item = &'a str>,
) -> Vec<String> {
    let mut scored: Vec<(&str, usize)> =
        available.into_iter().map(|name| (name, levenshtein(target, name))).collect();
    scored.sort_by_key(|(name, distance)| (*distance, *name));

    let limit = (target.len() * SIMILARITY_THRESHOLD_PERCENT / 100).max(1);
    scored
        .into_iter()
        .filter(|(_, distance)| *distance <= limit)
        .take(3)
        .map(|(name, _)| name.to_string())
        .collect()
}

/// An error wrapped with optional details and a suggestion for terminal display.
#[derive(Debug)]
pub struct ErrorContext {
    pub error: SnippetError,
    pub suggestion: Option<String>,
    pub details: Option<String>,
}

impl ErrorContext {
    #[must_use]
    pub const fn new(error: SnippetError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error to stderr with colors.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error into an [`ErrorContext`] with a suggestion where one is known.
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    let error = match error.downcast::<ErrorContext>() {
        Ok(ctx) => return ctx,
        Err(error) => error,
    };

    match error.downcast::<SnippetError>() {
        Ok(snippet_error) => create_error_context(snippet_error),
        Err(other) => {
            let message = other.chain().map(ToString::to_string).collect::<Vec<_>>().join(": ");
            ErrorContext::new(SnippetError::Other {
                message,
            })
        }
    }
}

fn create_error_context(error: SnippetError) -> ErrorContext {
    match &error {
        SnippetError::Cycle { .. } => ErrorContext::new(error)
            .with_details("Snippets on a cycle can never be resolved or regenerated")
            .with_suggestion("Edit one snippet on the path so it no longer references the next"),
        SnippetError::NotFound { .. } => ErrorContext::new(error)
            .with_suggestion("Create the snippet with 'snipweave add' or fix the reference"),
        SnippetError::DuplicateName { .. } => ErrorContext::new(error)
            .with_suggestion("Pick another name or edit the existing snippet with 'snipweave edit'"),
        SnippetError::MissingModel { .. } => ErrorContext::new(error)
            .with_suggestion("Pass --model or set a default with 'snipweave config set-model'"),
        SnippetError::Generation(GenerationError::MissingCredential) => ErrorContext::new(error)
            .with_suggestion(
                "Set OPENROUTER_API_KEY or run 'snipweave config set-key <key>'",
            ),
        SnippetError::Generation(GenerationError::Authentication { .. }) => {
            ErrorContext::new(error).with_suggestion("Check that the configured API key is valid")
        }
        SnippetError::Store(_) => ErrorContext::new(error)
            .with_details("The snippet store file could not be read or written")
            .with_suggestion("Check the --store path and its permissions"),
        _ => ErrorContext::new(error),
    }
}
