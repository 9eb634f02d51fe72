//! Evaluator-level errors.
//!
//! Resolution needs to tell an unbound name apart from an expression that
//! failed for any other reason, so the two never share a variant.

use thiserror::Error;

use crate::core::SnippetError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    /// The expression referenced a name that is not in the scope.
    #[error("Variable `{name}` is not bound")]
    NotBound { name: String },

    /// The expression failed for any reason other than an unbound name.
    #[error("{message}")]
    Expression { message: String },

    /// The template text is malformed.
    #[error("{message}")]
    Syntax { message: String },
}

impl From<TemplateError> for SnippetError {
    /// Unbound names are mapped by the resolver, which knows which snippets
    /// exist; anything reaching this conversion is reported as-is.
    fn from(error: TemplateError) -> Self {
        match error {
            TemplateError::NotBound { name } => Self::NotFound { name },
            TemplateError::Expression { message } => Self::Evaluation { message },
            TemplateError::Syntax { message } => Self::TemplateSyntax { message },
        }
    }
}
