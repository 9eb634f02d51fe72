//! Core types for snipweave
//!
//! This module holds the snippet record and the error taxonomy every other
//! module builds on.
//!
//! # Modules
//!
//! ## `snippet` - Records
//! - [`Snippet`] - A named text fragment, literal or generated
//! - [`SnippetPatch`] - Partial update used for dirty flags and regeneration output
//!
//! ## `error` - Error Handling
//! - [`SnippetError`] - Cycle, not-found, evaluation and lifecycle failures
//! - [`StoreError`] / [`GenerationError`] - Failures from external collaborators
//! - [`ErrorContext`] / [`user_friendly_error`] - Terminal-friendly error display

pub mod error;
mod snippet;

pub use error::{
    ErrorContext, GenerationError, SnippetError, StoreError, format_cycle_path,
    suggest_similar_names, user_friendly_error,
};
pub use snippet::{Snippet, SnippetPatch};

/// Check that `name` can be referenced with `@name` / `${name}`.
pub fn validate_name(name: &str) -> Result<(), SnippetError> {
    if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(SnippetError::InvalidName {
            name: name.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name() {
        assert!(validate_name("greeting_2").is_ok());
        assert!(validate_name("2fast").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("has space").is_err());
        assert!(validate_name("dash-name").is_err());
    }
}
