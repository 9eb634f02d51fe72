//! Text generation for generated snippets.
//!
//! Regeneration talks to a [`Generator`]: given a fully resolved instruction
//! and a model identifier, produce text. [`OpenRouterClient`] implements it
//! against an OpenAI-compatible chat completions endpoint. The credential is
//! passed per call from a [`Credentials`] cell so that a key published later
//! is picked up without rebuilding anything.

mod credentials;
mod openrouter;

use async_trait::async_trait;

use crate::core::GenerationError;

pub use credentials::Credentials;
pub use openrouter::{ModelInfo, OpenRouterClient, parse_price_per_million};

/// A text-generation service.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Run `instruction` against `model`.
    ///
    /// A missing or empty `credential` must fail with
    /// [`GenerationError::MissingCredential`] before any request is made.
    async fn generate(
        &self,
        instruction: &str,
        model: &str,
        credential: Option<&str>,
    ) -> Result<String, GenerationError>;
}

/// Return the credential when it is usable, else [`GenerationError::MissingCredential`].
pub fn require_credential(credential: Option<&str>) -> Result<&str, GenerationError> {
    match credential.map(str::trim) {
        Some(key) if !key.is_empty() => Ok(key),
        _ => Err(GenerationError::MissingCredential),
    }
}
