//! Snippet records and partial updates.
//!
//! A [`Snippet`] is the unit of content the engine works with. Non-generated
//! snippets carry user-authored `content`; generated snippets derive their
//! `content` from a `prompt` sent to a text-generation model. The text that is
//! scanned for references to other snippets is the *dependency text*: the
//! prompt of a generated snippet, or the content of a literal one.
//!
//! Records serialize with camelCase field names (`isGenerated`, `isDirty`,
//! `generationError`, `createdAt`, `updatedAt`) so a persisted collection
//! reads the same regardless of which store produced it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A named text fragment that other snippets can reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snippet {
    /// Stable identifier, assigned once and kept across renames.
    pub id: Uuid,
    /// Unique reference key used by `@name` and `${name}`.
    pub name: String,
    /// Literal text, or the last generated output when `is_generated` is set.
    #[serde(default)]
    pub content: String,
    /// Whether `content` is derived from `prompt`.
    #[serde(default)]
    pub is_generated: bool,
    /// Instruction template for generated snippets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Generation model identifier, e.g. `openai/gpt-4o`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// `content` may be stale relative to its dependencies.
    #[serde(default)]
    pub is_dirty: bool,
    /// Message from the last failed regeneration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Snippet {
    /// Create a literal (non-generated) snippet.
    pub fn literal(name: impl Into<String>, content: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            content: content.into(),
            is_generated: false,
            prompt: None,
            model: None,
            is_dirty: false,
            generation_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a generated snippet with empty content.
    ///
    /// New generated snippets start dirty: they have never been generated.
    pub fn generated(
        name: impl Into<String>,
        prompt: impl Into<String>,
        model: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            content: String::new(),
            is_generated: true,
            prompt: Some(prompt.into()),
            model,
            is_dirty: true,
            generation_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// The text scanned for references: `prompt` when generated, else `content`.
    #[must_use]
    pub fn dependency_text(&self) -> &str {
        if self.is_generated {
            self.prompt.as_deref().unwrap_or("")
        } else {
            &self.content
        }
    }

    /// Enforce the record invariants that do not depend on other snippets.
    ///
    /// A literal snippet is never dirty and never carries a generation error.
    pub fn normalize(&mut self) {
        if !self.is_generated {
            self.is_dirty = false;
            self.generation_error = None;
        }
        if self.updated_at < self.created_at {
            self.updated_at = self.created_at;
        }
    }

    /// Move `updated_at` forward without ever letting it go backwards.
    pub fn touch(&mut self) {
        let now = Utc::now();
        if now > self.updated_at {
            self.updated_at = now;
        }
    }

    /// Apply a partial update in place.
    pub fn apply(&mut self, patch: &SnippetPatch) {
        if let Some(content) = &patch.content {
            self.content.clone_from(content);
        }
        if let Some(is_dirty) = patch.is_dirty {
            self.is_dirty = is_dirty;
        }
        if let Some(error) = &patch.generation_error {
            self.generation_error.clone_from(error);
        }
        self.touch();
        self.normalize();
    }
}

/// Partial update used to flip flags or store output without a full rewrite.
///
/// `generation_error` is doubly optional: `None` leaves the field untouched,
/// `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnippetPatch {
    pub content: Option<String>,
    pub is_dirty: Option<bool>,
    pub generation_error: Option<Option<String>>,
}

impl SnippetPatch {
    /// Mark a snippet stale.
    #[must_use]
    pub fn dirty() -> Self {
        Self {
            is_dirty: Some(true),
            ..Self::default()
        }
    }

    /// Store freshly generated output and clear dirtiness and errors.
    #[must_use]
    pub fn regenerated(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            is_dirty: Some(false),
            generation_error: Some(None),
        }
    }

    /// Record a regeneration failure; the snippet stays dirty.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            content: None,
            is_dirty: Some(true),
            generation_error: Some(Some(message.into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dependency_text_uses_prompt_for_generated() {
        let literal = Snippet::literal("a", "hello @b");
        assert_eq!(literal.dependency_text(), "hello @b");

        let mut generated = Snippet::generated("g", "summarize @a", Some("m".to_string()));
        generated.content = "@ignored".to_string();
        assert_eq!(generated.dependency_text(), "summarize @a");
    }

    #[test]
    fn test_normalize_clears_flags_on_literal() {
        let mut snippet = Snippet::literal("a", "x");
        snippet.is_dirty = true;
        snippet.generation_error = Some("boom".to_string());
        snippet.normalize();
        assert!(!snippet.is_dirty);
        assert!(snippet.generation_error.is_none());
    }

    #[test]
    fn test_apply_patch() {
        let mut snippet = Snippet::generated("g", "p", Some("m".to_string()));
        let before = snippet.updated_at;

        snippet.apply(&SnippetPatch::failed("no key"));
        assert!(snippet.is_dirty);
        assert_eq!(snippet.generation_error.as_deref(), Some("no key"));

        snippet.apply(&SnippetPatch::regenerated("output"));
        assert!(!snippet.is_dirty);
        assert!(snippet.generation_error.is_none());
        assert_eq!(snippet.content, "output");
        assert!(snippet.updated_at >= before);
    }

    #[test]
    fn test_serializes_camel_case() {
        let snippet = Snippet::generated("g", "p", Some("m".to_string()));
        let json = serde_json::to_value(&snippet).unwrap();
        assert_eq!(json["isGenerated"], true);
        assert_eq!(json["isDirty"], true);
        assert!(json.get("generationError").is_none());
        assert!(json.get("createdAt").is_some());

        let back: Snippet = serde_json::from_value(json).unwrap();
        assert_eq!(back, snippet);
    }
}
