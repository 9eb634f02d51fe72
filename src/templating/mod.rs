//! Template evaluation and snippet resolution.
//!
//! Snippet text interpolates other snippets and expressions:
//!
//! - `@name` and `${name}` insert the resolved value of snippet `name`
//! - `${ expression }` evaluates an expression with every snippet value bound
//!   by name, e.g. `${ greeting ~ ", " ~ customer | title }`
//! - registered async functions may be called inside any expression, e.g.
//!   `${ summarize(@notes) }`, and are awaited before the text is produced
//!
//! Expressions are evaluated with Tera in a one-off render, which has no
//! access to files or the network. Literal text outside `${ }` is never
//! interpreted, so `{{ braces }}` in snippet content stay as they are.
//!
//! # Resolution
//!
//! [`resolve_snippets_with_templates`] refuses to evaluate anything while a
//! cycle exists, then resolves each snippet in dependency order against the
//! values resolved before it and finally evaluates the caller's text.

mod error;
pub mod evaluator;
pub mod resolve;

pub use error::TemplateError;
pub use evaluator::{AsyncFunction, TemplateEvaluator};
pub use resolve::{resolve, resolve_snippets_with_templates};
