//! Sandboxed evaluation of interpolated snippet text.
//!
//! A template is split into literal segments and `${ expression }` segments
//! after short-form references have been normalized to the braced form.
//! Literal text is copied through untouched and is never handed to the
//! expression engine.
//!
//! Expressions are evaluated in three steps:
//!
//! 1. A bare identifier (`${name}`) is looked up in the scope directly, which
//!    also covers names the expression language could not parse, such as
//!    names starting with a digit.
//! 2. Calls to registered [`AsyncFunction`]s anywhere in the expression are
//!    awaited first. Their arguments are expressions themselves and may nest
//!    further async calls. Each result is bound to a hidden slot and the call
//!    is replaced by the slot name.
//! 3. The rewritten expression is rendered by Tera as `{{ expression }}` with
//!    the scope values bound by name. Tera has no filesystem or network access
//!    from a one-off render, which keeps user text sandboxed.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::collections::HashMap;
//! use snipweave::templating::TemplateEvaluator;
//!
//! # async fn example() -> Result<(), snipweave::templating::TemplateError> {
//! let evaluator = TemplateEvaluator::new();
//! let scope = HashMap::from([("name".to_string(), "Ada".to_string())]);
//! let text = evaluator.evaluate(r#"Hello @name${"!" ~ "!"}"#, &scope).await?;
//! assert_eq!(text, "Hello Ada!!");
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use futures::future::BoxFuture;
use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::ops::Range;
use std::sync::{Arc, LazyLock};
use tera::{Context, Tera};

use super::error::TemplateError;
use crate::references::{
    find_closing, find_expression_end, identifier_len, is_identifier, normalize_references,
};

static UNBOUND_VARIABLE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"Variable `([^`]+)` not found").ok());

const ASYNC_SLOT_PREFIX: &str = "__async_";

/// An asynchronous operation callable from inside an expression.
///
/// Arguments arrive already evaluated, in call order.
#[async_trait]
pub trait AsyncFunction: Send + Sync {
    async fn call(&self, args: Vec<String>) -> anyhow::Result<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment<'a> {
    Literal(&'a str),
    Expression(&'a str),
}

struct CallSite<'a> {
    range: Range<usize>,
    name: &'a str,
    arguments: &'a str,
}

/// Evaluates templates against an explicit name-to-value scope.
#[derive(Clone, Default)]
pub struct TemplateEvaluator {
    functions: HashMap<String, Arc<dyn AsyncFunction>>,
}

impl fmt::Debug for TemplateEvaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.functions.keys().collect();
        names.sort();
        f.debug_struct("TemplateEvaluator").field("functions", &names).finish()
    }
}

impl TemplateEvaluator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `function` callable as `name(...)` inside expressions.
    ///
    /// Registering a name twice replaces the earlier function.
    pub fn register_async<F>(&mut self, name: impl Into<String>, function: F) -> &mut Self
    where
        F: AsyncFunction + 'static,
    {
        self.functions.insert(name.into(), Arc::new(function));
        self
    }

    #[must_use]
    pub fn has_function(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Evaluate `template`, awaiting every async call it contains.
    pub async fn evaluate(
        &self,
        template: &str,
        scope: &HashMap<String, String>,
    ) -> Result<String, TemplateError> {
        let normalized = normalize_references(template);
        let segments = parse_segments(&normalized)?;

        let mut output = String::with_capacity(normalized.len());
        for segment in segments {
            match segment {
                Segment::Literal(text) => output.push_str(text),
                Segment::Expression(expression) => {
                    output.push_str(&self.evaluate_expression(expression, scope).await?);
                }
            }
        }
        Ok(output)
    }

    /// Evaluate the body of a single `${ ... }` segment.
    pub fn evaluate_expression<'a>(
        &'a self,
        expression: &'a str,
        scope: &'a HashMap<String, String>,
    ) -> BoxFuture<'a, Result<String, TemplateError>> {
        Box::pin(async move {
            let expression = expression.trim();
            if expression.is_empty() {
                return Err(TemplateError::Syntax {
                    message: "Empty expression '${}'".to_string(),
                });
            }

            if is_identifier(expression) {
                if let Some(value) = scope.get(expression) {
                    return Ok(value.clone());
                }
                // Numeric literals fall through to the expression engine.
                if !expression.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(TemplateError::NotBound {
                        name: expression.to_string(),
                    });
                }
            }

            let (rewritten, slots) = self.await_async_calls(expression, scope).await?;
            if let Some(value) = slots.get(rewritten.trim()) {
                return Ok(value.clone());
            }
            render_expression(&rewritten, scope, &slots)
        })
    }

    async fn await_async_calls(
        &self,
        expression: &str,
        scope: &HashMap<String, String>,
    ) -> Result<(String, HashMap<String, String>), TemplateError> {
        let calls = self.find_calls(expression)?;
        let mut rewritten = String::with_capacity(expression.len());
        let mut slots = HashMap::with_capacity(calls.len());
        let mut last = 0;

        for (index, call) in calls.iter().enumerate() {
            let Some(function) = self.functions.get(call.name) else {
                continue;
            };

            let mut args = Vec::new();
            for argument in split_arguments(call.arguments) {
                args.push(self.evaluate_expression(argument, scope).await?);
            }

            tracing::debug!("Awaiting async template function '{}'", call.name);
            let value = function.call(args).await.map_err(|error| TemplateError::Expression {
                message: format!("{}(): {error:#}", call.name),
            })?;

            let slot = format!("{ASYNC_SLOT_PREFIX}{index}");
            rewritten.push_str(&expression[last..call.range.start]);
            rewritten.push_str(&slot);
            slots.insert(slot, value);
            last = call.range.end;
        }

        rewritten.push_str(&expression[last..]);
        Ok((rewritten, slots))
    }

    /// Locate top-level calls to registered async functions.
    ///
    /// Calls nested inside arguments are left for the recursive evaluation of
    /// those arguments. Filter and attribute positions (`| name(...)`,
    /// `.name(...)`) are not treated as calls.
    fn find_calls<'e>(&self, expression: &'e str) -> Result<Vec<CallSite<'e>>, TemplateError> {
        let mut calls = Vec::new();
        let mut quote: Option<char> = None;
        let mut i = 0;

        while let Some(c) = expression[i..].chars().next() {
            if let Some(q) = quote {
                if c == q {
                    quote = None;
                }
                i += c.len_utf8();
                continue;
            }
            if matches!(c, '"' | '\'' | '`') {
                quote = Some(c);
                i += 1;
                continue;
            }

            let rest = &expression[i..];
            let len = identifier_len(rest);
            if len == 0 {
                i += c.len_utf8();
                continue;
            }

            let name = &rest[..len];
            let after = rest[len..].trim_start();
            let is_call = after.starts_with('(')
                && self.functions.contains_key(name)
                && !follows_accessor(&expression[..i]);
            if !is_call {
                i += len;
                continue;
            }

            let open = i + (rest.len() - after.len());
            let close = find_closing(&expression[open + 1..], '(', ')')
                .map(|offset| open + 1 + offset)
                .ok_or_else(|| TemplateError::Syntax {
                    message: format!("Unclosed call to '{name}' in '${{{expression}}}'"),
                })?;

            calls.push(CallSite {
                range: i..close + 1,
                name,
                arguments: &expression[open + 1..close],
            });
            i = close + 1;
        }

        Ok(calls)
    }
}

/// Split a normalized template into literal and expression segments.
fn parse_segments(template: &str) -> Result<Vec<Segment<'_>>, TemplateError> {
    let mut segments = Vec::new();
    let mut rest = template;
    let mut offset = 0;

    while let Some(start) = rest.find("${") {
        if start > 0 {
            segments.push(Segment::Literal(&rest[..start]));
        }
        let body = &rest[start + 2..];
        let end = find_expression_end(body).ok_or_else(|| TemplateError::Syntax {
            message: format!("Unterminated '${{' at byte {}", offset + start),
        })?;
        segments.push(Segment::Expression(&body[..end]));

        let consumed = start + 2 + end + 1;
        offset += consumed;
        rest = &rest[consumed..];
    }

    if !rest.is_empty() {
        segments.push(Segment::Literal(rest));
    }
    Ok(segments)
}

fn follows_accessor(before: &str) -> bool {
    matches!(before.trim_end().chars().last(), Some('.' | '|'))
}

/// Split call arguments on top-level commas.
fn split_arguments(arguments: &str) -> Vec<&str> {
    if arguments.trim().is_empty() {
        return Vec::new();
    }

    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, c) in arguments.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '"' | '\'' | '`' => quote = Some(c),
                '(' | '[' | '{' => depth += 1,
                ')' | ']' | '}' => depth = depth.saturating_sub(1),
                ',' if depth == 0 => {
                    parts.push(arguments[start..i].trim());
                    start = i + 1;
                }
                _ => {}
            },
        }
    }
    parts.push(arguments[start..].trim());
    parts
}

fn render_expression(
    expression: &str,
    scope: &HashMap<String, String>,
    slots: &HashMap<String, String>,
) -> Result<String, TemplateError> {
    let mut context = Context::new();
    for (name, value) in scope.iter().chain(slots.iter()) {
        context.insert(name.as_str(), value);
    }

    Tera::one_off(&format!("{{{{ {expression} }}}}"), &context, false)
        .map_err(|error| map_tera_error(&error))
}

/// Map a Tera failure to an evaluator error, separating unbound names.
fn map_tera_error(error: &tera::Error) -> TemplateError {
    use std::error::Error;

    let mut messages = vec![error.to_string()];
    let mut current: Option<&dyn Error> = error.source();
    while let Some(err) = current {
        messages.push(err.to_string());
        current = err.source();
    }

    for message in &messages {
        if let Some(caps) = UNBOUND_VARIABLE.as_ref().and_then(|re| re.captures(message)) {
            let variable = &caps[1];
            let name = variable.split(['.', '[']).next().unwrap_or(variable);
            return TemplateError::NotBound {
                name: name.to_string(),
            };
        }
    }

    let cleaned: Vec<String> = messages
        .iter()
        .map(|message| {
            message
                .replace(" while rendering '__tera_one_off'", "")
                .replace("Failed to render '__tera_one_off'", "")
                .replace("Failed to parse '__tera_one_off'", "Invalid expression")
                .replace("'__tera_one_off'", "expression")
                .trim()
                .to_string()
        })
        .filter(|message| !message.is_empty())
        .collect();

    TemplateError::Expression {
        message: if cleaned.is_empty() {
            "Expression evaluation failed".to_string()
        } else {
            cleaned.join(": ")
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Shout;

    #[async_trait]
    impl AsyncFunction for Shout {
        async fn call(&self, args: Vec<String>) -> anyhow::Result<String> {
            tokio::task::yield_now().await;
            Ok(args.join(" ").to_uppercase())
        }
    }

    struct Broken;

    #[async_trait]
    impl AsyncFunction for Broken {
        async fn call(&self, _args: Vec<String>) -> anyhow::Result<String> {
            anyhow::bail!("upstream unavailable")
        }
    }

    fn scope(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect()
    }

    fn evaluator() -> TemplateEvaluator {
        let mut evaluator = TemplateEvaluator::new();
        evaluator.register_async("shout", Shout).register_async("broken", Broken);
        evaluator
    }

    #[tokio::test]
    async fn test_literal_text_passes_through() {
        let ev = TemplateEvaluator::new();
        let empty = HashMap::new();
        assert_eq!(ev.evaluate("plain text {{ not tera }}", &empty).await.unwrap(), "plain text {{ not tera }}");
        assert_eq!(ev.evaluate("", &empty).await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_both_reference_forms() {
        let ev = TemplateEvaluator::new();
        let s = scope(&[("a", "x"), ("2fast", "y")]);
        assert_eq!(ev.evaluate("@a and ${ a } and @2fast", &s).await.unwrap(), "x and x and y");
    }

    #[tokio::test]
    async fn test_expressions() {
        let ev = TemplateEvaluator::new();
        let s = scope(&[("a", "x")]);
        assert_eq!(ev.evaluate(r#"${a ~ "!"}"#, &s).await.unwrap(), "x!");
        assert_eq!(ev.evaluate(r#"${@a ~ "?"}"#, &s).await.unwrap(), "x?");
        assert_eq!(ev.evaluate("${1 + 2}", &s).await.unwrap(), "3");
        assert_eq!(ev.evaluate("${3}", &s).await.unwrap(), "3");
        assert_eq!(ev.evaluate(r#"${"}" ~ a}"#, &s).await.unwrap(), "}x");
        assert_eq!(ev.evaluate("${a | upper}", &s).await.unwrap(), "X");
    }

    #[tokio::test]
    async fn test_unbound_names_are_distinguishable() {
        let ev = TemplateEvaluator::new();
        let s = scope(&[("a", "x")]);
        assert_eq!(
            ev.evaluate("${missing}", &s).await,
            Err(TemplateError::NotBound {
                name: "missing".to_string()
            })
        );
        assert_eq!(
            ev.evaluate(r#"${missing ~ a}"#, &s).await,
            Err(TemplateError::NotBound {
                name: "missing".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_other_failures_are_expression_errors() {
        let ev = TemplateEvaluator::new();
        let s = scope(&[("a", "x")]);
        let err = ev.evaluate("${a | no_such_filter}", &s).await.unwrap_err();
        assert!(matches!(err, TemplateError::Expression { .. }));
        assert!(!err.to_string().contains("__tera_one_off"));
    }

    #[tokio::test]
    async fn test_unterminated_expression_is_syntax_error() {
        let ev = TemplateEvaluator::new();
        let err = ev.evaluate("hello ${a", &scope(&[("a", "x")])).await.unwrap_err();
        assert!(matches!(err, TemplateError::Syntax { .. }));
        assert!(ev.evaluate("${}", &HashMap::new()).await.is_err());
    }

    #[tokio::test]
    async fn test_async_functions_are_awaited() {
        let ev = evaluator();
        let s = scope(&[("a", "quiet")]);
        assert_eq!(ev.evaluate("${shout(@a)}", &s).await.unwrap(), "QUIET");
        assert_eq!(ev.evaluate(r#"${shout("hi", a)}"#, &s).await.unwrap(), "HI QUIET");
        assert_eq!(ev.evaluate(r#"${shout(a) ~ "?"}"#, &s).await.unwrap(), "QUIET?");
        assert_eq!(ev.evaluate(r#"${shout(a ~ shout("x"))}"#, &s).await.unwrap(), "QUIETX");
    }

    #[tokio::test]
    async fn test_async_failures_and_unbound_arguments() {
        let ev = evaluator();
        let s = scope(&[("a", "x")]);

        let err = ev.evaluate("${broken(a)}", &s).await.unwrap_err();
        assert_eq!(err.to_string(), "broken(): upstream unavailable");

        let err = ev.evaluate("${shout(nobody)}", &s).await.unwrap_err();
        assert_eq!(
            err,
            TemplateError::NotBound {
                name: "nobody".to_string()
            }
        );
    }

    #[test]
    fn test_parse_segments() {
        let segments = parse_segments("a ${x} b ${ {y} } c").unwrap();
        assert_eq!(
            segments,
            vec![
                Segment::Literal("a "),
                Segment::Expression("x"),
                Segment::Literal(" b "),
                Segment::Expression(" {y} "),
                Segment::Literal(" c"),
            ]
        );
    }

    #[test]
    fn test_split_arguments() {
        assert!(split_arguments("  ").is_empty());
        assert_eq!(split_arguments(r#"a, "b,c", f(1, 2)"#), vec!["a", r#""b,c""#, "f(1, 2)"]);
    }
}
