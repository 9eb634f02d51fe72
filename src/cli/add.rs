//! Add a snippet to the store.
//!
//! A snippet is either literal (`--content`) or generated from a prompt
//! (`--prompt`, optionally `--model`). Adding a generated snippet generates
//! its content right away unless `--no-wait` is given.
//!
//! # Examples
//!
//! ```bash
//! snipweave add greeting --content "Hello"
//! snipweave add intro --prompt "Write a one-line intro that opens with @greeting"
//! snipweave add intro --prompt "..." --model openai/gpt-4o-mini
//! ```

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::common::{CommandContext, finish_batch, warn_missing_references};
use crate::core::Snippet;

/// Command to add a literal or generated snippet.
#[derive(Args, Debug)]
pub struct AddCommand {
    /// Snippet name (letters, digits and '_')
    name: String,

    /// Literal content of the snippet
    #[arg(long, conflicts_with = "prompt", required_unless_present = "prompt")]
    content: Option<String>,

    /// Prompt to generate the snippet content from
    #[arg(long)]
    prompt: Option<String>,

    /// Model used for generation (defaults to the configured `default_model`)
    #[arg(long, requires = "prompt", conflicts_with = "content")]
    model: Option<String>,

    /// Return without waiting for generation to finish
    #[arg(long)]
    no_wait: bool,
}

impl AddCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let orchestrator = ctx.orchestrator()?;
        let name = self.name.trim_start_matches('@').to_string();

        let snippet = match self.prompt {
            Some(prompt) => {
                let model = self.model.or_else(|| ctx.config.default_model.clone());
                Snippet::generated(name, prompt, model)
            }
            None => Snippet::literal(name, self.content.unwrap_or_default()),
        };
        let kind = if snippet.is_generated {
            "generated"
        } else {
            "literal"
        };

        let outcome = orchestrator.create_snippet(snippet).await?;
        println!("{} Added {kind} snippet '@{}'", "✓".green(), outcome.snippet.name);
        warn_missing_references(&outcome.snippet.name, &outcome.missing_references);

        finish_batch(outcome.batch, self.no_wait).await?;
        Ok(())
    }
}
