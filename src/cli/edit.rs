//! Change, rename or convert an existing snippet.
//!
//! `--content` turns the snippet into a literal one and `--prompt` into a
//! generated one. Every generated snippet depending on the edited one is
//! regenerated afterwards, including those that referenced the old name of a
//! renamed snippet.

use anyhow::{Result, bail};
use clap::Args;
use colored::Colorize;

use super::common::{CommandContext, find_snippet, finish_batch, warn_missing_references};

/// Command to edit a snippet in place.
#[derive(Args, Debug)]
pub struct EditCommand {
    /// Name of the snippet to edit
    name: String,

    /// New name for the snippet
    #[arg(long)]
    rename: Option<String>,

    /// Replace the content and make the snippet literal
    #[arg(long, conflicts_with = "prompt")]
    content: Option<String>,

    /// Replace the prompt and make the snippet generated
    #[arg(long)]
    prompt: Option<String>,

    /// Model used for generation
    #[arg(long, conflicts_with = "content")]
    model: Option<String>,

    /// Return without waiting for regeneration to finish
    #[arg(long)]
    no_wait: bool,
}

impl EditCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        if self.rename.is_none()
            && self.content.is_none()
            && self.prompt.is_none()
            && self.model.is_none()
        {
            bail!("Nothing to change: pass --rename, --content, --prompt or --model");
        }

        let orchestrator = ctx.orchestrator()?;
        let snippets = ctx.load_snippets().await?;
        let mut snippet = find_snippet(&snippets, &self.name)?.clone();
        let previous_name = snippet.name.clone();

        if let Some(new_name) = self.rename {
            snippet.name = new_name.trim_start_matches('@').to_string();
        }

        if let Some(content) = self.content {
            snippet.content = content;
            snippet.is_generated = false;
            snippet.prompt = None;
            snippet.model = None;
        }

        if let Some(prompt) = self.prompt {
            if !snippet.is_generated {
                snippet.is_generated = true;
                snippet.content.clear();
            }
            snippet.prompt = Some(prompt);
            if snippet.model.is_none() {
                snippet.model.clone_from(&ctx.config.default_model);
            }
        }

        if let Some(model) = self.model {
            if !snippet.is_generated {
                bail!("'@{previous_name}' is a literal snippet; pass --prompt to make it generated");
            }
            snippet.model = Some(model);
        }

        let outcome = orchestrator.update_snippet(snippet).await?;
        if outcome.snippet.name == previous_name {
            println!("{} Updated '@{previous_name}'", "✓".green());
        } else {
            println!(
                "{} Updated '@{previous_name}' (now '@{}')",
                "✓".green(),
                outcome.snippet.name
            );
        }
        warn_missing_references(&outcome.snippet.name, &outcome.missing_references);

        finish_batch(outcome.batch, self.no_wait).await?;
        Ok(())
    }
}
