//! Remove a snippet from the store.
//!
//! Generated snippets that referenced the removed one are regenerated and
//! record a not-found error until the reference is fixed.

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::common::{CommandContext, find_snippet, finish_batch};

/// Command to remove a snippet.
#[derive(Args, Debug)]
pub struct RemoveCommand {
    /// Name of the snippet to remove
    name: String,

    /// Return without waiting for dependents to regenerate
    #[arg(long)]
    no_wait: bool,
}

impl RemoveCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let orchestrator = ctx.orchestrator()?;
        let snippets = ctx.load_snippets().await?;
        let id = find_snippet(&snippets, &self.name)?.id;

        let outcome = orchestrator.delete_snippet(id).await?;
        println!("{} Removed '@{}'", "✓".green(), outcome.snippet.name);

        finish_batch(outcome.batch, self.no_wait).await?;
        Ok(())
    }
}
