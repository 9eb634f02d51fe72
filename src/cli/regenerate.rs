//! Regenerate generated snippets.
//!
//! Without names, every generated snippet left dirty (by an interrupted run,
//! `--no-wait`, or a failure) is regenerated. With names, those snippets are
//! regenerated even when they are up to date.
//!
//! # Examples
//!
//! ```bash
//! snipweave regenerate
//! snipweave regenerate intro outro
//! ```

use anyhow::{Result, bail};
use clap::Args;
use colored::Colorize;

use super::common::{CommandContext, finish_batch};

/// Command to regenerate named or dirty snippets.
#[derive(Args, Debug)]
pub struct RegenerateCommand {
    /// Snippets to regenerate; all dirty ones when omitted
    names: Vec<String>,
}

impl RegenerateCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let orchestrator = ctx.orchestrator()?;

        let batch = if self.names.is_empty() {
            orchestrator.resume_dirty().await?
        } else {
            let names: Vec<String> =
                self.names.iter().map(|n| n.trim_start_matches('@').to_string()).collect();
            Some(orchestrator.regenerate(&names).await?)
        };

        if batch.is_none() {
            println!("{} Every generated snippet is up to date", "✓".green());
            return Ok(());
        }

        let Some(report) = finish_batch(batch, false).await? else {
            return Ok(());
        };
        if !report.is_success() {
            bail!(
                "{} of {} snippet(s) were not regenerated",
                report.failed.len() + report.skipped.len(),
                report.total()
            );
        }
        Ok(())
    }
}
