//! Show the order in which generated snippets would regenerate.
//!
//! Snippets in the same wave share no dependency and regenerate concurrently;
//! each wave starts once the previous one has settled.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::collections::HashSet;

use super::common::CommandContext;
use crate::core::Snippet;
use crate::graph::builder::live_snippets;
use crate::graph::{group_snippets_into_waves, topological_sort_for_execution, validate_from_snippet};

/// Command to print the regeneration wave plan.
#[derive(Args, Debug)]
pub struct WavesCommand {
    /// Plan every generated snippet, not only dirty ones
    #[arg(long)]
    all: bool,
}

impl WavesCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let snippets = ctx.load_snippets().await?;
        let targets: HashSet<&str> = live_snippets(&snippets)
            .into_iter()
            .filter(|s| s.is_generated && (self.all || s.is_dirty))
            .map(|s| s.name.as_str())
            .collect();

        if targets.is_empty() {
            println!("Nothing to regenerate");
            return Ok(());
        }

        let sort = topological_sort_for_execution(&snippets);
        if let Some(seed) = sort.cyclic.iter().find(|name| targets.contains(name.as_str())) {
            validate_from_snippet(seed, &snippets)?;
        }

        let plan: Vec<Snippet> = live_snippets(&snippets)
            .into_iter()
            .filter(|s| !s.is_generated || targets.contains(s.name.as_str()))
            .cloned()
            .collect();

        let waves = group_snippets_into_waves(&plan)
            .into_iter()
            .map(|wave| wave.into_iter().filter(|n| targets.contains(n.as_str())).collect::<Vec<_>>())
            .filter(|wave| !wave.is_empty());
        for (index, wave) in waves.enumerate() {
            let names = wave.iter().map(|n| format!("@{n}")).collect::<Vec<_>>().join(", ");
            println!("{} {names}", format!("Wave {}:", index + 1).bold());
        }
        Ok(())
    }
}
