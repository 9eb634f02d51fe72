//! Check text, or the whole store, for reference cycles and missing snippets.
//!
//! Cycles are errors. Missing references are only reported as warnings,
//! since a snippet may be added later.
//!
//! # Examples
//!
//! ```bash
//! snipweave validate '@intro and @outro'
//! snipweave validate        # every stored snippet
//! ```

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::common::CommandContext;
use crate::graph::{topological_sort_for_execution, validate_from_snippet, validate_snippet_dependencies};
use crate::references::{find_missing_references, list_non_existent_references};

/// Command to validate snippet references.
#[derive(Args, Debug)]
pub struct ValidateCommand {
    /// Text to validate; validates every stored snippet when omitted
    text: Option<String>,
}

impl ValidateCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let snippets = ctx.load_snippets().await?;

        match self.text {
            Some(text) => {
                for name in list_non_existent_references(&text, &snippets) {
                    println!("{} '@{name}' does not exist", "⚠".yellow());
                }
                validate_snippet_dependencies(&text, &snippets)?;
            }
            None => {
                for missing in find_missing_references(&snippets) {
                    let source = missing.source_snippet.as_deref().unwrap_or("?");
                    println!(
                        "{} '@{source}' references '@{}', which does not exist",
                        "⚠".yellow(),
                        missing.referenced_name
                    );
                }
                if let Some(seed) = topological_sort_for_execution(&snippets).cyclic.first() {
                    validate_from_snippet(seed, &snippets)?;
                }
            }
        }

        println!("{} No reference cycles found", "✓".green());
        Ok(())
    }
}
