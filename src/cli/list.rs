//! List stored snippets in dependency order.
//!
//! Snippets appear after everything they reference. Snippets on a cycle are
//! listed last in name order and flagged, since they can never be resolved.
//!
//! # Examples
//!
//! ```bash
//! snipweave list
//! snipweave list --details
//! snipweave list --format json
//! ```

use anyhow::Result;
use clap::{Args, ValueEnum};
use colored::Colorize;
use std::collections::BTreeMap;

use super::common::CommandContext;
use crate::core::Snippet;
use crate::graph::{snippet_display_order, topological_sort_for_execution};
use crate::references::find_missing_references;

const PREVIEW_CHARS: usize = 60;

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
enum OutputFormat {
    #[default]
    Table,
    Json,
}

/// Command to list snippets.
#[derive(Args, Debug)]
pub struct ListCommand {
    /// Output format
    #[arg(long, value_enum, default_value_t)]
    format: OutputFormat,

    /// Show a preview of content and prompts
    #[arg(long)]
    details: bool,
}

impl ListCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let snippets = ctx.load_snippets().await?;
        let ordered = snippet_display_order(&snippets);

        if let OutputFormat::Json = self.format {
            println!("{}", serde_json::to_string_pretty(&ordered)?);
            return Ok(());
        }

        if ordered.is_empty() {
            println!("No snippets stored in {}", ctx.store_path.display());
            return Ok(());
        }

        let cyclic = topological_sort_for_execution(&snippets).cyclic;
        let mut missing: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for reference in find_missing_references(&snippets) {
            if let Some(source) = reference.source_snippet {
                missing.entry(source).or_default().push(reference.referenced_name);
            }
        }

        for snippet in &ordered {
            println!("{}", self.format_line(snippet, cyclic.contains(&snippet.name)));
            if self.details {
                println!("    {}", preview(snippet).dimmed());
            }
            if let Some(error) = &snippet.generation_error {
                println!("    {} {error}", "error:".red());
            }
            for reference in missing.get(&snippet.name).into_iter().flatten() {
                println!("    {} references missing '@{reference}'", "⚠".yellow());
            }
        }

        if !cyclic.is_empty() {
            println!(
                "\n{} {} snippet(s) are on a reference cycle and cannot be resolved",
                "⚠".yellow(),
                cyclic.len()
            );
        }
        Ok(())
    }

    fn format_line(&self, snippet: &Snippet, is_cyclic: bool) -> String {
        let mut line = format!("@{}", snippet.name.bold());
        if snippet.is_generated {
            let model = snippet.model.as_deref().unwrap_or("no model");
            line.push_str(&format!("  {}", format!("generated ({model})").cyan()));
        } else {
            line.push_str(&format!("  {}", "literal".dimmed()));
        }
        if snippet.is_dirty {
            line.push_str(&format!("  {}", "dirty".yellow()));
        }
        if is_cyclic {
            line.push_str(&format!("  {}", "cycle".red()));
        }
        line
    }
}

fn preview(snippet: &Snippet) -> String {
    let text = if snippet.is_generated && snippet.content.is_empty() {
        snippet.dependency_text()
    } else {
        &snippet.content
    };
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() > PREVIEW_CHARS {
        format!("{}…", flat.chars().take(PREVIEW_CHARS).collect::<String>())
    } else {
        flat
    }
}
