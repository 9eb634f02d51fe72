//! Command-line interface for snipweave.
//!
//! Each command lives in its own module with its argument struct and an
//! `execute` method. Commands that touch snippets receive a
//! [`common::CommandContext`] holding the loaded global configuration and the
//! store location.
//!
//! # Available Commands
//!
//! ## Snippets
//! - `add` - Add a literal or generated snippet
//! - `edit` - Change, rename or convert a snippet
//! - `remove` - Remove a snippet
//! - `list` - List snippets in dependency order
//!
//! ## References
//! - `resolve` - Resolve text against the stored snippets
//! - `validate` - Check for reference cycles and missing snippets
//! - `graph` - Show the reference graph as a tree or Graphviz DOT
//!
//! ## Generation
//! - `waves` - Show the regeneration wave plan
//! - `regenerate` - Regenerate named or dirty snippets
//! - `models` - List models offered by the generation service
//!
//! ## System
//! - `config` - Manage global configuration
//!
//! # Example
//!
//! ```bash
//! snipweave add customer --content "Ada"
//! snipweave add letter --prompt "Write a two-line thank-you note to @customer"
//! snipweave resolve '@letter'
//! snipweave --store ./team.json list
//! ```

mod add;
pub mod common;
mod config;
mod edit;
mod graph;
mod list;
mod models;
mod regenerate;
mod remove;
mod resolve;
mod validate;
mod waves;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::constants::CONFIG_PATH_ENV_VAR;
use common::CommandContext;

/// Main CLI structure for snipweave.
#[derive(Parser, Debug)]
#[command(
    name = "snipweave",
    about = "Compose text from snippets that reference and generate each other",
    version,
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging.
    ///
    /// Equivalent to `RUST_LOG=debug`. Mutually exclusive with `--quiet`.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to the global configuration file.
    ///
    /// Defaults to `~/.snipweave/config.toml`.
    #[arg(short, long, global = true, env = CONFIG_PATH_ENV_VAR)]
    config: Option<PathBuf>,

    /// Path to the snippet store, overriding `store_path` from the configuration.
    #[arg(long, global = true)]
    store: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Add a literal or generated snippet.
    Add(add::AddCommand),

    /// Change, rename or convert a snippet.
    Edit(edit::EditCommand),

    /// Remove a snippet.
    Remove(remove::RemoveCommand),

    /// List snippets in dependency order.
    List(list::ListCommand),

    /// Resolve text against the stored snippets.
    Resolve(resolve::ResolveCommand),

    /// Check for reference cycles and missing snippets.
    Validate(validate::ValidateCommand),

    /// Show the regeneration wave plan.
    Waves(waves::WavesCommand),

    /// Show the reference graph.
    Graph(graph::GraphCommand),

    /// Regenerate named snippets, or every dirty one.
    Regenerate(regenerate::RegenerateCommand),

    /// List models offered by the generation service.
    Models(models::ModelsCommand),

    /// Manage global configuration.
    Config(config::ConfigCommand),
}

impl Cli {
    /// The `tracing` filter selected by `--verbose`, `--quiet` or `RUST_LOG`.
    ///
    /// Falls back to `warn` so regular command output stays readable.
    #[must_use]
    pub fn log_filter(&self) -> String {
        if self.verbose {
            "debug".to_string()
        } else if self.quiet {
            "error".to_string()
        } else {
            std::env::var("RUST_LOG")
                .ok()
                .filter(|filter| !filter.trim().is_empty())
                .unwrap_or_else(|| "warn".to_string())
        }
    }

    /// Run the selected command.
    pub async fn execute(self) -> Result<()> {
        let config_path = self.config;
        let store_path = self.store;
        let context = || CommandContext::load(config_path.clone(), store_path.clone());

        match self.command {
            Commands::Add(cmd) => cmd.execute(&context().await?).await,
            Commands::Edit(cmd) => cmd.execute(&context().await?).await,
            Commands::Remove(cmd) => cmd.execute(&context().await?).await,
            Commands::List(cmd) => cmd.execute(&context().await?).await,
            Commands::Resolve(cmd) => cmd.execute(&context().await?).await,
            Commands::Validate(cmd) => cmd.execute(&context().await?).await,
            Commands::Waves(cmd) => cmd.execute(&context().await?).await,
            Commands::Graph(cmd) => cmd.execute(&context().await?).await,
            Commands::Regenerate(cmd) => cmd.execute(&context().await?).await,
            Commands::Models(cmd) => cmd.execute(&context().await?).await,
            Commands::Config(cmd) => cmd.execute(config_path.clone(), store_path.clone()).await,
        }
    }
}
