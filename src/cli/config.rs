//! Manage the global snipweave configuration.
//!
//! The configuration file (`~/.snipweave/config.toml` unless `--config` or
//! `SNIPWEAVE_CONFIG` says otherwise) holds the generation service credential,
//! the default model and where snippets are stored.
//!
//! # Examples
//!
//! ```bash
//! snipweave config              # same as `config show`
//! snipweave config set-key sk-or-...
//! snipweave config set-model openai/gpt-4o-mini
//! snipweave config path
//! ```
//!
//! # Configuration File Structure
//!
//! ```toml
//! api_key = "sk-or-..."
//! default_model = "openai/gpt-4o-mini"
//! store_path = "~/notes/snippets.json"
//! max_parallel_generations = 4
//! ```
//!
//! The file may hold a credential and is written with owner-only permissions
//! on Unix. `OPENROUTER_API_KEY` takes precedence over `api_key`.

use anyhow::Result;
use clap::{Args, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};

use super::common::{CommandContext, finish_batch};
use crate::config::GlobalConfig;
use crate::constants::API_KEY_ENV_VAR;

/// Command to manage global configuration settings.
#[derive(Args, Debug)]
pub struct ConfigCommand {
    #[command(subcommand)]
    command: Option<ConfigSubcommands>,
}

#[derive(Subcommand, Debug)]
enum ConfigSubcommands {
    /// Display the current configuration with the credential masked.
    ///
    /// This is the default when no subcommand is given.
    Show,

    /// Store the generation service credential.
    SetKey {
        /// The API key; an empty string removes the stored key
        key: String,
    },

    /// Set the model used for new generated snippets.
    SetModel {
        /// Model id, e.g. `openai/gpt-4o-mini`
        model: String,
    },

    /// Display the path to the configuration file.
    Path,
}

impl ConfigCommand {
    /// Execute against the config file at `config_path`, or the default location.
    ///
    /// `store_path` is only read by `set-key`, which retries snippets that
    /// failed for lack of a credential.
    pub async fn execute(
        self,
        config_path: Option<PathBuf>,
        store_path: Option<PathBuf>,
    ) -> Result<()> {
        let path = match config_path {
            Some(path) => path,
            None => GlobalConfig::default_path()?,
        };

        match self.command {
            Some(ConfigSubcommands::Show) | None => Self::show(&path).await,
            Some(ConfigSubcommands::SetKey {
                key,
            }) => Self::set_key(&path, key, store_path).await,
            Some(ConfigSubcommands::SetModel {
                model,
            }) => Self::set_model(&path, model).await,
            Some(ConfigSubcommands::Path) => {
                println!("{}", path.display());
                Ok(())
            }
        }
    }

    async fn show(path: &Path) -> Result<()> {
        let config = GlobalConfig::load_with_optional(Some(path.to_path_buf())).await?;

        println!("{} {}", "Config file:".bold(), path.display());
        if !path.exists() {
            println!("  (not created yet, showing defaults)");
        }

        let env_key = std::env::var(API_KEY_ENV_VAR).is_ok_and(|key| !key.trim().is_empty());
        let key = match (env_key, config.masked_api_key()) {
            (true, _) => format!("set via {API_KEY_ENV_VAR}"),
            (false, Some(masked)) => masked,
            (false, None) => "not set".yellow().to_string(),
        };
        println!("  api_key:        {key}");
        println!("  base_url:       {}", config.base_url);
        println!(
            "  default_model:  {}",
            config.default_model.as_deref().unwrap_or("not set")
        );
        println!("  store:          {}", config.resolved_store_path()?.display());
        println!("  timeout:        {}s", config.request_timeout_secs);
        match config.max_parallel_generations {
            Some(limit) => println!("  max parallel:   {limit}"),
            None => println!("  max parallel:   unlimited"),
        }
        Ok(())
    }

    async fn set_key(path: &Path, key: String, store_path: Option<PathBuf>) -> Result<()> {
        let mut config = GlobalConfig::load_with_optional(Some(path.to_path_buf())).await?;
        let key = key.trim().to_string();
        config.api_key = (!key.is_empty()).then_some(key);
        config.save_to(path).await?;

        let Some(masked) = config.masked_api_key() else {
            println!("{} Removed stored API key", "✓".green());
            return Ok(());
        };
        println!("{} Stored API key {masked}", "✓".green());

        let ctx = CommandContext::load(Some(path.to_path_buf()), store_path).await?;
        let batch = ctx.orchestrator()?.retry_missing_credential().await?;
        if batch.is_some() {
            println!("{} Retrying snippets that were waiting for a credential", "→".cyan());
        }
        finish_batch(batch, false).await?;
        Ok(())
    }

    async fn set_model(path: &Path, model: String) -> Result<()> {
        let mut config = GlobalConfig::load_with_optional(Some(path.to_path_buf())).await?;
        config.default_model = Some(model.clone());
        config.save_to(path).await?;
        println!("{} Default model set to {model}", "✓".green());
        Ok(())
    }
}
