//! Common utilities shared by CLI commands

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::GlobalConfig;
use crate::constants::batch_wait_timeout;
use crate::core::error::{ErrorContext, suggest_similar_names};
use crate::core::{Snippet, SnippetError};
use crate::llm::{Credentials, OpenRouterClient};
use crate::regen::{BatchHandle, BatchReport, Orchestrator, RegenerationOptions};
use crate::store::{JsonFileStore, SnippetStore};

/// Configuration and store location shared by every command
#[derive(Debug, Clone)]
pub struct CommandContext {
    /// Loaded global configuration (defaults when the file is missing)
    pub config: GlobalConfig,
    /// Snippet store file, from `--store` or the configuration
    pub store_path: PathBuf,
}

impl CommandContext {
    /// Load the global config and work out where the snippet store lives.
    ///
    /// # Errors
    /// Returns an error if the config file exists but cannot be parsed
    pub async fn load(config_path: Option<PathBuf>, store_path: Option<PathBuf>) -> Result<Self> {
        let config = GlobalConfig::load_with_optional(config_path).await?;
        let store_path = match store_path {
            Some(path) => path,
            None => config.resolved_store_path()?,
        };
        tracing::debug!("Using snippet store at {}", store_path.display());

        Ok(Self {
            config,
            store_path,
        })
    }

    pub fn store(&self) -> Arc<JsonFileStore> {
        Arc::new(JsonFileStore::new(&self.store_path))
    }

    /// All stored snippets.
    pub async fn load_snippets(&self) -> Result<Vec<Snippet>> {
        self.store()
            .load_all()
            .await
            .with_context(|| format!("Failed to load snippets from {}", self.store_path.display()))
    }

    pub fn client(&self) -> Result<OpenRouterClient> {
        OpenRouterClient::new(&self.config.base_url, self.config.request_timeout())
            .context("Failed to create generation service client")
    }

    /// Orchestrator over the JSON store and the configured generation service.
    pub fn orchestrator(&self) -> Result<Orchestrator> {
        let options = RegenerationOptions {
            max_parallel: self.config.max_parallel_generations,
            ..RegenerationOptions::default()
        };
        Ok(Orchestrator::with_options(
            self.store(),
            Arc::new(self.client()?),
            Credentials::new(self.config.effective_api_key()),
            options,
        ))
    }
}

/// Find a snippet by name, suggesting close matches when there is none.
pub fn find_snippet<'a>(snippets: &'a [Snippet], name: &str) -> Result<&'a Snippet> {
    let name = name.strip_prefix('@').unwrap_or(name);
    if let Some(snippet) = snippets.iter().find(|s| s.name == name) {
        return Ok(snippet);
    }

    let error = SnippetError::NotFound {
        name: name.to_string(),
    };
    let similar = suggest_similar_names(name, snippets.iter().map(|s| s.name.as_str()));
    if similar.is_empty() {
        return Err(error.into());
    }
    let names = similar.iter().map(|n| format!("@{n}")).collect::<Vec<_>>().join(", ");
    Err(ErrorContext::new(error).with_suggestion(format!("Did you mean {names}?")).into())
}

pub fn warn_missing_references(name: &str, missing: &[String]) {
    for reference in missing {
        println!("{} '@{name}' references '@{reference}', which does not exist", "⚠".yellow());
    }
}

/// Wait for a scheduled batch and print its outcome.
///
/// With `no_wait` the batch is left to the background and the affected
/// snippets stay dirty for a later `snipweave regenerate`.
pub async fn finish_batch(batch: Option<BatchHandle>, no_wait: bool) -> Result<Option<BatchReport>> {
    let Some(batch) = batch else {
        return Ok(None);
    };
    if no_wait {
        println!(
            "{} Regeneration left pending; run 'snipweave regenerate' to finish it",
            "→".cyan()
        );
        return Ok(None);
    }

    println!("{} Regenerating dependent snippets...", "→".cyan());
    let report = tokio::time::timeout(batch_wait_timeout(), batch.wait())
        .await
        .context("Timed out waiting for regeneration")??;
    print_report(&report);
    Ok(Some(report))
}

pub fn print_report(report: &BatchReport) {
    for name in &report.succeeded {
        println!("  {} @{name}", "✓".green());
    }
    for (name, message) in &report.failed {
        println!("  {} @{name}: {message}", "✗".red());
    }
    for (name, reason) in &report.skipped {
        println!("  {} @{name}: {reason}", "-".yellow());
    }
}
