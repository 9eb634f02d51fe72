//! List models offered by the generation service.

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::common::CommandContext;
use crate::llm::ModelInfo;

/// Command to list available models and their prices.
#[derive(Args, Debug)]
pub struct ModelsCommand {
    /// Only show models whose id or name contains this text
    #[arg(long)]
    filter: Option<String>,
}

impl ModelsCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let client = ctx.client()?;
        let credential = ctx.config.effective_api_key();
        let models = client.list_models(credential.as_deref()).await?;

        let needle = self.filter.map(|f| f.to_lowercase());
        let shown: Vec<&ModelInfo> = models
            .iter()
            .filter(|model| match &needle {
                Some(needle) => {
                    model.id.to_lowercase().contains(needle)
                        || model.name.to_lowercase().contains(needle)
                }
                None => true,
            })
            .collect();

        for model in &shown {
            println!(
                "{}  {}  {}",
                model.id.bold(),
                model.name,
                format_prices(model).dimmed()
            );
        }
        println!("\n{} model(s)", shown.len());
        Ok(())
    }
}

fn format_prices(model: &ModelInfo) -> String {
    let price = |value: Option<f64>| match value {
        Some(value) => format!("${value:.2}"),
        None => "?".to_string(),
    };
    format!(
        "{} in / {} out per 1M tokens",
        price(model.prompt_cost_per_million),
        price(model.completion_cost_per_million)
    )
}
