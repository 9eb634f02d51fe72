//! Resolve text against the stored snippets and print the result.
//!
//! ```bash
//! snipweave resolve 'Dear @customer, ${ greeting | upper }'
//! ```

use anyhow::Result;
use clap::Args;

use super::common::CommandContext;
use crate::templating::resolve_snippets_with_templates;

/// Command to resolve text containing snippet references.
#[derive(Args, Debug)]
pub struct ResolveCommand {
    /// Text with `@name` and `${ expression }` references
    text: String,
}

impl ResolveCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let snippets = ctx.load_snippets().await?;
        let resolved = resolve_snippets_with_templates(&self.text, &snippets).await?;
        println!("{resolved}");
        Ok(())
    }
}
