//! Print the snippet reference graph.
//!
//! ```bash
//! snipweave graph intro          # what @intro depends on, as a tree
//! snipweave graph                # a tree for every snippet nothing depends on
//! snipweave graph --dot | dot -Tsvg > snippets.svg
//! ```

use anyhow::Result;
use clap::Args;

use super::common::{CommandContext, find_snippet};
use crate::graph::DependencyGraph;
use crate::graph::export::{to_dot, to_tree_string};

/// Command to show dependencies as a tree or as Graphviz DOT.
#[derive(Args, Debug)]
pub struct GraphCommand {
    /// Snippet whose dependencies to show
    name: Option<String>,

    /// Print the whole graph in Graphviz DOT format
    #[arg(long)]
    dot: bool,
}

impl GraphCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let snippets = ctx.load_snippets().await?;

        if self.dot {
            print!("{}", to_dot(&snippets));
            return Ok(());
        }

        let graph = DependencyGraph::build(&snippets);
        let roots: Vec<String> = match &self.name {
            Some(name) => vec![find_snippet(&snippets, name)?.name.clone()],
            None => graph
                .names()
                .iter()
                .filter(|name| graph.dependents(name).next().is_none())
                .cloned()
                .collect(),
        };

        if roots.is_empty() && self.name.is_none() && !graph.is_empty() {
            println!("Every snippet is referenced by another; pick one by name");
        }
        for root in roots {
            print!("{}", to_tree_string(&root, &graph));
        }
        Ok(())
    }
}
