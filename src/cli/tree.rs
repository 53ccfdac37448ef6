use std::fmt::Write;

use clap::Args;
use process_tree::{ProcessTree, SourceKind};

use crate::config::StreamExecConfig;
use crate::prelude::*;

#[derive(Args, Debug)]
pub struct TreeArgs {
    /// Only show this process and its descendants, in the order they would be killed
    #[arg(long)]
    pub pid: Option<u32>,

    /// How the process list is obtained
    #[arg(long, value_name = "sysinfo|ps")]
    pub source: Option<SourceKind>,
}

pub async fn run(args: TreeArgs, config: &StreamExecConfig) -> Result<()> {
    let source = args.source.unwrap_or(config.snapshot_source);
    debug!("Building process tree from {source}");
    let tree = tokio::task::spawn_blocking(move || ProcessTree::build_with(&source))
        .await
        .context("Process tree snapshot task failed")??;

    print!("{}", render(&tree, args.pid)?);
    Ok(())
}

fn render(tree: &ProcessTree, pid: Option<u32>) -> Result<String> {
    let Some(pid) = pid else {
        return Ok(tree.to_string());
    };

    let node = tree
        .find(pid)
        .ok_or_else(|| anyhow!("No process with pid {pid} in the process tree"))?;
    let mut rendered = String::new();
    for member in node.traverse() {
        writeln!(rendered, "{} {}", member.pid, member.command)?;
    }
    Ok(rendered)
}
