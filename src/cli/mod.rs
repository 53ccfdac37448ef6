mod run;
mod tree;

use crate::{config::StreamExecConfig, logger::init_logger, prelude::*};
use clap::{
    Parser, Subcommand,
    builder::{Styles, styling},
};

fn create_styles() -> Styles {
    styling::Styles::styled()
        .header(styling::AnsiColor::Green.on_default() | styling::Effects::BOLD)
        .usage(styling::AnsiColor::Green.on_default() | styling::Effects::BOLD)
        .literal(styling::AnsiColor::Blue.on_default() | styling::Effects::BOLD)
        .placeholder(styling::AnsiColor::Cyan.on_default())
}

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Run a command, stream its output, and tear down its whole process tree on cancellation",
    styles = create_styles()
)]
pub struct Cli {
    /// The configuration name to use
    /// If provided, the configuration will be loaded from ~/.config/streamexec/{config-name}.yaml
    /// Otherwise, loads from ~/.config/streamexec/config.yaml
    #[arg(long, env = "STREAMEXEC_CONFIG_NAME", global = true)]
    pub config_name: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a command, forwarding its stdout and stderr as they are produced
    #[command(alias = "r")]
    Run(Box<run::RunArgs>),
    /// Print the process tree, or the subtree of a pid in kill order
    Tree(tree::TreeArgs),
}

/// Entry point of the binary, returns the exit code to use.
pub async fn run() -> Result<i32> {
    let cli = Cli::parse();
    init_logger()?;
    let config = StreamExecConfig::load(cli.config_name.as_deref())?;

    match cli.command {
        Commands::Run(args) => run::run(*args, &config).await,
        Commands::Tree(args) => {
            tree::run(args, &config).await?;
            Ok(0)
        }
    }
}
