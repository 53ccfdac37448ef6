use std::io::{self, Write};
use std::os::unix::process::ExitStatusExt;
use std::path::PathBuf;

use clap::{Args, ValueEnum};
use nix::sys::signal::Signal;

use crate::config::StreamExecConfig;
use crate::prelude::*;
use crate::runner::{
    CommandBuilder, Granularity, KillScope, RunStatus, StreamKind, run_command_with_sink,
};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Deliver output line by line (`line`) or in chunks of at most N bytes
    #[arg(long, value_name = "line|N")]
    pub granularity: Option<Granularity>,

    /// Text written to the command's stdin
    #[arg(long, conflicts_with = "input_file")]
    pub input: Option<String>,

    /// File whose content is written to the command's stdin
    #[arg(long)]
    pub input_file: Option<PathBuf>,

    /// Extra environment variable for the command, can be repeated
    #[arg(long = "env", value_name = "KEY=VALUE", value_parser = parse_env_pair)]
    pub env: Vec<(String, String)>,

    /// The directory where the command will be executed.
    #[arg(long)]
    pub cwd: Option<PathBuf>,

    /// Which processes of the command's tree are stopped on cancellation
    #[arg(long, value_enum)]
    pub kill_scope: Option<KillScope>,

    /// Signal that cancels the command when sent to streamexec
    #[arg(long, value_enum, default_value_t = CancelSignal::Usr1)]
    pub cancel_signal: CancelSignal,

    /// The command to run
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
    pub command: Vec<String>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq)]
pub enum CancelSignal {
    Usr1,
    Usr2,
    Int,
    Term,
    Hup,
}

impl From<CancelSignal> for Signal {
    fn from(signal: CancelSignal) -> Self {
        match signal {
            CancelSignal::Usr1 => Signal::SIGUSR1,
            CancelSignal::Usr2 => Signal::SIGUSR2,
            CancelSignal::Int => Signal::SIGINT,
            CancelSignal::Term => Signal::SIGTERM,
            CancelSignal::Hup => Signal::SIGHUP,
        }
    }
}

fn parse_env_pair(s: &str) -> Result<(String, String)> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| anyhow!("invalid environment variable `{s}`, expected KEY=VALUE"))?;
    ensure!(!key.is_empty(), "environment variable name cannot be empty");
    Ok((key.to_string(), value.to_string()))
}

/// Shell convention: the exit code, or 128 + signal number when killed.
///
/// A cancelled run whose process still exited cleanly reports an interrupt.
fn exit_code(outcome: RunStatus) -> i32 {
    let status = outcome.status;
    if outcome.cancelled && status.success() {
        return 128 + Signal::SIGINT as i32;
    }
    status
        .code()
        .or_else(|| status.signal().map(|signal| 128 + signal))
        .unwrap_or(1)
}

pub async fn run(args: RunArgs, config: &StreamExecConfig) -> Result<i32> {
    let command =
        CommandBuilder::from_argv(&args.command).ok_or_else(|| anyhow!("No command provided"))?;

    let mut options = config.run_options();
    if let Some(granularity) = args.granularity {
        options.granularity = granularity;
    }
    if let Some(kill_scope) = args.kill_scope {
        options.kill_scope = kill_scope;
    }
    options.input = match (args.input, &args.input_file) {
        (Some(input), _) => Some(input.into_bytes()),
        (None, Some(path)) => Some(
            std::fs::read(path)
                .with_context(|| format!("Failed to read input file {}", path.display()))?,
        ),
        (None, None) => None,
    };
    options.env.extend(args.env);
    options.current_dir = args.cwd;
    options.cancel_signal = Some(args.cancel_signal.into());

    debug!(
        "Running `{}` with {} granularity",
        command.as_command_line(),
        options.granularity
    );

    let mut write_error: Option<io::Error> = None;
    let outcome = run_command_with_sink(&command, &options, |chunk, kind| {
        let result = match kind {
            StreamKind::Out => forward(&mut io::stdout().lock(), chunk),
            StreamKind::Err => forward(&mut io::stderr().lock(), chunk),
        };
        if let Err(err) = result {
            write_error.get_or_insert(err);
        }
    })
    .await
    .with_context(|| format!("Failed to run `{}`", command.as_command_line()))?;

    if let Some(err) = write_error {
        warn!("Some output of the command could not be forwarded: {err}");
    }

    debug!(
        "Command exited with {} (cancelled: {})",
        outcome.status, outcome.cancelled
    );
    Ok(exit_code(outcome))
}

fn forward(writer: &mut impl Write, chunk: &[u8]) -> io::Result<()> {
    writer.write_all(chunk)?;
    writer.flush()
}
