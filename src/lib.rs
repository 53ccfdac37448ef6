//! Run external commands, stream their output as it arrives, and tear down
//! everything they spawned when asked to stop.

pub mod cli;
pub mod config;
pub mod logger;
mod prelude;
pub mod runner;

pub use runner::{
    CapturedOutput, CommandBuilder, EscalationPolicy, Granularity, KillScope, RunError,
    RunOptions, RunStatus, StreamKind, run_command, run_command_with_sink,
};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
