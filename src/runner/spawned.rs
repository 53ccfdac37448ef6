use std::process::{ExitStatus, Stdio};

use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};

use super::command::CommandBuilder;
use super::error::RunError;
use super::options::RunOptions;
use crate::prelude::*;

/// A running child with its three pipes.
///
/// Each pipe end is handed out at most once; the child-facing ends are
/// closed in this process as part of the spawn.
#[derive(Debug)]
pub(crate) struct SpawnedCommand {
    pub(crate) pid: u32,
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
    cancelled: bool,
    exit_status: Option<ExitStatus>,
}

impl SpawnedCommand {
    pub(crate) fn spawn(command: &CommandBuilder, options: &RunOptions) -> Result<Self, RunError> {
        let spawn_error = |source| RunError::Spawn {
            program: command.program().to_string_lossy().into_owned(),
            source,
        };

        let mut cmd = Command::new(command.program());
        cmd.args(command.get_args())
            .envs(&options.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &options.current_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(spawn_error)?;
        let pid = child
            .id()
            .ok_or_else(|| spawn_error(std::io::Error::other("child exited before reporting a pid")))?;

        Ok(Self {
            pid,
            stdin: child.stdin.take(),
            stdout: child.stdout.take(),
            stderr: child.stderr.take(),
            child,
            cancelled: false,
            exit_status: None,
        })
    }

    pub(crate) fn take_stdin(&mut self) -> Option<ChildStdin> {
        self.stdin.take()
    }

    pub(crate) fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.stdout.take()
    }

    pub(crate) fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.stderr.take()
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Returns `false` if the command was already being cancelled.
    pub(crate) fn mark_cancelled(&mut self) -> bool {
        !std::mem::replace(&mut self.cancelled, true)
    }

    /// Reap the child. Safe to drop midway and call again.
    pub(crate) async fn wait(&mut self) -> Result<ExitStatus, RunError> {
        if let Some(status) = self.exit_status {
            return Ok(status);
        }
        let status = self
            .child
            .wait()
            .await
            .map_err(|source| RunError::Wait {
                pid: self.pid,
                source,
            })?;
        debug!("pid {} exited with {status}", self.pid);
        self.exit_status = Some(status);
        Ok(status)
    }
}
