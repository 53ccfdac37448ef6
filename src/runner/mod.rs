//! Spawning a command and streaming its output.
//!
//! [`run_command_with_sink`] multiplexes stdout and stderr on the calling
//! task and hands chunks to the sink in the order they become readable.
//! Input, if any, is written from a separate task so a child that fills its
//! output pipe before draining stdin cannot deadlock the run.

mod command;
mod error;
mod framing;
mod kill;
mod options;
mod output;
mod spawned;
mod subscription;


use std::future::pending;
use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::ChildStdin;
use tokio::sync::mpsc;

use crate::prelude::*;
use framing::ChunkFramer;
use kill::CancelEvent;
use spawned::SpawnedCommand;
use subscription::CancelSubscription;

pub use command::CommandBuilder;
pub use error::RunError;
pub use kill::process_exists;
pub use options::{EscalationPolicy, Granularity, KillScope, RunOptions};
pub use output::{CapturedOutput, RunStatus, StreamKind};

/// Run a command to completion and capture both streams.
pub async fn run_command(
    command: &CommandBuilder,
    options: &RunOptions,
) -> Result<CapturedOutput, RunError> {
    let mut capture = output::Capture::default();
    let outcome =
        run_command_with_sink(command, options, |chunk, kind| capture.push(chunk, kind)).await?;
    Ok(capture.finish(outcome))
}

/// Run a command, delivering its output to `sink` as it arrives.
///
/// # Arguments
/// - `command`: The program and its arguments.
/// - `options`: Input, environment, granularity and cancellation settings.
/// - `sink`: Called with each chunk and the stream it came from. It runs on
///   the read loop, so a slow sink delays reading.
///
/// # Returns
///
/// The exit status of the command, once it has been reaped, and whether the
/// run was cancelled. A cancelled run still waits for the child to exit.
pub async fn run_command_with_sink<F>(
    command: &CommandBuilder,
    options: &RunOptions,
    mut sink: F,
) -> Result<RunStatus, RunError>
where
    F: FnMut(&[u8], StreamKind),
{
    // Installed before spawning: a failure here must not leave a child behind
    let cancel = CancelSubscription::install(options)?;
    let mut spawned = SpawnedCommand::spawn(command, options)?;
    let pid = spawned.pid;
    debug!("Spawned `{}` as pid {pid}", command.as_command_line());

    // Dropping stdin right away closes it, the child sees end-of-input
    if let (Some(stdin), Some(input)) = (spawned.take_stdin(), options.input.clone()) {
        tokio::spawn(write_input(pid, stdin, input));
    }

    let mut stdout = OutputStream::new(StreamKind::Out, spawned.take_stdout(), options.granularity);
    let mut stderr = OutputStream::new(StreamKind::Err, spawned.take_stderr(), options.granularity);
    let mut events: Option<mpsc::Receiver<CancelEvent>> = None;

    let status = loop {
        tokio::select! {
            read = stdout.read(), if stdout.is_open() => {
                let size = read.map_err(|source| RunError::Read { pid, source })?;
                stdout.deliver(size, &mut sink);
            }
            read = stderr.read(), if stderr.is_open() => {
                let size = read.map_err(|source| RunError::Read { pid, source })?;
                stderr.deliver(size, &mut sink);
            }
            _ = cancel.requested(), if !spawned.is_cancelled() => {
                if spawned.mark_cancelled() {
                    info!("Cancelling `{}` (pid: {pid})", command.as_command_line());
                    events = Some(kill::spawn_cancellation(pid, options));
                }
            }
            event = next_event(&mut events), if events.is_some() => match event {
                Some(CancelEvent::Notice { message, delivered }) => {
                    sink(message.as_bytes(), StreamKind::Err);
                    let _ = delivered.send(());
                }
                Some(CancelEvent::Failed(err)) => return Err(err),
                None => events = None,
            },
            // Reap only once both streams hit end-of-stream and no escalation is in flight
            status = spawned.wait(), if !stdout.is_open() && !stderr.is_open() && events.is_none() => {
                break status?;
            }
        }
    };

    Ok(RunStatus {
        status,
        cancelled: spawned.is_cancelled(),
    })
}

async fn write_input(pid: u32, mut stdin: ChildStdin, input: Vec<u8>) {
    if let Err(err) = stdin.write_all(&input).await {
        // Typically a broken pipe: the child exited or closed stdin without reading everything
        debug!("Stopped writing input to pid {pid}: {err}");
    }
}

async fn next_event(events: &mut Option<mpsc::Receiver<CancelEvent>>) -> Option<CancelEvent> {
    match events {
        Some(events) => events.recv().await,
        None => pending().await,
    }
}

/// One of the child's output pipes, with its framing state.
struct OutputStream<R> {
    kind: StreamKind,
    reader: Option<R>,
    buffer: Vec<u8>,
    framer: ChunkFramer,
}

impl<R: AsyncRead + Unpin> OutputStream<R> {
    fn new(kind: StreamKind, reader: Option<R>, granularity: Granularity) -> Self {
        Self {
            kind,
            reader,
            buffer: vec![0; granularity.read_buffer_size()],
            framer: ChunkFramer::new(granularity),
        }
    }

    fn is_open(&self) -> bool {
        self.reader.is_some()
    }

    /// Cancel safe: no data is lost if the future is dropped before completion.
    async fn read(&mut self) -> io::Result<usize> {
        match &mut self.reader {
            Some(reader) => reader.read(&mut self.buffer).await,
            None => pending().await,
        }
    }

    /// Hand the `size` bytes just read to the sink; `0` means end-of-stream.
    fn deliver(&mut self, size: usize, sink: &mut impl FnMut(&[u8], StreamKind)) {
        let kind = self.kind;
        if size == 0 {
            self.framer.finish(|chunk| sink(chunk, kind));
            self.reader = None;
            trace!("{kind} stream closed");
            return;
        }
        self.framer
            .push(&self.buffer[..size], |chunk| sink(chunk, kind));
    }
}
