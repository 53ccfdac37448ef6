//! Cancellation of a spawned command and everything below it.
//!
//! The escalation runs on its own task. Sink notices go back to the read
//! loop through a channel and are acknowledged before the target is
//! signaled, so the sink is only ever called from the read loop.

use std::sync::Arc;

use nix::errno::Errno;
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use process_tree::{ProcessTree, SnapshotError, SnapshotSource};
use tokio::sync::{mpsc, oneshot};
use tokio::time::sleep;

use super::error::RunError;
use super::options::{EscalationPolicy, KillScope, RunOptions};
use crate::prelude::*;

pub(crate) enum CancelEvent {
    /// Must reach the sink before `delivered` is answered
    Notice {
        message: String,
        delivered: oneshot::Sender<()>,
    },
    Failed(RunError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct KillTarget {
    pid: u32,
    command: String,
}

/// Start tearing down `pid` and its descendants.
///
/// The returned channel closes once the escalation is over.
pub(crate) fn spawn_cancellation(pid: u32, options: &RunOptions) -> mpsc::Receiver<CancelEvent> {
    let (events, receiver) = mpsc::channel(1);
    tokio::spawn(cancel_subtree(
        pid,
        Arc::clone(&options.snapshot_source),
        options.kill_scope,
        options.escalation,
        events,
    ));
    receiver
}

async fn cancel_subtree(
    pid: u32,
    source: Arc<dyn SnapshotSource + Send + Sync>,
    scope: KillScope,
    policy: EscalationPolicy,
    events: mpsc::Sender<CancelEvent>,
) {
    let targets = match tokio::task::spawn_blocking(move || kill_order(pid, source.as_ref())).await {
        Ok(Ok(targets)) => targets,
        Ok(Err(source)) => {
            error!("Process tree snapshot is inconsistent: {source}");
            let _ = events
                .send(CancelEvent::Failed(RunError::Snapshot { pid, source }))
                .await;
            return;
        }
        Err(source) => {
            let _ = events
                .send(CancelEvent::Failed(RunError::SnapshotTask { pid, source }))
                .await;
            return;
        }
    };

    if targets.is_empty() {
        debug!("pid {pid} is not in the process tree anymore, nothing to cancel");
    }

    for target in targets {
        if !process_exists(target.pid) {
            continue;
        }

        let (delivered, acknowledged) = oneshot::channel();
        let message = format!("^C: {} (pid: {})\n", target.command, target.pid);
        if events
            .send(CancelEvent::Notice { message, delivered })
            .await
            .is_err()
        {
            // The run is gone, nobody is waiting for this subtree anymore
            return;
        }
        let _ = acknowledged.await;

        info!("Stopping {} (pid: {})", target.command, target.pid);
        kill_and_wait(target.pid, &policy).await;

        if scope == KillScope::FirstLive {
            break;
        }
    }
}

/// Fresh snapshot of `pid`'s subtree, descendants before ancestors.
fn kill_order(pid: u32, source: &dyn SnapshotSource) -> Result<Vec<KillTarget>, SnapshotError> {
    let tree = ProcessTree::build_with(source)?;
    let Some(node) = tree.find(pid) else {
        return Ok(Vec::new());
    };
    Ok(node
        .traverse()
        .map(|node| KillTarget {
            pid: node.pid,
            command: node.command.clone(),
        })
        .collect())
}

/// SIGINT, then SIGTERM, then SIGKILL, giving the process a poll window to
/// exit after each of the first two.
pub(crate) async fn kill_and_wait(pid: u32, policy: &EscalationPolicy) {
    for signal in [Signal::SIGINT, Signal::SIGTERM] {
        if !send_signal(pid, signal) {
            return;
        }
        if wait_for_exit(pid, policy).await {
            return;
        }
    }
    send_signal(pid, Signal::SIGKILL);
}

/// Returns `false` when the process cannot be signaled anymore.
fn send_signal(pid: u32, signal: Signal) -> bool {
    let Some(target) = as_target(pid) else {
        return false;
    };
    match kill(target, signal) {
        Ok(()) => {
            debug!("Sent {signal:?} to pid {pid}");
            true
        }
        Err(Errno::ESRCH) => false,
        Err(err) => {
            warn!("Failed to send {signal:?} to pid {pid}: {err}");
            false
        }
    }
}

async fn wait_for_exit(pid: u32, policy: &EscalationPolicy) -> bool {
    for _ in 0..policy.poll_attempts {
        if !process_exists(pid) {
            return true;
        }
        sleep(policy.poll_interval).await;
    }
    !process_exists(pid)
}

/// Whether `pid` is still running. Zombies have already exited.
pub fn process_exists(pid: u32) -> bool {
    let Some(target) = as_target(pid) else {
        return false;
    };
    match kill(target, None) {
        Ok(()) => !is_zombie(pid),
        Err(Errno::ESRCH) => false,
        // EPERM: alive, but owned by someone else
        Err(_) => true,
    }
}

/// Only positive pids address a single process, `0` and negatives address groups.
fn as_target(pid: u32) -> Option<Pid> {
    i32::try_from(pid)
        .ok()
        .filter(|raw| *raw > 0)
        .map(Pid::from_raw)
}

#[cfg(target_os = "linux")]
fn is_zombie(pid: u32) -> bool {
    procfs::process::Process::new(pid as i32)
        .and_then(|process| process.stat())
        .map(|stat| stat.state == 'Z')
        .unwrap_or(false)
}

#[cfg(not(target_os = "linux"))]
fn is_zombie(_pid: u32) -> bool {
    false
}
