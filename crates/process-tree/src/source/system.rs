use sysinfo::{Process, ProcessRefreshKind, RefreshKind, System, ThreadKind, UpdateKind};

use super::{ProcessEntry, SnapshotSource};
use crate::error::SnapshotError;

/// Lists processes in-process through `sysinfo`, without spawning anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct SysinfoSource;

impl SnapshotSource for SysinfoSource {
    fn snapshot(&self) -> Result<Vec<ProcessEntry>, SnapshotError> {
        let system = System::new_with_specifics(
            RefreshKind::nothing()
                .with_processes(ProcessRefreshKind::nothing().with_cmd(UpdateKind::Always)),
        );

        let mut entries: Vec<ProcessEntry> = system
            .processes()
            .values()
            // Threads are listed next to processes on Linux, they cannot be signaled on their own
            .filter(|process| !matches!(process.thread_kind(), Some(ThreadKind::Userland)))
            .map(|process| ProcessEntry {
                pid: process.pid().as_u32(),
                parent_pid: process.parent().map(|pid| pid.as_u32()).unwrap_or(0),
                command: command_text(process),
            })
            .collect();
        entries.sort_by_key(|entry| entry.pid);

        Ok(entries)
    }
}

/// Full command line when readable, `[name]` otherwise (kernel threads, other users' processes).
fn command_text(process: &Process) -> String {
    let cmd = process.cmd();
    if cmd.is_empty() {
        return format!("[{}]", process.name().to_string_lossy());
    }
    cmd.iter()
        .map(|arg| arg.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ")
}
