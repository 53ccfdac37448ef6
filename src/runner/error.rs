use std::io;

use nix::sys::signal::Signal;
use process_tree::SnapshotError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("Failed to spawn `{program}`")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to read the output of pid {pid}")]
    Read {
        pid: u32,
        #[source]
        source: io::Error,
    },

    #[error("Failed to wait for pid {pid}")]
    Wait {
        pid: u32,
        #[source]
        source: io::Error,
    },

    #[error("Failed to listen for {signal:?}")]
    SignalListener {
        signal: Signal,
        #[source]
        source: io::Error,
    },

    /// The process listing could not be trusted, nothing was killed
    #[error("Cannot cancel pid {pid}")]
    Snapshot {
        pid: u32,
        #[source]
        source: SnapshotError,
    },

    #[error("Process snapshot task for pid {pid} did not complete")]
    SnapshotTask {
        pid: u32,
        #[source]
        source: tokio::task::JoinError,
    },
}
