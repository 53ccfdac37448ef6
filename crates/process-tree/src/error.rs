use thiserror::Error;

/// A process listing that cannot be turned into a consistent tree.
///
/// None of these are recoverable: a partial tree would under-report the
/// descendants of a process.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Syntax error in process listing: {line:?}")]
    Syntax { line: String },

    #[error("Inconsistent process tree: parent ({parent_pid}) for pid {pid} does not exist")]
    DanglingParent { pid: u32, parent_pid: u32 },

    #[error("Inconsistent process tree: pid {pid} is listed more than once")]
    DuplicatePid { pid: u32 },

    #[error("Inconsistent process tree: pid {pid} is not connected to the root")]
    Detached { pid: u32 },

    #[error("Failed to list processes")]
    Listing(#[source] std::io::Error),
}
