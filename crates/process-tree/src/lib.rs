//! Point-in-time snapshots of the OS process forest.
//!
//! A [`ProcessTree`] is built from a flat listing of `(pid, ppid, command)`
//! triples and never changes afterwards. Callers that need fresh parentage
//! (e.g. before killing a subtree) must build a new one.

mod error;
mod node;
pub mod source;
mod tree;

pub use error::SnapshotError;
pub use node::{PostOrder, ProcessNode};
pub use source::{ProcessEntry, SnapshotSource, SourceKind};
pub use tree::{ProcessTree, ROOT_COMMAND, ROOT_PID};
