//! Producers of raw `(pid, ppid, command)` listings.

mod ps;
mod system;

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::SnapshotError;

pub use ps::{PsSource, parse_listing};
pub use system::SysinfoSource;

/// One line of a process listing, before tree assembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessEntry {
    pub pid: u32,
    pub parent_pid: u32,
    pub command: String,
}

/// Anything that can enumerate live processes and their parentage.
pub trait SnapshotSource {
    fn snapshot(&self) -> Result<Vec<ProcessEntry>, SnapshotError>;
}

/// Built-in snapshot sources, selectable from configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    Sysinfo,
    Ps,
}

impl SnapshotSource for SourceKind {
    fn snapshot(&self) -> Result<Vec<ProcessEntry>, SnapshotError> {
        match self {
            SourceKind::Sysinfo => SysinfoSource.snapshot(),
            SourceKind::Ps => PsSource.snapshot(),
        }
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sysinfo" => Ok(SourceKind::Sysinfo),
            "ps" => Ok(SourceKind::Ps),
            other => Err(format!(
                "unknown snapshot source '{other}', expected 'sysinfo' or 'ps'"
            )),
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Sysinfo => write!(f, "sysinfo"),
            SourceKind::Ps => write!(f, "ps"),
        }
    }
}

impl<F> SnapshotSource for F
where
    F: Fn() -> Result<Vec<ProcessEntry>, SnapshotError>,
{
    fn snapshot(&self) -> Result<Vec<ProcessEntry>, SnapshotError> {
        self()
    }
}
