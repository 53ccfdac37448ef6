use std::collections::BTreeMap;
use std::fmt;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use nix::sys::signal::Signal;
use process_tree::{SnapshotSource, SourceKind};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

/// Unit in which output reaches the sink.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawGranularity")]
pub enum Granularity {
    /// One sink call per complete line, a trailing partial line is flushed at end-of-stream
    #[default]
    Line,
    /// Chunks of at most this many bytes, delivered as soon as they are read
    Bytes(NonZeroUsize),
}

impl Granularity {
    pub fn bytes(size: usize) -> Option<Self> {
        NonZeroUsize::new(size).map(Granularity::Bytes)
    }

    /// Size of the buffer handed to each pipe read.
    pub(crate) fn read_buffer_size(&self) -> usize {
        match self {
            Granularity::Line => 8 * 1024,
            Granularity::Bytes(size) => size.get(),
        }
    }
}

impl FromStr for Granularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == "line" {
            return Ok(Granularity::Line);
        }
        s.parse::<usize>()
            .ok()
            .and_then(Granularity::bytes)
            .ok_or_else(|| {
                format!("invalid granularity '{s}', expected 'line' or a positive byte count")
            })
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Granularity::Line => write!(f, "line"),
            Granularity::Bytes(size) => write!(f, "{size}"),
        }
    }
}

/// Configuration files may spell the granularity as `line` or as a bare number
#[derive(Deserialize)]
#[serde(untagged)]
enum RawGranularity {
    Bytes(usize),
    Named(String),
}

impl TryFrom<RawGranularity> for Granularity {
    type Error = String;

    fn try_from(raw: RawGranularity) -> Result<Self, Self::Error> {
        match raw {
            RawGranularity::Bytes(size) => Granularity::bytes(size)
                .ok_or_else(|| "granularity must be a positive byte count".to_string()),
            RawGranularity::Named(name) => name.parse(),
        }
    }
}

/// Which members of the spawned subtree a cancellation acts on.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum KillScope {
    /// Every live process of the subtree, descendants first
    #[default]
    Subtree,
    /// Only the first live process met in the descendants-first walk
    FirstLive,
}

/// Interrupt, wait, terminate, wait, kill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscalationPolicy {
    /// Liveness checks after each of the interrupt and terminate signals
    pub poll_attempts: u32,
    pub poll_interval: Duration,
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        Self {
            poll_attempts: 20,
            poll_interval: Duration::from_millis(20),
        }
    }
}

#[derive(Clone)]
pub struct RunOptions {
    pub granularity: Granularity,
    /// Written to the child's stdin; when `None` stdin is closed right after spawn
    pub input: Option<Vec<u8>>,
    /// Applied to the child's environment only
    pub env: BTreeMap<String, String>,
    pub current_dir: Option<PathBuf>,
    /// Cancelling this token stops the command and everything it spawned
    pub cancellation: CancellationToken,
    /// Signal that, when received by this process, cancels the run
    pub cancel_signal: Option<Signal>,
    pub kill_scope: KillScope,
    pub escalation: EscalationPolicy,
    /// Where the process listing comes from when the run is cancelled
    pub snapshot_source: Arc<dyn SnapshotSource + Send + Sync>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            granularity: Granularity::default(),
            input: None,
            env: BTreeMap::new(),
            current_dir: None,
            cancellation: CancellationToken::new(),
            cancel_signal: None,
            kill_scope: KillScope::default(),
            escalation: EscalationPolicy::default(),
            snapshot_source: Arc::new(SourceKind::default()),
        }
    }
}

impl fmt::Debug for RunOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunOptions")
            .field("granularity", &self.granularity)
            .field("input_len", &self.input.as_ref().map(Vec::len))
            .field("env", &self.env)
            .field("current_dir", &self.current_dir)
            .field("cancellation", &self.cancellation)
            .field("cancel_signal", &self.cancel_signal)
            .field("kill_scope", &self.kill_scope)
            .field("escalation", &self.escalation)
            .finish_non_exhaustive()
    }
}

impl RunOptions {
    pub fn with_granularity(mut self, granularity: Granularity) -> Self {
        self.granularity = granularity;
        self
    }

    pub fn with_input(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.input = Some(input.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn with_cancel_signal(mut self, signal: Signal) -> Self {
        self.cancel_signal = Some(signal);
        self
    }

    pub fn with_kill_scope(mut self, kill_scope: KillScope) -> Self {
        self.kill_scope = kill_scope;
        self
    }

    pub fn with_snapshot_source(
        mut self,
        source: impl SnapshotSource + Send + Sync + 'static,
    ) -> Self {
        self.snapshot_source = Arc::new(source);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("line", Granularity::Line)]
    #[case(" line ", Granularity::Line)]
    #[case("4", Granularity::Bytes(NonZeroUsize::new(4).unwrap()))]
    #[case("65536", Granularity::Bytes(NonZeroUsize::new(65536).unwrap()))]
    fn test_parse_granularity(#[case] input: &str, #[case] expected: Granularity) {
        assert_eq!(input.parse::<Granularity>(), Ok(expected));
    }

    #[rstest]
    #[case("0")]
    #[case("-4")]
    #[case("lines")]
    #[case("")]
    fn test_parse_granularity_rejects(#[case] input: &str) {
        assert!(input.parse::<Granularity>().is_err());
    }

    #[test]
    fn test_granularity_display_round_trips() {
        for granularity in [Granularity::Line, Granularity::bytes(12).unwrap()] {
            assert_eq!(granularity.to_string().parse(), Ok(granularity));
        }
    }

    #[test]
    fn test_deserialize_granularity() {
        let line: Granularity = serde_yaml::from_str("line").unwrap();
        assert_eq!(line, Granularity::Line);

        let bytes: Granularity = serde_yaml::from_str("16").unwrap();
        assert_eq!(bytes, Granularity::bytes(16).unwrap());

        assert!(serde_yaml::from_str::<Granularity>("0").is_err());
    }

    #[test]
    fn test_default_escalation_window() {
        let policy = EscalationPolicy::default();
        assert_eq!(policy.poll_interval * policy.poll_attempts, Duration::from_millis(400));
    }
}
