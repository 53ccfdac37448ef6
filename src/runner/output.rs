use std::borrow::Cow;
use std::fmt;
use std::process::ExitStatus;

/// The child stream a chunk was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Out,
    Err,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Out => write!(f, "out"),
            StreamKind::Err => write!(f, "err"),
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunStatus {
    /// Exit status of the spawned process, as reaped
    pub status: ExitStatus,
    /// The run was cancelled, whatever the spawned process exited with
    pub cancelled: bool,
}

impl RunStatus {
    /// A cancelled run never succeeds, even if its process exited with 0.
    pub fn success(&self) -> bool {
        !self.cancelled && self.status.success()
    }
}

/// Everything a command wrote, when no sink was supplied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub status: ExitStatus,
    pub cancelled: bool,
}

impl CapturedOutput {
    pub fn success(&self) -> bool {
        !self.cancelled && self.status.success()
    }

    pub fn stdout_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.stdout)
    }

    pub fn stderr_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.stderr)
    }
}

/// Default sink: accumulates both streams separately.
#[derive(Debug, Default)]
pub(crate) struct Capture {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

impl Capture {
    pub(crate) fn push(&mut self, chunk: &[u8], kind: StreamKind) {
        match kind {
            StreamKind::Out => self.stdout.extend_from_slice(chunk),
            StreamKind::Err => self.stderr.extend_from_slice(chunk),
        }
    }

    pub(crate) fn finish(self, outcome: RunStatus) -> CapturedOutput {
        CapturedOutput {
            stdout: self.stdout,
            stderr: self.stderr,
            status: outcome.status,
            cancelled: outcome.cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::process::ExitStatusExt;

    #[test]
    fn test_cancelled_run_is_not_a_success() {
        let clean_exit = ExitStatus::from_raw(0);
        let cancelled = RunStatus {
            status: clean_exit,
            cancelled: true,
        };
        assert!(!cancelled.success());

        let output = Capture::default().finish(cancelled);
        assert!(output.cancelled);
        assert!(!output.success());

        let completed = RunStatus {
            status: clean_exit,
            cancelled: false,
        };
        assert!(completed.success());
        assert!(Capture::default().finish(completed).success());
    }
}
