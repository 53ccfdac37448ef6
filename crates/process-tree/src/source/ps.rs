use std::process::Command;

use lazy_static::lazy_static;
use regex::Regex;

use super::{ProcessEntry, SnapshotSource};
use crate::error::SnapshotError;

lazy_static! {
    static ref PS_LINE_REGEX: Regex =
        Regex::new(r"^\s*(?P<pid>\d+)\s+(?P<ppid>\d+)\s*(?P<command>.*)$").unwrap();
}

/// Lists processes through `ps`, which works the same on Linux and macOS.
#[derive(Debug, Default, Clone, Copy)]
pub struct PsSource;

impl SnapshotSource for PsSource {
    fn snapshot(&self) -> Result<Vec<ProcessEntry>, SnapshotError> {
        // Each column gets its own `-o`, an `=` would otherwise swallow the following columns
        let output = Command::new("ps")
            .args(["-axww", "-o", "pid=", "-o", "ppid=", "-o", "command="])
            .output()
            .map_err(SnapshotError::Listing)?;

        if !output.status.success() {
            return Err(SnapshotError::Listing(std::io::Error::other(format!(
                "ps exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ))));
        }

        parse_listing(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Parse headerless `pid ppid command` lines. Blank lines are ignored.
pub fn parse_listing(listing: &str) -> Result<Vec<ProcessEntry>, SnapshotError> {
    listing
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(parse_line)
        .collect()
}

fn parse_line(line: &str) -> Result<ProcessEntry, SnapshotError> {
    let syntax_error = || SnapshotError::Syntax {
        line: line.to_string(),
    };

    let captures = PS_LINE_REGEX.captures(line).ok_or_else(syntax_error)?;
    let pid = captures["pid"].parse().map_err(|_| syntax_error())?;
    let parent_pid = captures["ppid"].parse().map_err(|_| syntax_error())?;

    Ok(ProcessEntry {
        pid,
        parent_pid,
        command: captures["command"].trim_end().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_parse_listing() {
        let listing = "    1     0 /sbin/init splash\n  412     1 /usr/sbin/sshd -D\n\n 9001   412 bash -c sleep 10  \n";
        let entries = parse_listing(listing).unwrap();

        assert_eq!(
            entries,
            vec![
                ProcessEntry {
                    pid: 1,
                    parent_pid: 0,
                    command: "/sbin/init splash".into()
                },
                ProcessEntry {
                    pid: 412,
                    parent_pid: 1,
                    command: "/usr/sbin/sshd -D".into()
                },
                ProcessEntry {
                    pid: 9001,
                    parent_pid: 412,
                    command: "bash -c sleep 10".into()
                },
            ]
        );
    }

    #[test]
    fn test_parse_line_with_empty_command() {
        let entries = parse_listing("   77    1").unwrap();
        assert_eq!(entries[0].pid, 77);
        assert_eq!(entries[0].command, "");
    }

    #[rstest]
    #[case::header("  PID  PPID COMMAND")]
    #[case::missing_ppid("  12 /bin/sh")]
    #[case::negative_pid("  -1   0 weird")]
    #[case::overflow("99999999999 1 huge")]
    fn test_parse_line_rejects_malformed(#[case] line: &str) {
        let listing = format!("    1     0 init\n{line}\n");
        let err = parse_listing(&listing).unwrap_err();
        match err {
            SnapshotError::Syntax { line: bad } => assert_eq!(bad, line),
            other => panic!("unexpected error: {other}"),
        }
    }
}
