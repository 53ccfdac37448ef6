use std::collections::{HashMap, HashSet};
use std::fmt;

use log::debug;

use crate::error::SnapshotError;
use crate::node::{PostOrder, ProcessNode};
use crate::source::{ProcessEntry, SnapshotSource, SourceKind};

/// Pid of the synthetic root. It is not a real process.
pub const ROOT_PID: u32 = 0;
pub const ROOT_COMMAND: &str = "System Startup";

/// Immutable process forest rooted at a synthetic "System Startup" node.
#[derive(Debug, Clone)]
pub struct ProcessTree {
    root: ProcessNode,
}

impl ProcessTree {
    /// Snapshot every process visible to the caller using the default source.
    pub fn build() -> Result<Self, SnapshotError> {
        Self::build_with(&SourceKind::default())
    }

    pub fn build_with(source: &dyn SnapshotSource) -> Result<Self, SnapshotError> {
        let entries = source.snapshot()?;
        debug!("Building process tree from {} entries", entries.len());
        Self::from_entries(entries)
    }

    /// Assemble a tree from a flat listing.
    ///
    /// Entries keep their listing order among siblings. Fails if a parent is
    /// missing, a pid is listed twice, or a group of entries only points at
    /// itself.
    pub fn from_entries(entries: Vec<ProcessEntry>) -> Result<Self, SnapshotError> {
        let mut seen = HashSet::with_capacity(entries.len());
        let mut child_pids: HashMap<u32, Vec<u32>> = HashMap::new();
        let mut pending: HashMap<u32, ProcessNode> = HashMap::with_capacity(entries.len());

        for entry in &entries {
            // Some platforms list the scheduler as pid 0, which collides with the synthetic root
            if entry.pid == ROOT_PID {
                continue;
            }
            if !seen.insert(entry.pid) {
                return Err(SnapshotError::DuplicatePid { pid: entry.pid });
            }
        }

        for entry in entries {
            if entry.pid == ROOT_PID {
                continue;
            }
            if entry.parent_pid != ROOT_PID && !seen.contains(&entry.parent_pid) {
                return Err(SnapshotError::DanglingParent {
                    pid: entry.pid,
                    parent_pid: entry.parent_pid,
                });
            }
            child_pids
                .entry(entry.parent_pid)
                .or_default()
                .push(entry.pid);
            pending.insert(
                entry.pid,
                ProcessNode::new(entry.pid, entry.parent_pid, entry.command),
            );
        }

        // Order pids so that every child comes before its parent, then attach bottom-up
        let mut order = Vec::with_capacity(pending.len());
        let mut stack = vec![(ROOT_PID, false)];
        while let Some((pid, expanded)) = stack.pop() {
            if expanded {
                order.push(pid);
                continue;
            }
            stack.push((pid, true));
            if let Some(children) = child_pids.get(&pid) {
                stack.extend(children.iter().map(|child| (*child, false)));
            }
        }

        let mut root = ProcessNode::new(ROOT_PID, ROOT_PID, ROOT_COMMAND);
        for pid in order {
            let children = child_pids
                .remove(&pid)
                .unwrap_or_default()
                .into_iter()
                .filter_map(|child| pending.remove(&child))
                .collect();
            if pid == ROOT_PID {
                root.children = children;
            } else if let Some(node) = pending.get_mut(&pid) {
                node.children = children;
            }
        }

        if let Some(pid) = pending.keys().min() {
            return Err(SnapshotError::Detached { pid: *pid });
        }

        Ok(Self { root })
    }

    pub fn root(&self) -> &ProcessNode {
        &self.root
    }

    pub fn find(&self, pid: u32) -> Option<&ProcessNode> {
        self.root.find(pid)
    }

    pub fn traverse(&self) -> PostOrder<'_> {
        self.root.traverse()
    }

    /// Number of real processes in the snapshot.
    pub fn len(&self) -> usize {
        self.root.descendant_count()
    }

    pub fn is_empty(&self) -> bool {
        self.root.children.is_empty()
    }
}

impl fmt::Display for ProcessTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut stack = vec![(&self.root, 0usize)];
        while let Some((node, depth)) = stack.pop() {
            writeln!(f, "{:indent$}{} {}", "", node.pid, node.command, indent = depth * 2)?;
            stack.extend(node.children.iter().rev().map(|child| (child, depth + 1)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(pid: u32, parent_pid: u32, command: &str) -> ProcessEntry {
        ProcessEntry {
            pid,
            parent_pid,
            command: command.to_string(),
        }
    }

    fn sample_entries() -> Vec<ProcessEntry> {
        vec![
            entry(1, 0, "/sbin/init"),
            entry(50, 1, "sshd"),
            entry(51, 50, "bash"),
            entry(52, 51, "sleep 100"),
            entry(60, 1, "cron"),
            entry(2, 0, "[kthreadd]"),
        ]
    }

    #[test]
    fn test_from_entries_builds_root() {
        let tree = ProcessTree::from_entries(sample_entries()).unwrap();
        let root = tree.root();

        assert_eq!(root.pid, ROOT_PID);
        assert_eq!(root.command, ROOT_COMMAND);
        assert_eq!(
            root.children.iter().map(|node| node.pid).collect::<Vec<_>>(),
            vec![1, 2]
        );
        assert_eq!(tree.len(), 6);
    }

    #[test]
    fn test_children_keep_listing_order() {
        let tree = ProcessTree::from_entries(sample_entries()).unwrap();
        let init = tree.find(1).unwrap();
        assert_eq!(
            init.children.iter().map(|node| node.pid).collect::<Vec<_>>(),
            vec![50, 60]
        );
    }

    #[test]
    fn test_every_node_has_parent_closer_to_root() {
        let tree = ProcessTree::from_entries(sample_entries()).unwrap();
        let mut stack = vec![tree.root()];
        while let Some(node) = stack.pop() {
            for child in &node.children {
                assert_eq!(child.parent_pid, node.pid);
                stack.push(child);
            }
        }
    }

    #[test]
    fn test_find_returns_each_pid_once() {
        let tree = ProcessTree::from_entries(sample_entries()).unwrap();
        for pid in [1, 2, 50, 51, 52, 60] {
            let matches = tree.traverse().filter(|node| node.pid == pid).count();
            assert_eq!(matches, 1);
            assert_eq!(tree.find(pid).map(|node| node.pid), Some(pid));
        }
        assert!(tree.find(9999).is_none());
    }

    #[test]
    fn test_subtree_kill_order() {
        let tree = ProcessTree::from_entries(sample_entries()).unwrap();
        let order: Vec<u32> = tree
            .find(50)
            .unwrap()
            .traverse()
            .map(|node| node.pid)
            .collect();
        assert_eq!(order, vec![52, 51, 50]);
    }

    #[test]
    fn test_dangling_parent_is_fatal() {
        let mut entries = sample_entries();
        entries.push(entry(70, 69, "orphan"));

        let err = ProcessTree::from_entries(entries).unwrap_err();
        assert!(matches!(
            err,
            SnapshotError::DanglingParent {
                pid: 70,
                parent_pid: 69
            }
        ));
        assert_eq!(
            err.to_string(),
            "Inconsistent process tree: parent (69) for pid 70 does not exist"
        );
    }

    #[test]
    fn test_duplicate_pid_is_fatal() {
        let mut entries = sample_entries();
        entries.push(entry(52, 1, "again"));

        let err = ProcessTree::from_entries(entries).unwrap_err();
        assert!(matches!(err, SnapshotError::DuplicatePid { pid: 52 }));
    }

    #[test]
    fn test_cycle_is_detached() {
        let mut entries = sample_entries();
        entries.push(entry(80, 81, "a"));
        entries.push(entry(81, 80, "b"));

        let err = ProcessTree::from_entries(entries).unwrap_err();
        assert!(matches!(err, SnapshotError::Detached { pid: 80 }));
    }

    #[test]
    fn test_pid_zero_entry_is_merged_into_root() {
        let mut entries = vec![entry(0, 0, "kernel_task")];
        entries.extend(sample_entries());

        let tree = ProcessTree::from_entries(entries).unwrap();
        assert_eq!(tree.root().command, ROOT_COMMAND);
        assert_eq!(tree.len(), 6);
    }

    #[test]
    fn test_empty_listing() {
        let tree = ProcessTree::from_entries(Vec::new()).unwrap();
        assert!(tree.is_empty());
        assert_eq!(
            tree.traverse().map(|node| node.pid).collect::<Vec<_>>(),
            vec![ROOT_PID]
        );
    }

    #[test]
    fn test_display_indents_children() {
        let tree = ProcessTree::from_entries(vec![
            entry(1, 0, "init"),
            entry(5, 1, "bash"),
        ])
        .unwrap();
        assert_eq!(tree.to_string(), "0 System Startup\n  1 init\n    5 bash\n");
    }

    #[test]
    fn test_build_contains_current_process() {
        let tree = ProcessTree::build().unwrap();
        let me = tree.find(std::process::id());
        assert!(me.is_some(), "current process missing from snapshot");
    }
}
