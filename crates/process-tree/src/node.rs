
/// One process at snapshot time, owning the processes it spawned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessNode {
    pub pid: u32,
    /// `0` for top-level processes and for the synthetic root itself.
    pub parent_pid: u32,
    pub command: String,
    pub children: Vec<ProcessNode>,
}

impl ProcessNode {
    pub fn new(pid: u32, parent_pid: u32, command: impl Into<String>) -> Self {
        Self {
            pid,
            parent_pid,
            command: command.into(),
            children: Vec::new(),
        }
    }

    /// Depth-first search for `pid`, including `self`.
    ///
    /// `None` means the process had already exited (or never existed) when
    /// the snapshot was taken.
    pub fn find(&self, pid: u32) -> Option<&ProcessNode> {
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            if node.pid == pid {
                return Some(node);
            }
            // Reversed so that children are visited in listing order
            stack.extend(node.children.iter().rev());
        }
        None
    }

    /// Walks this subtree children-before-parent, `self` last.
    ///
    /// Killing processes in this order never orphans a descendant that is
    /// still to be visited.
    pub fn traverse(&self) -> PostOrder<'_> {
        PostOrder {
            stack: vec![(self, 0)],
        }
    }

    /// Number of processes below this node.
    pub fn descendant_count(&self) -> usize {
        self.traverse().count() - 1
    }
}

/// Post-order iterator over a [`ProcessNode`] subtree.
///
/// Uses an explicit stack, so arbitrarily deep trees do not recurse.
pub struct PostOrder<'a> {
    stack: Vec<(&'a ProcessNode, usize)>,
}

impl<'a> Iterator for PostOrder<'a> {
    type Item = &'a ProcessNode;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let top = self.stack.last_mut()?;
            let node: &'a ProcessNode = top.0;
            match node.children.get(top.1) {
                Some(child) => {
                    top.1 += 1;
                    self.stack.push((child, 0));
                }
                None => {
                    self.stack.pop();
                    return Some(node);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashMap;

    fn leaf(pid: u32, parent_pid: u32) -> ProcessNode {
        ProcessNode::new(pid, parent_pid, format!("cmd-{pid}"))
    }

    fn with_children(mut node: ProcessNode, children: Vec<ProcessNode>) -> ProcessNode {
        node.children = children;
        node
    }

    fn single_root() -> ProcessNode {
        leaf(0, 0)
    }

    fn wide() -> ProcessNode {
        with_children(leaf(0, 0), (1..=5).map(|pid| leaf(pid, 0)).collect())
    }

    fn nested() -> ProcessNode {
        with_children(
            leaf(0, 0),
            vec![
                with_children(
                    leaf(1, 0),
                    vec![
                        with_children(leaf(10, 1), vec![leaf(100, 10), leaf(101, 10)]),
                        leaf(11, 1),
                    ],
                ),
                with_children(leaf(2, 0), vec![leaf(20, 2)]),
            ],
        )
    }

    fn chain(depth: u32) -> ProcessNode {
        let mut node = leaf(depth, depth - 1);
        for pid in (0..depth).rev() {
            node = with_children(leaf(pid, pid.saturating_sub(1)), vec![node]);
        }
        node
    }

    /// Asserts that every node is yielded after all of its descendants.
    fn assert_post_order(root: &ProcessNode) {
        let order: Vec<u32> = root.traverse().map(|node| node.pid).collect();
        let position: HashMap<u32, usize> = order
            .iter()
            .enumerate()
            .map(|(index, pid)| (*pid, index))
            .collect();

        assert_eq!(order.len(), position.len(), "a node was visited twice");

        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            for child in &node.children {
                assert!(
                    position[&child.pid] < position[&node.pid],
                    "child {} visited after parent {}",
                    child.pid,
                    node.pid
                );
                stack.push(child);
            }
        }
        assert_eq!(order.last(), Some(&root.pid));
    }

    #[rstest]
    #[case::single_root(single_root())]
    #[case::wide(wide())]
    #[case::nested(nested())]
    #[case::deep_chain(chain(1_000))]
    fn test_traverse_is_post_order(#[case] root: ProcessNode) {
        assert_post_order(&root);
    }

    #[test]
    fn test_traverse_nested_order() {
        let order: Vec<u32> = nested().traverse().map(|node| node.pid).collect();
        assert_eq!(order, vec![100, 101, 10, 11, 1, 20, 2, 0]);
    }

    #[test]
    fn test_traverse_can_be_restarted() {
        let root = nested();
        let first: Vec<u32> = root.traverse().map(|node| node.pid).collect();
        let second: Vec<u32> = root.traverse().map(|node| node.pid).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_traverse_subtree_only() {
        let root = nested();
        let subtree = root.find(10).unwrap();
        let order: Vec<u32> = subtree.traverse().map(|node| node.pid).collect();
        assert_eq!(order, vec![100, 101, 10]);
    }

    #[test]
    fn test_find() {
        let root = nested();
        assert_eq!(root.find(0).map(|node| node.pid), Some(0));
        assert_eq!(root.find(101).map(|node| node.command.as_str()), Some("cmd-101"));
        assert_eq!(root.find(20).map(|node| node.parent_pid), Some(2));
        assert!(root.find(42).is_none());
    }

    #[test]
    fn test_find_in_deep_chain() {
        let root = chain(1_000);
        assert_eq!(root.find(1_000).map(|node| node.pid), Some(1_000));
    }

    #[test]
    fn test_descendant_count() {
        assert_eq!(single_root().descendant_count(), 0);
        assert_eq!(wide().descendant_count(), 5);
        assert_eq!(nested().descendant_count(), 7);
    }
}
