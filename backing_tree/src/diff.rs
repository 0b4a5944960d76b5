use crate::node::Node;
use crate::Gindex;
use std::sync::Arc;

/// Lazy iterator over the maximal differing subtrees of two trees.
///
/// Descends only where both sides can descend and their roots differ; equal
/// roots prune the walk (structural sharing is detected by root equality). Each
/// yielded `(gindex, a_sub, b_sub)` differs at its root and cannot be split
/// further.
pub struct TreeDiff {
    stack: Vec<(Gindex, Arc<Node>, Arc<Node>)>,
}

pub fn tree_diff(a: Arc<Node>, b: Arc<Node>) -> TreeDiff {
    TreeDiff {
        stack: vec![(crate::ROOT_GINDEX, a, b)],
    }
}

impl Iterator for TreeDiff {
    type Item = (Gindex, Arc<Node>, Arc<Node>);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (gindex, a, b) = self.stack.pop()?;
            if a.root() == b.root() {
                continue;
            }
            // An unresolvable virtual child makes the node terminal for the walk.
            let children = match (a.left(), a.right(), b.left(), b.right()) {
                (Ok(al), Ok(ar), Ok(bl), Ok(br)) => Some(((al, bl), (ar, br))),
                _ => None,
            };
            match children {
                Some(((al, bl), (ar, br))) => {
                    self.stack.push((2 * gindex + 1, ar, br));
                    self.stack.push((2 * gindex, al, bl));
                }
                None => return Some((gindex, a, b)),
            }
        }
    }
}
