//! Addressing and rewriting subtrees by generalized index.

use crate::error::{Error, Result};
use crate::gindex::anchor_gindex;
use crate::node::Node;
use crate::zero::zero_node;
use crate::{Gindex, ROOT_GINDEX};
use std::sync::Arc;

/// Navigation and copy-on-write rebinding over an `Arc<Node>` tree.
pub trait Subtree {
    /// The node at `target`.
    fn getter(&self, target: Gindex) -> Result<Arc<Node>>;

    /// A new tree equal to this one except that the subtree at `target` is
    /// `value`. Every subtree off the rewritten path is shared with the
    /// original.
    fn setter(&self, target: Gindex, value: Arc<Node>) -> Result<Arc<Node>>;

    /// Like [`Subtree::setter`], but when the path crosses a terminal node it
    /// is replaced with zero-subtree scaffolding instead of failing. Only valid
    /// where the collapsed content is known to be zero (e.g. list positions past
    /// the current length).
    fn expand_into(&self, target: Gindex, value: Arc<Node>) -> Result<Arc<Node>>;

    /// A new tree where the subtree at `target` is collapsed to a root-only
    /// node carrying its root. The overall Merkle root is unchanged.
    fn summarize_into(&self, target: Gindex) -> Result<Arc<Node>>;
}

impl Subtree for Arc<Node> {
    fn getter(&self, target: Gindex) -> Result<Arc<Node>> {
        if target < ROOT_GINDEX {
            return Err(Error::Navigation { gindex: target });
        }
        let mut node = self.clone();
        let mut bit = anchor_gindex(target) >> 1;
        while bit > 0 {
            node = node
                .child(target & bit != 0)
                .map_err(|e| at_target(e, target))?;
            bit >>= 1;
        }
        Ok(node)
    }

    fn setter(&self, target: Gindex, value: Arc<Node>) -> Result<Arc<Node>> {
        if target < ROOT_GINDEX {
            return Err(Error::Navigation { gindex: target });
        }
        rebind(self, target, anchor_gindex(target) >> 1, value, false)
    }

    fn expand_into(&self, target: Gindex, value: Arc<Node>) -> Result<Arc<Node>> {
        if target < ROOT_GINDEX {
            return Err(Error::Navigation { gindex: target });
        }
        rebind(self, target, anchor_gindex(target) >> 1, value, true)
    }

    fn summarize_into(&self, target: Gindex) -> Result<Arc<Node>> {
        let sub = self.getter(target)?;
        self.setter(target, Node::root_only(sub.root()))
    }
}

/// Rewrite `target` to `value`, walking `bit` down one level per recursion step.
fn rebind(
    node: &Arc<Node>,
    target: Gindex,
    bit: u64,
    value: Arc<Node>,
    expand: bool,
) -> Result<Arc<Node>> {
    if bit == 0 {
        return Ok(value);
    }
    let (left, right) = match &**node {
        Node::Pair { left, right, .. } => (left.clone(), right.clone()),
        Node::Virtual { .. } => (
            node.left().map_err(|e| at_target(e, target))?,
            node.right().map_err(|e| at_target(e, target))?,
        ),
        Node::Leaf(_) | Node::Root(_) if expand => {
            // Scaffold a zero subtree of the remaining depth and keep descending.
            let child_depth = bit.trailing_zeros();
            (zero_node(child_depth), zero_node(child_depth))
        }
        Node::Leaf(_) => return Err(Error::Navigation { gindex: target }),
        Node::Root(root) => return Err(Error::PartialBacking { root: *root }),
    };
    Ok(if target & bit == 0 {
        Node::pair(rebind(&left, target, bit >> 1, value, expand)?, right)
    } else {
        Node::pair(left, rebind(&right, target, bit >> 1, value, expand)?)
    })
}

/// Tag child-relative navigation errors with the index the caller asked for.
fn at_target(e: Error, target: Gindex) -> Error {
    match e {
        Error::Navigation { .. } => Error::Navigation { gindex: target },
        other => other,
    }
}

/// A perfect subtree of the given depth with every leaf equal to `bottom`.
pub fn subtree_fill_to_depth(bottom: Arc<Node>, depth: u32) -> Arc<Node> {
    let mut node = bottom;
    for _ in 0..depth {
        node = Node::pair(node.clone(), node);
    }
    node
}

/// A subtree of the given depth whose first `length` leaves are `bottom` and the
/// remainder zero.
pub fn subtree_fill_to_length(bottom: Arc<Node>, depth: u32, length: u64) -> Result<Arc<Node>> {
    let capacity_err = Error::Capacity {
        depth,
        count: length,
    };
    if depth == 0 {
        return match length {
            0 => Ok(zero_node(0)),
            1 => Ok(bottom),
            _ => Err(capacity_err),
        };
    }
    if depth < 64 && length > 1 << depth {
        return Err(capacity_err);
    }
    if depth < 64 && length == 1 << depth {
        return Ok(subtree_fill_to_depth(bottom, depth));
    }
    let pivot = 1 << (depth - 1);
    if length <= pivot {
        Ok(Node::pair(
            subtree_fill_to_length(bottom, depth - 1, length)?,
            zero_node(depth - 1),
        ))
    } else {
        Ok(Node::pair(
            subtree_fill_to_depth(bottom.clone(), depth - 1),
            subtree_fill_to_length(bottom, depth - 1, length - pivot)?,
        ))
    }
}

/// A subtree of the given depth whose leftmost leaves are `nodes`, zero-padded to
/// the right.
pub fn subtree_fill_to_contents(nodes: &[Arc<Node>], depth: u32) -> Result<Arc<Node>> {
    let count = nodes.len() as u64;
    if depth < 64 && count > 1 << depth {
        return Err(Error::Capacity { depth, count });
    }
    if nodes.is_empty() {
        return Ok(zero_node(depth));
    }
    if depth == 0 {
        return Ok(nodes[0].clone());
    }
    let pivot = 1usize << (depth - 1);
    if nodes.len() <= pivot {
        Ok(Node::pair(
            subtree_fill_to_contents(nodes, depth - 1)?,
            zero_node(depth - 1),
        ))
    } else {
        Ok(Node::pair(
            subtree_fill_to_contents(&nodes[..pivot], depth - 1)?,
            subtree_fill_to_contents(&nodes[pivot..], depth - 1)?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{zero_hash, Hash256};

    fn leaf(byte: u8) -> Arc<Node> {
        Node::leaf(Hash256::from([byte; 32]))
    }

    fn four_leaves() -> Arc<Node> {
        subtree_fill_to_contents(&[leaf(1), leaf(2), leaf(3), leaf(4)], 2).unwrap()
    }

    #[test]
    fn get_leaves() {
        let tree = four_leaves();
        for (i, byte) in (4..8).zip(1..) {
            assert_eq!(tree.getter(i).unwrap().root(), Hash256::from([byte; 32]));
        }
    }

    #[test]
    fn get_root_returns_self() {
        let tree = four_leaves();
        assert!(Arc::ptr_eq(&tree.getter(1).unwrap(), &tree));
    }

    #[test]
    fn get_below_root_fails() {
        assert_eq!(
            four_leaves().getter(0),
            Err(Error::Navigation { gindex: 0 })
        );
    }

    #[test]
    fn get_past_leaf_fails_with_target_index() {
        assert_eq!(
            four_leaves().getter(8),
            Err(Error::Navigation { gindex: 8 })
        );
    }

    #[test]
    fn set_rewrites_one_path() {
        let tree = four_leaves();
        let updated = tree.setter(6, leaf(9)).unwrap();

        assert_eq!(updated.getter(6).unwrap().root(), Hash256::from([9; 32]));
        assert_ne!(updated.root(), tree.root());

        // The untouched half is shared, not copied.
        assert!(Arc::ptr_eq(
            &tree.getter(2).unwrap(),
            &updated.getter(2).unwrap()
        ));
    }

    #[test]
    fn set_to_same_value_preserves_root() {
        let tree = four_leaves();
        let updated = tree.setter(5, leaf(2)).unwrap();
        assert_eq!(updated.root(), tree.root());
    }

    #[test]
    fn summarize_keeps_root_and_seals_subtree() {
        let tree = four_leaves();
        let summarized = tree.summarize_into(2).unwrap();

        assert_eq!(summarized.root(), tree.root());
        // Everything outside the summary is still reachable.
        assert_eq!(summarized.getter(6).unwrap().root(), Hash256::from([3; 32]));
        // Entering the summary is a partial-backing failure.
        assert_eq!(
            summarized.getter(4),
            Err(Error::PartialBacking {
                root: tree.getter(2).unwrap().root()
            })
        );
    }

    #[test]
    fn expand_into_grows_through_summaries() {
        let tree = four_leaves().summarize_into(2).unwrap();

        // A plain setter cannot cross the summary, but expansion can; the
        // summarized half was not zero, so the root changes accordingly.
        assert!(tree.setter(4, leaf(1)).is_err());
        let expanded = tree.expand_into(4, leaf(1)).unwrap();
        assert_eq!(expanded.getter(4).unwrap().root(), Hash256::from([1; 32]));
        assert_eq!(expanded.getter(5).unwrap().root(), zero_hash(0));
    }

    #[test]
    fn fill_to_length_pads_with_zeroes() {
        let tree = subtree_fill_to_length(leaf(5), 2, 3).unwrap();
        assert_eq!(tree.getter(6).unwrap().root(), Hash256::from([5; 32]));
        assert_eq!(tree.getter(7).unwrap().root(), zero_hash(0));
    }

    #[test]
    fn fill_to_contents_rejects_overflow() {
        let nodes = vec![leaf(1), leaf(2), leaf(3)];
        assert_eq!(
            subtree_fill_to_contents(&nodes, 1),
            Err(Error::Capacity { depth: 1, count: 3 })
        );
    }

    #[test]
    fn empty_contents_is_zero_subtree() {
        let tree = subtree_fill_to_contents(&[], 3).unwrap();
        assert_eq!(tree.root(), zero_hash(3));
    }
}
