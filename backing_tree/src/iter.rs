use crate::error::Result;
use crate::node::Node;
use std::sync::Arc;

/// Lazy, left-to-right iterator over the leaves of a tree.
///
/// Leaves are `Leaf` chunks and `Root` summaries; an unresolvable virtual branch
/// surfaces as an `Err` item and ends that subtree.
pub struct LeafIter {
    stack: Vec<Arc<Node>>,
}

pub fn leaf_iter(root: Arc<Node>) -> LeafIter {
    LeafIter { stack: vec![root] }
}

impl Iterator for LeafIter {
    type Item = Result<Arc<Node>>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut node = self.stack.pop()?;
        while !node.is_leaf() {
            match (node.left(), node.right()) {
                (Ok(left), Ok(right)) => {
                    self.stack.push(right);
                    node = left;
                }
                (Err(e), _) | (_, Err(e)) => return Some(Err(e)),
            }
        }
        Some(Ok(node))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subtree::subtree_fill_to_contents;
    use crate::{Hash256, Subtree};

    fn leaf(byte: u8) -> Arc<Node> {
        Node::leaf(Hash256::from([byte; 32]))
    }

    #[test]
    fn leaves_in_order() {
        let nodes: Vec<_> = (1..=6).map(leaf).collect();
        let tree = subtree_fill_to_contents(&nodes, 3).unwrap();

        let leaves: Vec<Hash256> = leaf_iter(tree).map(|n| n.unwrap().root()).collect();
        assert_eq!(leaves.len(), 8);
        for (i, byte) in (0..6).zip(1u8..) {
            assert_eq!(leaves[i], Hash256::from([byte; 32]));
        }
        assert_eq!(leaves[6], Hash256::zero());
        assert_eq!(leaves[7], Hash256::zero());
    }

    #[test]
    fn single_leaf_tree() {
        let leaves: Vec<_> = leaf_iter(leaf(9)).collect();
        assert_eq!(leaves.len(), 1);
    }

    #[test]
    fn summary_counts_as_leaf() {
        let tree = subtree_fill_to_contents(&[leaf(1), leaf(2), leaf(3), leaf(4)], 2)
            .unwrap()
            .summarize_into(2)
            .unwrap();

        let leaves: Vec<_> = leaf_iter(tree).map(Result::unwrap).collect();
        // The summarized pair collapses to one terminal node.
        assert_eq!(leaves.len(), 3);
    }
}
