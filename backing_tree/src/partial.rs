//! Sources for virtual (partially backed) trees.

use crate::node::Node;
use crate::Hash256;
use std::collections::HashMap;
use std::sync::Arc;

/// Resolves the children of a virtual node, keyed by the parent root.
///
/// A source returning `None` makes the branch unresolvable: traversal through it
/// fails with a partial-backing error rather than producing fabricated data.
pub trait VirtualSource: Send + Sync {
    fn get_left(&self, key: &Hash256) -> Option<Arc<Node>>;
    fn get_right(&self, key: &Hash256) -> Option<Arc<Node>>;
}

/// An in-memory [`VirtualSource`]: a map from parent root to child pair.
///
/// Typically populated from a proof or by indexing an existing tree with
/// [`MemorySource::insert_tree`], then shared behind an `Arc`.
#[derive(Default)]
pub struct MemorySource {
    children: HashMap<Hash256, (Arc<Node>, Arc<Node>)>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, parent: Hash256, left: Arc<Node>, right: Arc<Node>) {
        self.children.insert(parent, (left, right));
    }

    /// Index every pair reachable in `node`, so the whole tree can be replayed
    /// through virtual nodes.
    pub fn insert_tree(&mut self, node: &Arc<Node>) {
        if let Node::Pair { left, right, .. } = &**node {
            self.insert(node.root(), left.clone(), right.clone());
            self.insert_tree(left);
            self.insert_tree(right);
        }
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

impl VirtualSource for MemorySource {
    fn get_left(&self, key: &Hash256) -> Option<Arc<Node>> {
        self.children.get(key).map(|(left, _)| left.clone())
    }

    fn get_right(&self, key: &Hash256) -> Option<Arc<Node>> {
        self.children.get(key).map(|(_, right)| right.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::subtree::subtree_fill_to_contents;
    use crate::Subtree;

    fn leaf(byte: u8) -> Arc<Node> {
        Node::leaf(Hash256::from([byte; 32]))
    }

    #[test]
    fn replays_an_indexed_tree() {
        let tree = subtree_fill_to_contents(&[leaf(1), leaf(2), leaf(3), leaf(4)], 2).unwrap();

        let mut source = MemorySource::new();
        source.insert_tree(&tree);
        let virtual_tree = Node::virtual_node(tree.root(), Arc::new(source));

        assert_eq!(virtual_tree.root(), tree.root());
        for gindex in 4..8 {
            assert_eq!(
                virtual_tree.getter(gindex).unwrap().root(),
                tree.getter(gindex).unwrap().root()
            );
        }
    }

    #[test]
    fn missing_branch_is_partial() {
        let tree = subtree_fill_to_contents(&[leaf(1), leaf(2), leaf(3), leaf(4)], 2).unwrap();

        // Only the top split is known; the left subtree's own children are not.
        let mut source = MemorySource::new();
        let left = tree.getter(2).unwrap();
        let right = tree.getter(3).unwrap();
        source.insert(tree.root(), Node::root_only(left.root()), right.clone());
        let virtual_tree = Node::virtual_node(tree.root(), Arc::new(source));

        assert_eq!(virtual_tree.getter(6).unwrap().root(), leaf(3).root());
        assert_eq!(
            virtual_tree.getter(4),
            Err(Error::PartialBacking { root: left.root() })
        );
    }

    #[test]
    fn rebind_through_virtual_keeps_sharing() {
        let tree = subtree_fill_to_contents(&[leaf(1), leaf(2), leaf(3), leaf(4)], 2).unwrap();

        let mut source = MemorySource::new();
        source.insert_tree(&tree);
        let virtual_tree = Node::virtual_node(tree.root(), Arc::new(source));

        let updated = virtual_tree.setter(7, leaf(9)).unwrap();
        assert_eq!(updated.root(), tree.setter(7, leaf(9)).unwrap().root());
    }
}
