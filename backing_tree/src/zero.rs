//! The zero-subtree cache.

use crate::node::Node;
use crate::Hash256;
use eth2_hashing::hash32_concat;
use lazy_static::lazy_static;
use std::sync::Arc;

/// Deepest zero subtree the caches cover. Sufficient for any 64-bit generalized
/// index.
pub const MAX_TREE_DEPTH: usize = 64;

lazy_static! {
    /// `ZERO_HASHES[depth]` is the root of a perfect tree of `2^depth` zero chunks.
    static ref ZERO_HASHES: Vec<Hash256> = {
        let mut hashes = vec![Hash256::zero()];
        for depth in 1..=MAX_TREE_DEPTH {
            let lower = hashes[depth - 1];
            hashes.push(Hash256::from(hash32_concat(
                lower.as_bytes(),
                lower.as_bytes(),
            )));
        }
        hashes
    };

    /// `ZERO_NODES[depth]` is a fully traversable zero subtree of the given depth.
    /// Every level shares a single node, so the whole table is `MAX_TREE_DEPTH + 1`
    /// allocations.
    static ref ZERO_NODES: Vec<Arc<Node>> = {
        let mut nodes = vec![Node::leaf(Hash256::zero())];
        for depth in 1..=MAX_TREE_DEPTH {
            let child = nodes[depth - 1].clone();
            nodes.push(Node::pair_with_root(child.clone(), child, zero_hash(depth)));
        }
        nodes
    };
}

/// The root of a perfect binary tree of `2^depth` zero chunks.
pub fn zero_hash(depth: usize) -> Hash256 {
    if depth <= MAX_TREE_DEPTH {
        ZERO_HASHES[depth]
    } else {
        panic!("tree exceeds MAX_TREE_DEPTH of {}", MAX_TREE_DEPTH)
    }
}

/// A zero subtree of the given depth. Shared: repeated calls return the same nodes.
pub fn zero_node(depth: u32) -> Arc<Node> {
    let depth = depth as usize;
    if depth <= MAX_TREE_DEPTH {
        ZERO_NODES[depth].clone()
    } else {
        panic!("tree exceeds MAX_TREE_DEPTH of {}", MAX_TREE_DEPTH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_chain() {
        assert_eq!(zero_hash(0), Hash256::zero());

        for depth in 1..=MAX_TREE_DEPTH {
            let lower = zero_hash(depth - 1);
            assert_eq!(
                zero_hash(depth),
                Hash256::from(hash32_concat(lower.as_bytes(), lower.as_bytes()))
            );
        }
    }

    #[test]
    fn nodes_match_hashes() {
        for depth in 0..=8 {
            assert_eq!(zero_node(depth).root(), zero_hash(depth as usize));
        }
    }

    #[test]
    fn nodes_are_shared() {
        assert!(Arc::ptr_eq(&zero_node(5), &zero_node(5)));
    }
}
