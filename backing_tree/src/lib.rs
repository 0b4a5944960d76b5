//! Immutable binary Merkle trees with lazily cached roots and structural sharing.
//!
//! A tree is an [`Arc<Node>`]: a leaf carrying a 32-byte chunk, a pair of subtrees, a
//! virtual node that resolves its children on demand from a [`VirtualSource`], or a
//! root-only summary with no recoverable children. Nodes never mutate; "mutation" is
//! the [`Subtree::setter`] operation, which returns a new tree sharing every subtree
//! off the rewritten path with the original.
//!
//! Positions are addressed by generalized index: the root is `1` and the children of
//! `g` are `2g` and `2g + 1`.

mod diff;
mod error;
mod gindex;
mod iter;
mod merkleize;
mod node;
mod partial;
mod subtree;
mod zero;

pub use diff::{tree_diff, TreeDiff};
pub use error::{Error, Result};
pub use gindex::{anchor_gindex, concat_gindices, gindex_depth, get_depth, to_gindex};
pub use iter::{leaf_iter, LeafIter};
pub use merkleize::{merkleize, mix_in_length, mix_in_selector};
pub use node::Node;
pub use partial::{MemorySource, VirtualSource};
pub use subtree::{
    subtree_fill_to_contents, subtree_fill_to_depth, subtree_fill_to_length, Subtree,
};
pub use zero::{zero_hash, zero_node, MAX_TREE_DEPTH};

pub type Hash256 = ethereum_types::H256;

/// Position of a node in a binary Merkle tree: root is `1`, children of `g` are
/// `2g` and `2g + 1`.
pub type Gindex = u64;

pub const BYTES_PER_CHUNK: usize = 32;

pub const ROOT_GINDEX: Gindex = 1;
pub const LEFT_GINDEX: Gindex = 2;
pub const RIGHT_GINDEX: Gindex = 3;
