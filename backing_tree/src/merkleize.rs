//! Padded merkleization and root mix-ins.

use crate::gindex::get_depth;
use crate::zero::zero_hash;
use crate::{Hash256, BYTES_PER_CHUNK};
use eth2_hashing::hash32_concat;

/// The Merkle root of `chunks` padded with zero chunks up to the next power of
/// two of `limit` leaves.
///
/// `chunks.len()` must not exceed `limit`. A limit of zero yields the zero chunk.
pub fn merkleize(chunks: &[Hash256], limit: u64) -> Hash256 {
    debug_assert!(chunks.len() as u64 <= limit.max(1));
    merkleize_level(chunks, get_depth(limit))
}

fn merkleize_level(chunks: &[Hash256], depth: u32) -> Hash256 {
    if chunks.is_empty() {
        return zero_hash(depth as usize);
    }
    if depth == 0 {
        return chunks[0];
    }
    let pivot = 1usize << (depth - 1);
    let left = merkleize_level(&chunks[..chunks.len().min(pivot)], depth - 1);
    let right = if chunks.len() > pivot {
        merkleize_level(&chunks[pivot..], depth - 1)
    } else {
        zero_hash(depth as usize - 1)
    };
    Hash256::from(hash32_concat(left.as_bytes(), right.as_bytes()))
}

/// `H(root || u256_le(length))`: the length mix-in applied above list contents.
pub fn mix_in_length(root: &Hash256, length: u64) -> Hash256 {
    let mut length_chunk = [0; BYTES_PER_CHUNK];
    length_chunk[..8].copy_from_slice(&length.to_le_bytes());
    Hash256::from(hash32_concat(root.as_bytes(), &length_chunk))
}

/// `H(root || u256_le(selector))`: the selector mix-in applied above a union value.
pub fn mix_in_selector(root: &Hash256, selector: u8) -> Hash256 {
    let mut selector_chunk = [0; BYTES_PER_CHUNK];
    selector_chunk[0] = selector;
    Hash256::from(hash32_concat(root.as_bytes(), &selector_chunk))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;
    use crate::subtree::subtree_fill_to_contents;

    fn chunk(byte: u8) -> Hash256 {
        Hash256::from([byte; 32])
    }

    #[test]
    fn zero_limit_is_zero_chunk() {
        assert_eq!(merkleize(&[], 0), Hash256::zero());
    }

    #[test]
    fn single_chunk_is_its_own_root() {
        assert_eq!(merkleize(&[chunk(3)], 1), chunk(3));
    }

    #[test]
    fn empty_chunks_merkleize_to_zero_hashes() {
        assert_eq!(merkleize(&[], 1), zero_hash(0));
        assert_eq!(merkleize(&[], 4), zero_hash(2));
        assert_eq!(merkleize(&[], 5), zero_hash(3));
    }

    #[test]
    fn pads_to_next_power_of_two() {
        let chunks = [chunk(1), chunk(2), chunk(3)];

        let h01 = hash32_concat(chunks[0].as_bytes(), chunks[1].as_bytes());
        let h23 = hash32_concat(chunks[2].as_bytes(), zero_hash(0).as_bytes());
        let expected = Hash256::from(hash32_concat(&h01, &h23));

        assert_eq!(merkleize(&chunks, 4), expected);
        // Limits 3 and 4 address the same power-of-two tree.
        assert_eq!(merkleize(&chunks, 3), expected);
    }

    #[test]
    fn agrees_with_tree_construction() {
        let chunks: Vec<Hash256> = (1..=5).map(chunk).collect();
        let nodes: Vec<_> = chunks.iter().map(|c| Node::leaf(*c)).collect();
        let tree = subtree_fill_to_contents(&nodes, get_depth(8)).unwrap();

        assert_eq!(merkleize(&chunks, 8), tree.root());
    }

    #[test]
    fn length_mix_in() {
        let root = chunk(42);
        let mut length_chunk = [0; BYTES_PER_CHUNK];
        length_chunk[0] = 42;
        assert_eq!(
            mix_in_length(&root, 42),
            Hash256::from(hash32_concat(root.as_bytes(), &length_chunk))
        );
    }

    #[test]
    fn selector_mix_in_matches_length_encoding() {
        // Both mix-ins append a `u256_le` chunk; equal operands hash equally.
        assert_eq!(mix_in_length(&chunk(1), 7), mix_in_selector(&chunk(1), 7));
    }
}
