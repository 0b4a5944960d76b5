//! Byte-level helpers for the SimpleSerialize (SSZ) wire format.
//!
//! Adheres to the Ethereum [SSZ
//! specification](https://github.com/ethereum/consensus-specs/blob/dev/ssz/simple-serialize.md).
//!
//! This crate knows nothing about types or Merkle trees: it splits and joins
//! the fixed/variable sections of an SSZ object and validates offset tables.
//! Callers describe each item with an [`ItemLayout`] and drive the rest.

mod decode;
mod encode;

pub use decode::{split_composite, split_variable_length_items, DecodeError, ItemLayout};
pub use encode::{encode_length, SszEncoder};

/// The number of bytes used to represent an offset.
pub const BYTES_PER_LENGTH_OFFSET: usize = 4;
/// The maximum value that can be represented using `BYTES_PER_LENGTH_OFFSET`.
pub const MAX_LENGTH_VALUE: usize = u32::MAX as usize;

/// The number of bytes used to indicate the variant of a union.
pub const BYTES_PER_UNION_SELECTOR: usize = 1;
/// The highest possible union selector value (higher values are reserved for
/// backwards compatible extensions).
pub const MAX_UNION_SELECTOR: u8 = 127;
