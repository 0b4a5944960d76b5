//! Typed, mutable views over cached, structurally-shared, immutable binary
//! Merkle trees, implementing the Ethereum SimpleSerialize (SSZ) type system.
//!
//! Types are runtime descriptor values ([`SszType`]); every value is a thin
//! [`View`] over a [`backing_tree::Node`]. Mutation computes a rebound tree and
//! propagates it upward through hooks, sharing every untouched subtree, so
//! hash-tree-roots of large, mostly-stable values stay cheap.
//!
//! ## Example
//!
//! ```rust
//! use ssz_views::{SszType, View};
//!
//! let checkpoint = SszType::container("Checkpoint")
//!     .field("epoch", SszType::uint64())
//!     .field("root", SszType::byte_vector(32).unwrap())
//!     .build()
//!     .unwrap();
//!
//! let value = checkpoint.default_view();
//! value.set_field("epoch", &View::uint64(42)).unwrap();
//!
//! let bytes = value.encode_bytes().unwrap();
//! let decoded = View::decode_bytes(&checkpoint, &bytes).unwrap();
//! assert_eq!(decoded.hash_tree_root(), value.hash_tree_root());
//! ```

mod codec;
mod error;
mod history;
mod obj;
mod path;
mod types;
mod view;

pub use error::{Error, Result};
pub use history::{target_history, History};
pub use path::{apply_path, Path, PathElement};
pub use types::{ContainerBuilder, ContainerType, ListType, SszType, UintSize, UnionType, VectorType};
pub use view::View;
