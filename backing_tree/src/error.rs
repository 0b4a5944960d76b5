use crate::{Gindex, Hash256};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Navigation stepped into a leaf or used a generalized index below the root.
    Navigation { gindex: Gindex },
    /// Traversal entered a branch the backing does not carry: a root-only summary,
    /// or a virtual node whose source has no data for it.
    PartialBacking { root: Hash256 },
    /// A subtree constructor was handed more nodes than fit at the requested depth.
    Capacity { depth: u32, count: u64 },
}

pub type Result<T> = std::result::Result<T, Error>;
