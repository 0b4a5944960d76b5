use crate::error::{Error, Result};
use crate::partial::VirtualSource;
use crate::{Hash256, BYTES_PER_CHUNK, LEFT_GINDEX, RIGHT_GINDEX};
use eth2_hashing::hash32_concat;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// A node in an immutable binary Merkle tree.
///
/// Every variant can report its 32-byte root. `Pair` computes the root once, on
/// first demand; the cache never invalidates because nodes never change.
pub enum Node {
    /// A terminal chunk of data. The root *is* the chunk.
    Leaf(Hash256),
    /// An interior node owning both subtrees; `root = H(left.root || right.root)`.
    Pair {
        left: Arc<Node>,
        right: Arc<Node>,
        root: OnceLock<Hash256>,
    },
    /// A known root whose children are fetched on demand from a [`VirtualSource`].
    /// Fetched children are memoized. Used for partial (proof-backed) trees.
    Virtual {
        root: Hash256,
        source: Arc<dyn VirtualSource>,
        left: OnceLock<Arc<Node>>,
        right: OnceLock<Arc<Node>>,
    },
    /// A known root with no recoverable children: a collapsed summary or a
    /// terminal proof leaf. Traversing into it fails.
    Root(Hash256),
}

impl Node {
    pub fn leaf(chunk: Hash256) -> Arc<Node> {
        Arc::new(Node::Leaf(chunk))
    }

    /// A leaf whose chunk starts with `bytes`, zero-padded to 32 bytes.
    ///
    /// `bytes` must not exceed `BYTES_PER_CHUNK`.
    pub fn leaf_from_bytes(bytes: &[u8]) -> Arc<Node> {
        let mut chunk = [0; BYTES_PER_CHUNK];
        chunk[..bytes.len()].copy_from_slice(bytes);
        Node::leaf(Hash256::from(chunk))
    }

    pub fn pair(left: Arc<Node>, right: Arc<Node>) -> Arc<Node> {
        Arc::new(Node::Pair {
            left,
            right,
            root: OnceLock::new(),
        })
    }

    /// A pair whose root is already known, seeding the cache.
    pub(crate) fn pair_with_root(left: Arc<Node>, right: Arc<Node>, root: Hash256) -> Arc<Node> {
        let cell = OnceLock::new();
        let _ = cell.set(root);
        Arc::new(Node::Pair {
            left,
            right,
            root: cell,
        })
    }

    pub fn virtual_node(root: Hash256, source: Arc<dyn VirtualSource>) -> Arc<Node> {
        Arc::new(Node::Virtual {
            root,
            source,
            left: OnceLock::new(),
            right: OnceLock::new(),
        })
    }

    pub fn root_only(root: Hash256) -> Arc<Node> {
        Arc::new(Node::Root(root))
    }

    /// `true` for nodes with no traversable children.
    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf(_) | Node::Root(_))
    }

    /// The 32-byte Merkle root of this subtree.
    pub fn root(&self) -> Hash256 {
        match self {
            Node::Leaf(chunk) => *chunk,
            Node::Pair { left, right, root } => *root.get_or_init(|| {
                Hash256::from(hash32_concat(
                    left.root().as_bytes(),
                    right.root().as_bytes(),
                ))
            }),
            Node::Virtual { root, .. } => *root,
            Node::Root(root) => *root,
        }
    }

    /// The left (`go_right = false`) or right child of this node.
    ///
    /// Virtual children are resolved through the source and memoized; a source
    /// without data for this branch yields `PartialBacking`. Leaves yield
    /// `Navigation` and summaries `PartialBacking`.
    pub fn child(&self, go_right: bool) -> Result<Arc<Node>> {
        match self {
            Node::Pair { left, right, .. } => {
                Ok(if go_right { right.clone() } else { left.clone() })
            }
            Node::Virtual {
                root,
                source,
                left,
                right,
            } => {
                let cell = if go_right { right } else { left };
                if let Some(resolved) = cell.get() {
                    return Ok(resolved.clone());
                }
                let fetched = if go_right {
                    source.get_right(root)
                } else {
                    source.get_left(root)
                }
                .ok_or(Error::PartialBacking { root: *root })?;
                Ok(cell.get_or_init(|| fetched).clone())
            }
            Node::Leaf(_) => Err(Error::Navigation {
                gindex: if go_right { RIGHT_GINDEX } else { LEFT_GINDEX },
            }),
            Node::Root(root) => Err(Error::PartialBacking { root: *root }),
        }
    }

    pub fn left(&self) -> Result<Arc<Node>> {
        self.child(false)
    }

    pub fn right(&self) -> Result<Arc<Node>> {
        self.child(true)
    }
}

/// Nodes compare by root: structurally shared subtrees are equal by definition,
/// and distinct trees with equal contents hash identically.
impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.root() == other.root()
    }
}

impl Eq for Node {}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Node::Leaf(chunk) => write!(f, "Leaf({:?})", chunk),
            Node::Pair { root, .. } => match root.get() {
                Some(root) => write!(f, "Pair({:?})", root),
                None => write!(f, "Pair(<root not yet computed>)"),
            },
            Node::Virtual { root, .. } => write!(f, "Virtual({:?})", root),
            Node::Root(root) => write!(f, "Root({:?})", root),
        }
    }
}
