use backing_tree::{Gindex, Hash256};
use ssz_codec::DecodeError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Out-of-range element access.
    OutOfBounds { i: usize, len: usize },
    /// Append past the declared list limit.
    ListFull { limit: usize },
    /// A boolean byte other than `0x00` or `0x01`.
    InvalidBoolean(u8),
    /// Malformed bitfield bytes: nonzero padding, or a missing/overflowing
    /// delimiter bit.
    InvalidBitfield(&'static str),
    /// An offset-table or length violation while decoding.
    Decode(DecodeError),
    /// A fixed-size value was given bytes of the wrong length.
    LengthMismatch { len: usize, expected: usize },
    /// Object conversion met a key that is not a field of the container.
    UnknownField(String),
    /// Object conversion is missing a required container field.
    MissingField(String),
    /// Wrong value type for a typed position, an out-of-range union variant, or
    /// a malformed object representation.
    TypeMismatch { expected: String, found: String },
    /// Declarative type construction rejected the definition.
    InvalidType(String),
    /// A path or tree traversal stepped into a leaf or past a terminal node.
    Navigation { gindex: Gindex },
    /// Traversal entered a subtree the backing does not carry.
    PartialBacking { root: Hash256 },
    /// Writer failure during streaming serialization.
    Io(String),
}

impl Error {
    pub(crate) fn type_mismatch<E: ToString, F: ToString>(expected: E, found: F) -> Error {
        Error::TypeMismatch {
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }
}

impl From<backing_tree::Error> for Error {
    fn from(e: backing_tree::Error) -> Error {
        match e {
            backing_tree::Error::Navigation { gindex } => Error::Navigation { gindex },
            backing_tree::Error::PartialBacking { root } => Error::PartialBacking { root },
            backing_tree::Error::Capacity { depth, count } => Error::InvalidType(format!(
                "{} nodes exceed subtree capacity at depth {}",
                count, depth
            )),
        }
    }
}

impl From<DecodeError> for Error {
    fn from(e: DecodeError) -> Error {
        Error::Decode(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
