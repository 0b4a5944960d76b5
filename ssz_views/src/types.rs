//! Runtime SSZ type descriptors.
//!
//! A descriptor is a plain value: it knows its Merkle layout (depth, chunk
//! limit, default backing), its serialization bounds, and how to hand out
//! element/field types. Views and the codec are driven entirely by
//! descriptors, so new composite types are built declaratively rather than
//! through derive machinery.

use crate::error::{Error, Result};
use backing_tree::{
    get_depth, subtree_fill_to_contents, subtree_fill_to_length, zero_node, Node,
    BYTES_PER_CHUNK,
};
use ssz_codec::{BYTES_PER_LENGTH_OFFSET, BYTES_PER_UNION_SELECTOR, MAX_UNION_SELECTOR};
use std::fmt;
use std::sync::Arc;

/// Bits within a chunk, the packing granularity of bitfields.
pub(crate) const BITS_PER_CHUNK: usize = BYTES_PER_CHUNK * 8;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UintSize {
    U8,
    U16,
    U32,
    U64,
    U128,
    U256,
}

impl UintSize {
    pub const fn byte_len(self) -> usize {
        match self {
            UintSize::U8 => 1,
            UintSize::U16 => 2,
            UintSize::U32 => 4,
            UintSize::U64 => 8,
            UintSize::U128 => 16,
            UintSize::U256 => 32,
        }
    }

    fn name(self) -> &'static str {
        match self {
            UintSize::U8 => "uint8",
            UintSize::U16 => "uint16",
            UintSize::U32 => "uint32",
            UintSize::U64 => "uint64",
            UintSize::U128 => "uint128",
            UintSize::U256 => "uint256",
        }
    }
}

/// An ordered container field table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContainerType {
    pub name: String,
    pub fields: Vec<(String, SszType)>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VectorType {
    pub elem: SszType,
    pub length: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListType {
    pub elem: SszType,
    pub limit: usize,
}

/// Union variants; index 0 is always the `None` variant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnionType {
    pub variants: Vec<Option<SszType>>,
}

/// An SSZ type descriptor.
///
/// Descriptors compare structurally, so two independently built identical
/// types are interchangeable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SszType {
    Bool,
    Uint(UintSize),
    Container(Arc<ContainerType>),
    Vector(Arc<VectorType>),
    List(Arc<ListType>),
    Bitvector(usize),
    Bitlist(usize),
    ByteVector(usize),
    ByteList(usize),
    Union(Arc<UnionType>),
}

impl SszType {
    pub fn boolean() -> SszType {
        SszType::Bool
    }

    pub fn uint8() -> SszType {
        SszType::Uint(UintSize::U8)
    }

    pub fn uint16() -> SszType {
        SszType::Uint(UintSize::U16)
    }

    pub fn uint32() -> SszType {
        SszType::Uint(UintSize::U32)
    }

    pub fn uint64() -> SszType {
        SszType::Uint(UintSize::U64)
    }

    pub fn uint128() -> SszType {
        SszType::Uint(UintSize::U128)
    }

    pub fn uint256() -> SszType {
        SszType::Uint(UintSize::U256)
    }

    pub fn vector(elem: SszType, length: usize) -> Result<SszType> {
        if length == 0 {
            return Err(Error::InvalidType("vector length must be positive".into()));
        }
        Ok(SszType::Vector(Arc::new(VectorType { elem, length })))
    }

    pub fn list(elem: SszType, limit: usize) -> SszType {
        SszType::List(Arc::new(ListType { elem, limit }))
    }

    pub fn bitvector(bit_len: usize) -> Result<SszType> {
        if bit_len == 0 {
            return Err(Error::InvalidType(
                "bitvector length must be positive".into(),
            ));
        }
        Ok(SszType::Bitvector(bit_len))
    }

    pub fn bitlist(bit_limit: usize) -> SszType {
        SszType::Bitlist(bit_limit)
    }

    pub fn byte_vector(length: usize) -> Result<SszType> {
        if length == 0 {
            return Err(Error::InvalidType(
                "byte-vector length must be positive".into(),
            ));
        }
        Ok(SszType::ByteVector(length))
    }

    pub fn byte_list(limit: usize) -> SszType {
        SszType::ByteList(limit)
    }

    /// A union over `variants`; index 0 must be `None` and every other variant a
    /// concrete type. At least two variants are required and at most
    /// `MAX_UNION_SELECTOR + 1` are representable on the wire.
    pub fn union(variants: Vec<Option<SszType>>) -> Result<SszType> {
        if variants.len() < 2 {
            return Err(Error::InvalidType(
                "union requires at least 2 variants".into(),
            ));
        }
        if variants.len() > MAX_UNION_SELECTOR as usize + 1 {
            return Err(Error::InvalidType(format!(
                "union has {} variants, max selector is {}",
                variants.len(),
                MAX_UNION_SELECTOR
            )));
        }
        if variants[0].is_some() {
            return Err(Error::InvalidType("union variant 0 must be None".into()));
        }
        if variants[1..].iter().any(Option::is_none) {
            return Err(Error::InvalidType(
                "only union variant 0 may be None".into(),
            ));
        }
        Ok(SszType::Union(Arc::new(UnionType { variants })))
    }

    pub fn container(name: &str) -> ContainerBuilder {
        ContainerBuilder {
            name: name.into(),
            base: None,
            fields: vec![],
        }
    }

    pub fn is_basic(&self) -> bool {
        matches!(self, SszType::Bool | SszType::Uint(_))
    }

    /// Byte width of a basic type; `None` for composites.
    pub(crate) fn basic_len(&self) -> Option<usize> {
        match self {
            SszType::Bool => Some(1),
            SszType::Uint(size) => Some(size.byte_len()),
            _ => None,
        }
    }

    pub fn is_fixed_size(&self) -> bool {
        self.fixed_size().is_some()
    }

    /// The exact serialized length of fixed-size types; `None` for
    /// variable-size types.
    pub fn fixed_size(&self) -> Option<usize> {
        match self {
            SszType::Bool => Some(1),
            SszType::Uint(size) => Some(size.byte_len()),
            SszType::Container(c) => c
                .fields
                .iter()
                .map(|(_, ty)| ty.fixed_size())
                .sum::<Option<usize>>(),
            SszType::Vector(v) => v.elem.fixed_size().map(|size| size * v.length),
            SszType::Bitvector(n) => Some((n + 7) / 8),
            SszType::ByteVector(n) => Some(*n),
            SszType::List(_) | SszType::Bitlist(_) | SszType::ByteList(_) | SszType::Union(_) => {
                None
            }
        }
    }

    pub fn min_byte_length(&self) -> usize {
        match self.fixed_size() {
            Some(size) => size,
            None => match self {
                SszType::Container(c) => c
                    .fields
                    .iter()
                    .map(|(_, ty)| match ty.fixed_size() {
                        Some(size) => size,
                        None => BYTES_PER_LENGTH_OFFSET + ty.min_byte_length(),
                    })
                    .sum(),
                SszType::Vector(v) => {
                    (BYTES_PER_LENGTH_OFFSET + v.elem.min_byte_length()) * v.length
                }
                SszType::List(_) | SszType::ByteList(_) => 0,
                // The delimiting bit always needs one byte.
                SszType::Bitlist(_) => 1,
                SszType::Union(_) => BYTES_PER_UNION_SELECTOR,
                _ => unreachable!("basic types are fixed-size"),
            },
        }
    }

    pub fn max_byte_length(&self) -> usize {
        match self.fixed_size() {
            Some(size) => size,
            None => match self {
                SszType::Container(c) => c
                    .fields
                    .iter()
                    .map(|(_, ty)| match ty.fixed_size() {
                        Some(size) => size,
                        None => BYTES_PER_LENGTH_OFFSET + ty.max_byte_length(),
                    })
                    .sum(),
                SszType::Vector(v) => {
                    (BYTES_PER_LENGTH_OFFSET + v.elem.max_byte_length()) * v.length
                }
                SszType::List(l) => match l.elem.fixed_size() {
                    Some(size) => size * l.limit,
                    None => (BYTES_PER_LENGTH_OFFSET + l.elem.max_byte_length()) * l.limit,
                },
                SszType::Bitlist(limit) => limit / 8 + 1,
                SszType::ByteList(limit) => *limit,
                SszType::Union(u) => {
                    BYTES_PER_UNION_SELECTOR
                        + u.variants
                            .iter()
                            .map(|v| v.as_ref().map_or(0, SszType::max_byte_length))
                            .max()
                            .expect("unions have at least two variants")
                }
                _ => unreachable!("basic types are fixed-size"),
            },
        }
    }

    /// How many elements pack into one chunk, for collections whose elements
    /// share chunks.
    pub(crate) fn packing_factor(&self) -> Option<usize> {
        match self {
            SszType::Vector(v) => v.elem.basic_len().map(|size| BYTES_PER_CHUNK / size),
            SszType::List(l) => l.elem.basic_len().map(|size| BYTES_PER_CHUNK / size),
            SszType::ByteVector(_) | SszType::ByteList(_) => Some(BYTES_PER_CHUNK),
            SszType::Bitvector(_) | SszType::Bitlist(_) => Some(BITS_PER_CHUNK),
            _ => None,
        }
    }

    /// Leaves of the contents tree (excluding any length mix-in level).
    pub(crate) fn chunk_limit(&self) -> u64 {
        fn chunks(items: usize, per_chunk: usize) -> u64 {
            ((items as u128 + per_chunk as u128 - 1) / per_chunk as u128) as u64
        }

        match self {
            SszType::Bool | SszType::Uint(_) => 1,
            SszType::Container(c) => c.fields.len() as u64,
            SszType::Vector(v) => match v.elem.basic_len() {
                Some(size) => chunks(v.length, BYTES_PER_CHUNK / size),
                None => v.length as u64,
            },
            SszType::List(l) => match l.elem.basic_len() {
                Some(size) => chunks(l.limit, BYTES_PER_CHUNK / size),
                None => l.limit as u64,
            },
            SszType::Bitvector(n) => chunks(*n, BITS_PER_CHUNK),
            SszType::Bitlist(limit) => chunks(*limit, BITS_PER_CHUNK),
            SszType::ByteVector(n) => chunks(*n, BYTES_PER_CHUNK),
            SszType::ByteList(limit) => chunks(*limit, BYTES_PER_CHUNK),
            SszType::Union(_) => 1,
        }
    }

    /// Depth of the contents tree, below any length mix-in level.
    pub(crate) fn contents_depth(&self) -> u32 {
        get_depth(self.chunk_limit())
    }

    /// `true` for types whose backing pairs contents with a length leaf.
    pub(crate) fn has_length_mixin(&self) -> bool {
        matches!(
            self,
            SszType::List(_) | SszType::Bitlist(_) | SszType::ByteList(_)
        )
    }

    /// Full depth of the backing tree: leaf positions sit at
    /// `to_gindex(i, depth)`.
    pub(crate) fn depth(&self) -> u32 {
        match self {
            SszType::Union(_) => 1,
            _ if self.has_length_mixin() => self.contents_depth() + 1,
            _ => self.contents_depth(),
        }
    }

    /// Static element count, for types whose length is part of the type.
    pub(crate) fn static_len(&self) -> Option<usize> {
        match self {
            SszType::Container(c) => Some(c.fields.len()),
            SszType::Vector(v) => Some(v.length),
            SszType::Bitvector(n) | SszType::ByteVector(n) => Some(*n),
            _ => None,
        }
    }

    /// Declared limit, for length-mixed collections.
    pub(crate) fn limit(&self) -> Option<usize> {
        match self {
            SszType::List(l) => Some(l.limit),
            SszType::Bitlist(limit) | SszType::ByteList(limit) => Some(*limit),
            _ => None,
        }
    }

    /// The type of the element or field at position `i`.
    pub(crate) fn elem_type(&self, i: usize) -> Result<SszType> {
        match self {
            SszType::Container(c) => c
                .fields
                .get(i)
                .map(|(_, ty)| ty.clone())
                .ok_or(Error::OutOfBounds {
                    i,
                    len: c.fields.len(),
                }),
            SszType::Vector(v) => Ok(v.elem.clone()),
            SszType::List(l) => Ok(l.elem.clone()),
            SszType::ByteVector(_) | SszType::ByteList(_) => Ok(SszType::uint8()),
            SszType::Bitvector(_) | SszType::Bitlist(_) => Ok(SszType::Bool),
            _ => Err(Error::type_mismatch("indexable type", self)),
        }
    }

    /// The default (all-zero) backing for a value of this type.
    pub fn default_node(&self) -> Arc<Node> {
        match self {
            SszType::Bool | SszType::Uint(_) => zero_node(0),
            SszType::Container(c) => {
                let fields: Vec<_> = c.fields.iter().map(|(_, ty)| ty.default_node()).collect();
                subtree_fill_to_contents(&fields, self.depth())
                    .expect("container depth fits its field count")
            }
            SszType::Vector(v) => match v.elem.basic_len() {
                Some(_) => zero_node(self.depth()),
                None => {
                    subtree_fill_to_length(v.elem.default_node(), self.depth(), v.length as u64)
                        .expect("vector depth fits its length")
                }
            },
            SszType::Bitvector(_) | SszType::ByteVector(_) => zero_node(self.depth()),
            SszType::List(_) | SszType::Bitlist(_) | SszType::ByteList(_) => {
                Node::pair(zero_node(self.contents_depth()), zero_node(0))
            }
            SszType::Union(u) => {
                let value = match &u.variants[0] {
                    Some(ty) => ty.default_node(),
                    None => zero_node(0),
                };
                Node::pair(value, zero_node(0))
            }
        }
    }
}

impl fmt::Display for SszType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SszType::Bool => write!(f, "boolean"),
            SszType::Uint(size) => write!(f, "{}", size.name()),
            SszType::Container(c) => write!(f, "{}", c.name),
            SszType::Vector(v) => write!(f, "Vector[{}, {}]", v.elem, v.length),
            SszType::List(l) => write!(f, "List[{}, {}]", l.elem, l.limit),
            SszType::Bitvector(n) => write!(f, "Bitvector[{}]", n),
            SszType::Bitlist(limit) => write!(f, "Bitlist[{}]", limit),
            SszType::ByteVector(n) => write!(f, "ByteVector[{}]", n),
            SszType::ByteList(limit) => write!(f, "ByteList[{}]", limit),
            SszType::Union(u) => {
                write!(f, "Union[")?;
                for (i, variant) in u.variants.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    match variant {
                        Some(ty) => write!(f, "{}", ty)?,
                        None => write!(f, "None")?,
                    }
                }
                write!(f, "]")
            }
        }
    }
}

impl ContainerType {
    /// Position and type of the named field.
    pub fn field_index(&self, name: &str) -> Option<(usize, &SszType)> {
        self.fields
            .iter()
            .position(|(field, _)| field == name)
            .map(|i| (i, &self.fields[i].1))
    }
}

/// Declarative container construction: ordered fields, unique names, optional
/// single-level inheritance appending the base's fields first.
pub struct ContainerBuilder {
    name: String,
    base: Option<Arc<ContainerType>>,
    fields: Vec<(String, SszType)>,
}

impl ContainerBuilder {
    /// Inherit `base`'s fields; they precede any fields declared here.
    pub fn extends(mut self, base: &SszType) -> Result<ContainerBuilder> {
        match base {
            SszType::Container(c) => {
                self.base = Some(c.clone());
                Ok(self)
            }
            other => Err(Error::type_mismatch("container base", other)),
        }
    }

    pub fn field(mut self, name: &str, ty: SszType) -> ContainerBuilder {
        self.fields.push((name.into(), ty));
        self
    }

    pub fn build(self) -> Result<SszType> {
        let mut fields: Vec<(String, SszType)> = self
            .base
            .as_ref()
            .map(|base| base.fields.clone())
            .unwrap_or_default();
        fields.extend(self.fields);

        if fields.is_empty() {
            return Err(Error::InvalidType(format!(
                "container {} has no fields",
                self.name
            )));
        }
        for (i, (name, _)) in fields.iter().enumerate() {
            if fields[..i].iter().any(|(other, _)| other == name) {
                return Err(Error::InvalidType(format!(
                    "container {} re-declares field {}",
                    self.name, name
                )));
            }
        }

        Ok(SszType::Container(Arc::new(ContainerType {
            name: self.name,
            fields,
        })))
    }
}
