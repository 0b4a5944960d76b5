//! Typed views over tree backings.
//!
//! A [`View`] is a thin façade: a type descriptor plus a pointer to a backing
//! node. Mutation never changes a node; it computes a rebound tree, swaps the
//! view's pointer, and notifies the optional hook so a parent view can rebind
//! the child's position in its own backing and propagate upward.

use crate::error::{Error, Result};
use crate::types::{SszType, BITS_PER_CHUNK};
use backing_tree::{
    to_gindex, zero_node, Gindex, Hash256, Node, Subtree, BYTES_PER_CHUNK, LEFT_GINDEX,
    RIGHT_GINDEX, ROOT_GINDEX,
};
use ethereum_types::U256;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

/// Invoked with the view's new backing after every mutation.
pub(crate) type Hook = Rc<dyn Fn(&Arc<Node>) -> Result<()>>;

struct Backing {
    node: Arc<Node>,
    hook: Option<Hook>,
}

/// A typed, mutable view over an immutable tree backing.
///
/// Cloning a view aliases it: both handles share the same backing pointer, so a
/// mutation through one is visible through the other. Use [`View::copy`] for a
/// detached value. Views are single-threaded; the trees they point at are
/// freely shareable.
#[derive(Clone)]
pub struct View {
    ty: SszType,
    inner: Rc<RefCell<Backing>>,
}

impl View {
    pub fn from_backing(ty: SszType, node: Arc<Node>) -> View {
        Self::with_hook(ty, node, None)
    }

    pub(crate) fn with_hook(ty: SszType, node: Arc<Node>, hook: Option<Hook>) -> View {
        View {
            ty,
            inner: Rc::new(RefCell::new(Backing { node, hook })),
        }
    }

    pub fn ty(&self) -> &SszType {
        &self.ty
    }

    pub fn backing(&self) -> Arc<Node> {
        self.inner.borrow().node.clone()
    }

    pub fn hash_tree_root(&self) -> Hash256 {
        self.backing().root()
    }

    /// A detached copy: same backing, no hook, independent of this view.
    pub fn copy(&self) -> View {
        View::from_backing(self.ty.clone(), self.backing())
    }

    /// Swap in a new backing and propagate it through the hook, if any.
    pub(crate) fn set_backing(&self, node: Arc<Node>) -> Result<()> {
        let hook = {
            let mut backing = self.inner.borrow_mut();
            backing.node = node.clone();
            backing.hook.clone()
        };
        match hook {
            Some(hook) => hook(&node),
            None => Ok(()),
        }
    }

    /// Install `hook` on this view, replacing any present. Root-level views
    /// only: a sub-view's hook is what ties it to its parent.
    pub(crate) fn install_hook(&self, hook: Hook) {
        self.inner.borrow_mut().hook = Some(hook);
    }

    /// A hook that rebinds this view's backing at `gindex` and propagates.
    fn rebind_hook(&self, gindex: Gindex) -> Hook {
        let inner = Rc::clone(&self.inner);
        Rc::new(move |child: &Arc<Node>| {
            let (node, hook) = {
                let mut backing = inner.borrow_mut();
                let rebound = backing.node.setter(gindex, child.clone())?;
                backing.node = rebound.clone();
                (rebound, backing.hook.clone())
            };
            match hook {
                Some(hook) => hook(&node),
                None => Ok(()),
            }
        })
    }

    /// A sub-view of the subtree at `gindex`, hooked back into this view.
    fn subview(&self, ty: SszType, gindex: Gindex) -> Result<View> {
        let node = self.backing().getter(gindex)?;
        Ok(View::with_hook(ty, node, Some(self.rebind_hook(gindex))))
    }
}

/// Basic values.
impl View {
    pub fn boolean(value: bool) -> View {
        View::from_backing(SszType::Bool, Node::leaf_from_bytes(&[value as u8]))
    }

    pub fn uint8(value: u8) -> View {
        View::from_backing(SszType::uint8(), Node::leaf_from_bytes(&[value]))
    }

    pub fn uint16(value: u16) -> View {
        View::from_backing(SszType::uint16(), Node::leaf_from_bytes(&value.to_le_bytes()))
    }

    pub fn uint32(value: u32) -> View {
        View::from_backing(SszType::uint32(), Node::leaf_from_bytes(&value.to_le_bytes()))
    }

    pub fn uint64(value: u64) -> View {
        View::from_backing(SszType::uint64(), Node::leaf_from_bytes(&value.to_le_bytes()))
    }

    pub fn uint128(value: u128) -> View {
        View::from_backing(
            SszType::uint128(),
            Node::leaf_from_bytes(&value.to_le_bytes()),
        )
    }

    pub fn uint256(value: U256) -> View {
        let mut bytes = [0; BYTES_PER_CHUNK];
        value.to_little_endian(&mut bytes);
        View::from_backing(SszType::uint256(), Node::leaf_from_bytes(&bytes))
    }

    fn expect_ty(&self, expected: &SszType) -> Result<()> {
        if &self.ty == expected {
            Ok(())
        } else {
            Err(Error::type_mismatch(expected, &self.ty))
        }
    }

    fn basic_bytes(&self) -> Result<[u8; BYTES_PER_CHUNK]> {
        chunk_bytes(&self.backing(), ROOT_GINDEX)
    }

    pub fn as_bool(&self) -> Result<bool> {
        self.expect_ty(&SszType::Bool)?;
        match self.basic_bytes()?[0] {
            0 => Ok(false),
            1 => Ok(true),
            byte => Err(Error::InvalidBoolean(byte)),
        }
    }

    pub fn as_u8(&self) -> Result<u8> {
        self.expect_ty(&SszType::uint8())?;
        Ok(self.basic_bytes()?[0])
    }

    pub fn as_u16(&self) -> Result<u16> {
        self.expect_ty(&SszType::uint16())?;
        let bytes = self.basic_bytes()?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub fn as_u32(&self) -> Result<u32> {
        self.expect_ty(&SszType::uint32())?;
        let bytes = self.basic_bytes()?;
        let mut buf = [0; 4];
        buf.copy_from_slice(&bytes[..4]);
        Ok(u32::from_le_bytes(buf))
    }

    pub fn as_u64(&self) -> Result<u64> {
        self.expect_ty(&SszType::uint64())?;
        let bytes = self.basic_bytes()?;
        let mut buf = [0; 8];
        buf.copy_from_slice(&bytes[..8]);
        Ok(u64::from_le_bytes(buf))
    }

    pub fn as_u128(&self) -> Result<u128> {
        self.expect_ty(&SszType::uint128())?;
        let bytes = self.basic_bytes()?;
        let mut buf = [0; 16];
        buf.copy_from_slice(&bytes[..16]);
        Ok(u128::from_le_bytes(buf))
    }

    pub fn as_u256(&self) -> Result<U256> {
        self.expect_ty(&SszType::uint256())?;
        Ok(U256::from_little_endian(&self.basic_bytes()?))
    }
}

/// Collection and container access.
impl View {
    /// Element/field count: static for vectors, containers, bitvectors and
    /// byte-vectors; read from the length leaf for the length-mixed types.
    pub fn len(&self) -> Result<usize> {
        if let Some(len) = self.ty.static_len() {
            return Ok(len);
        }
        if self.ty.has_length_mixin() {
            return Ok(read_length(&self.backing())? as usize);
        }
        Err(Error::type_mismatch("collection or container", &self.ty))
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// The element or field at `i`.
    ///
    /// Composite elements come back hooked: mutating the sub-view rebinds this
    /// view (and its ancestors). Basic elements of packed collections are
    /// immutable value views; write them back with [`View::set`].
    pub fn get(&self, i: usize) -> Result<View> {
        let len = self.len()?;
        if i >= len {
            return Err(Error::OutOfBounds { i, len });
        }
        match &self.ty {
            SszType::Bitvector(_) | SszType::Bitlist(_) => {
                Ok(View::boolean(self.read_bit(i)?))
            }
            _ => match self.ty.packing_factor() {
                Some(factor) => {
                    let elem = self.ty.elem_type(i)?;
                    let size = BYTES_PER_CHUNK / factor;
                    let chunk =
                        chunk_bytes(&self.backing(), to_gindex((i / factor) as u64, self.ty.depth()))?;
                    let bytes = &chunk[(i % factor) * size..][..size];
                    Ok(View::from_backing(elem, Node::leaf_from_bytes(bytes)))
                }
                None => {
                    let elem = self.ty.elem_type(i)?;
                    self.subview(elem, to_gindex(i as u64, self.ty.depth()))
                }
            },
        }
    }

    /// Replace the element or field at `i` with `value`, rebinding upward.
    pub fn set(&self, i: usize, value: &View) -> Result<()> {
        let len = self.len()?;
        if i >= len {
            return Err(Error::OutOfBounds { i, len });
        }
        let elem = self.ty.elem_type(i)?;
        value.expect_ty(&elem)?;
        match &self.ty {
            SszType::Bitvector(_) | SszType::Bitlist(_) => {
                self.write_bit(i, value.as_bool()?)
            }
            _ => match self.ty.packing_factor() {
                Some(factor) => {
                    let size = BYTES_PER_CHUNK / factor;
                    let gindex = to_gindex((i / factor) as u64, self.ty.depth());
                    let mut chunk = chunk_bytes(&self.backing(), gindex)?;
                    chunk[(i % factor) * size..][..size]
                        .copy_from_slice(&value.basic_bytes_unchecked()?[..size]);
                    let next = self.backing().setter(gindex, Node::leaf(chunk.into()))?;
                    self.set_backing(next)
                }
                None => {
                    let gindex = to_gindex(i as u64, self.ty.depth());
                    let next = self.backing().setter(gindex, value.backing())?;
                    self.set_backing(next)
                }
            },
        }
    }

    /// The named container field, hooked for write-through.
    pub fn field(&self, name: &str) -> Result<View> {
        let (i, _) = self.field_position(name)?;
        self.get(i)
    }

    pub fn set_field(&self, name: &str, value: &View) -> Result<()> {
        let (i, _) = self.field_position(name)?;
        self.set(i, value)
    }

    fn field_position(&self, name: &str) -> Result<(usize, SszType)> {
        match &self.ty {
            SszType::Container(c) => c
                .field_index(name)
                .map(|(i, ty)| (i, ty.clone()))
                .ok_or_else(|| Error::UnknownField(name.into())),
            other => Err(Error::type_mismatch("container", other)),
        }
    }

    /// Append to a list, byte-list or bitlist.
    pub fn append(&self, value: &View) -> Result<()> {
        let limit = self
            .ty
            .limit()
            .ok_or_else(|| Error::type_mismatch("list, byte-list or bitlist", &self.ty))?;
        let len = self.len()?;
        if len >= limit {
            return Err(Error::ListFull { limit });
        }
        let elem = self.ty.elem_type(len)?;
        value.expect_ty(&elem)?;
        let depth = self.ty.depth();

        let next = match &self.ty {
            SszType::Bitlist(_) => {
                let gindex = to_gindex((len / BITS_PER_CHUNK) as u64, depth);
                let mut chunk = if len % BITS_PER_CHUNK == 0 {
                    [0; BYTES_PER_CHUNK]
                } else {
                    chunk_bytes(&self.backing(), gindex)?
                };
                set_bit_in_chunk(&mut chunk, len % BITS_PER_CHUNK, value.as_bool()?);
                self.backing().expand_into(gindex, Node::leaf(chunk.into()))?
            }
            _ => match self.ty.packing_factor() {
                Some(factor) => {
                    let size = BYTES_PER_CHUNK / factor;
                    let gindex = to_gindex((len / factor) as u64, depth);
                    let mut chunk = if len % factor == 0 {
                        [0; BYTES_PER_CHUNK]
                    } else {
                        chunk_bytes(&self.backing(), gindex)?
                    };
                    chunk[(len % factor) * size..][..size]
                        .copy_from_slice(&value.basic_bytes_unchecked()?[..size]);
                    self.backing().expand_into(gindex, Node::leaf(chunk.into()))?
                }
                None => self
                    .backing()
                    .expand_into(to_gindex(len as u64, depth), value.backing())?,
            },
        };
        let next = next.setter(RIGHT_GINDEX, length_leaf(len as u64 + 1))?;
        self.set_backing(next)
    }

    /// Remove the last element, zero-filling the vacated position so the
    /// resulting root is deterministic.
    pub fn pop(&self) -> Result<()> {
        if self.ty.limit().is_none() {
            return Err(Error::type_mismatch("list, byte-list or bitlist", &self.ty));
        }
        let len = self.len()?;
        let i = len.checked_sub(1).ok_or(Error::OutOfBounds { i: 0, len: 0 })?;
        let depth = self.ty.depth();

        let next = match &self.ty {
            SszType::Bitlist(_) => {
                let gindex = to_gindex((i / BITS_PER_CHUNK) as u64, depth);
                if i % BITS_PER_CHUNK == 0 {
                    self.backing().setter(gindex, zero_node(0))?
                } else {
                    let mut chunk = chunk_bytes(&self.backing(), gindex)?;
                    set_bit_in_chunk(&mut chunk, i % BITS_PER_CHUNK, false);
                    self.backing().setter(gindex, Node::leaf(chunk.into()))?
                }
            }
            _ => match self.ty.packing_factor() {
                Some(factor) => {
                    let size = BYTES_PER_CHUNK / factor;
                    let gindex = to_gindex((i / factor) as u64, depth);
                    if i % factor == 0 {
                        self.backing().setter(gindex, zero_node(0))?
                    } else {
                        let mut chunk = chunk_bytes(&self.backing(), gindex)?;
                        chunk[(i % factor) * size..][..size].fill(0);
                        self.backing().setter(gindex, Node::leaf(chunk.into()))?
                    }
                }
                None => self
                    .backing()
                    .setter(to_gindex(i as u64, depth), zero_node(0))?,
            },
        };
        let next = next.setter(RIGHT_GINDEX, length_leaf(i as u64))?;
        self.set_backing(next)
    }

    fn read_bit(&self, i: usize) -> Result<bool> {
        let chunk = chunk_bytes(
            &self.backing(),
            to_gindex((i / BITS_PER_CHUNK) as u64, self.ty.depth()),
        )?;
        let bit = i % BITS_PER_CHUNK;
        Ok(chunk[bit / 8] & (1 << (bit % 8)) != 0)
    }

    fn write_bit(&self, i: usize, value: bool) -> Result<()> {
        let gindex = to_gindex((i / BITS_PER_CHUNK) as u64, self.ty.depth());
        let mut chunk = chunk_bytes(&self.backing(), gindex)?;
        set_bit_in_chunk(&mut chunk, i % BITS_PER_CHUNK, value);
        let next = self.backing().setter(gindex, Node::leaf(chunk.into()))?;
        self.set_backing(next)
    }

    /// Basic-value bytes without a type check, for packed writes.
    fn basic_bytes_unchecked(&self) -> Result<[u8; BYTES_PER_CHUNK]> {
        chunk_bytes(&self.backing(), ROOT_GINDEX)
    }
}

/// Union access.
impl View {
    fn union_ty(&self) -> Result<&Arc<crate::types::UnionType>> {
        match &self.ty {
            SszType::Union(u) => Ok(u),
            other => Err(Error::type_mismatch("union", other)),
        }
    }

    /// The active variant selector.
    pub fn selector(&self) -> Result<u8> {
        let union = self.union_ty()?.clone();
        read_selector(&self.backing(), &union)
    }

    /// The type of the active variant; `None` when the `None` variant is
    /// selected.
    pub fn selected_type(&self) -> Result<Option<SszType>> {
        let union = self.union_ty()?.clone();
        let selector = self.selector()?;
        Ok(union.variants[selector as usize].clone())
    }

    /// The selected value as a hooked sub-view; `None` for the `None` variant.
    pub fn selected(&self) -> Result<Option<View>> {
        let union = self.union_ty()?.clone();
        let selector = self.selector()?;
        match &union.variants[selector as usize] {
            Some(ty) => Ok(Some(self.subview(ty.clone(), LEFT_GINDEX)?)),
            None => Ok(None),
        }
    }

    /// Atomically switch to `selector` carrying `value`. The `None` variant
    /// takes no value; every other variant requires one of its exact type.
    pub fn change(&self, selector: u8, value: Option<&View>) -> Result<()> {
        let union = self.union_ty()?.clone();
        let variant = union
            .variants
            .get(selector as usize)
            .ok_or_else(|| {
                Error::type_mismatch(format!("selector below {}", union.variants.len()), selector)
            })?;
        let value_node = match (variant, value) {
            (None, None) => zero_node(0),
            (Some(ty), Some(value)) => {
                value.expect_ty(ty)?;
                value.backing()
            }
            (None, Some(_)) => {
                return Err(Error::type_mismatch("no value for None variant", "value"))
            }
            (Some(ty), None) => return Err(Error::type_mismatch(ty, "no value")),
        };
        self.set_backing(Node::pair(value_node, Node::leaf_from_bytes(&[selector])))
    }
}

/// Views compare by type and root, like the backings they project.
impl PartialEq for View {
    fn eq(&self, other: &Self) -> bool {
        self.ty == other.ty && self.hash_tree_root() == other.hash_tree_root()
    }
}

impl Eq for View {}

impl fmt::Debug for View {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "View<{}>({:?})", self.ty, self.hash_tree_root())
    }
}

impl SszType {
    /// The default (all-zero) value of this type.
    pub fn default_view(&self) -> View {
        View::from_backing(self.clone(), self.default_node())
    }
}

/// The chunk at `gindex`, which must be a terminal node. A branch there means
/// the backing does not match the type's layout.
pub(crate) fn chunk_bytes(backing: &Arc<Node>, gindex: Gindex) -> Result<[u8; BYTES_PER_CHUNK]> {
    let node = backing.getter(gindex)?;
    if node.is_leaf() {
        Ok(node.root().to_fixed_bytes())
    } else {
        Err(Error::Navigation { gindex })
    }
}

fn set_bit_in_chunk(chunk: &mut [u8; BYTES_PER_CHUNK], bit: usize, value: bool) {
    if value {
        chunk[bit / 8] |= 1 << (bit % 8);
    } else {
        chunk[bit / 8] &= !(1 << (bit % 8));
    }
}

pub(crate) fn length_leaf(length: u64) -> Arc<Node> {
    Node::leaf_from_bytes(&length.to_le_bytes())
}

/// The value of a length-mixed type's length leaf.
pub(crate) fn read_length(backing: &Arc<Node>) -> Result<u64> {
    let chunk = chunk_bytes(backing, RIGHT_GINDEX)?;
    let mut buf = [0; 8];
    buf.copy_from_slice(&chunk[..8]);
    Ok(u64::from_le_bytes(buf))
}

/// The selector leaf of a union backing, validated against the variant set.
pub(crate) fn read_selector(
    backing: &Arc<Node>,
    union: &crate::types::UnionType,
) -> Result<u8> {
    let chunk = chunk_bytes(backing, RIGHT_GINDEX)?;
    if chunk[1..].iter().any(|byte| *byte != 0) {
        return Err(Error::type_mismatch("one-byte union selector", "wide integer"));
    }
    let selector = chunk[0];
    if selector as usize >= union.variants.len() {
        return Err(Error::type_mismatch(
            format!("selector below {}", union.variants.len()),
            selector,
        ));
    }
    Ok(selector)
}
