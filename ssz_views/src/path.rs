//! Typed paths into values and their generalized indices.
//!
//! A path is built from a type by the same accessors the type's views expose:
//! named fields, element indices, union variants, and the length/selector
//! leaves of the mixed-in types. Each step records the child type and the local
//! generalized index; folding the locals yields the absolute position, so a
//! path works against both views and raw trees (for proof construction).

use crate::error::{Error, Result};
use crate::types::SszType;
use crate::view::View;
use backing_tree::{
    concat_gindices, gindex_depth, to_gindex, Gindex, Node, Subtree, LEFT_GINDEX, RIGHT_GINDEX,
    ROOT_GINDEX,
};
use std::fmt;
use std::sync::Arc;

/// One step of a path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PathElement {
    /// A named container field.
    Field(String),
    /// A position in a homogeneous collection.
    Index(u64),
    /// The value of the given union variant.
    Variant(u8),
    /// The length leaf of a list, byte-list or bitlist.
    Length,
    /// The selector leaf of a union.
    Selector,
}

impl From<&str> for PathElement {
    fn from(s: &str) -> PathElement {
        match s.parse::<u64>() {
            Ok(n) => PathElement::Index(n),
            Err(_) => PathElement::Field(s.into()),
        }
    }
}

impl fmt::Display for PathElement {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PathElement::Field(name) => write!(f, "{}", name),
            PathElement::Index(i) => write!(f, "{}", i),
            PathElement::Variant(k) => write!(f, "variant({})", k),
            PathElement::Length => write!(f, "length"),
            PathElement::Selector => write!(f, "selector"),
        }
    }
}

/// A validated sequence of steps from a root type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Path {
    root: SszType,
    steps: Vec<(PathElement, SszType, Gindex)>,
}

impl SszType {
    /// Start a path at this type.
    pub fn path(&self) -> Path {
        Path {
            root: self.clone(),
            steps: vec![],
        }
    }

    /// Resolve one step: the child type and the local generalized index the
    /// step addresses, relative to a value of this type.
    fn step(&self, elem: &PathElement) -> Result<(SszType, Gindex)> {
        match (self, elem) {
            (SszType::Container(c), PathElement::Field(name)) => {
                let (i, fty) = c
                    .field_index(name)
                    .ok_or_else(|| Error::UnknownField(name.clone()))?;
                Ok((fty.clone(), to_gindex(i as u64, self.depth())))
            }
            (SszType::Container(c), PathElement::Index(i)) => {
                let (_, fty) = c.fields.get(*i as usize).ok_or(Error::OutOfBounds {
                    i: *i as usize,
                    len: c.fields.len(),
                })?;
                Ok((fty.clone(), to_gindex(*i, self.depth())))
            }
            (
                SszType::Vector(_)
                | SszType::List(_)
                | SszType::Bitvector(_)
                | SszType::Bitlist(_)
                | SszType::ByteVector(_)
                | SszType::ByteList(_),
                PathElement::Index(i),
            ) => {
                let bound = self
                    .static_len()
                    .or(self.limit())
                    .expect("indexed collections have a length or limit");
                if *i >= bound as u64 {
                    return Err(Error::OutOfBounds {
                        i: *i as usize,
                        len: bound,
                    });
                }
                let elem_ty = self.elem_type(*i as usize)?;
                let position = match self.packing_factor() {
                    // Packed elements address their chunk.
                    Some(factor) => *i / factor as u64,
                    None => *i,
                };
                Ok((elem_ty, to_gindex(position, self.depth())))
            }
            (ty, PathElement::Length) if ty.has_length_mixin() => {
                Ok((SszType::uint256(), RIGHT_GINDEX))
            }
            (SszType::Union(_), PathElement::Selector) => Ok((SszType::uint256(), RIGHT_GINDEX)),
            (SszType::Union(u), PathElement::Variant(k)) => match u.variants.get(*k as usize) {
                Some(Some(vty)) => Ok((vty.clone(), LEFT_GINDEX)),
                Some(None) => Err(Error::type_mismatch("valued union variant", "None variant")),
                None => Err(Error::type_mismatch(
                    format!("selector below {}", u.variants.len()),
                    *k,
                )),
            },
            _ => Err(Error::Navigation {
                gindex: ROOT_GINDEX,
            }),
        }
    }

    /// Recover the unique path a generalized index denotes under this type.
    ///
    /// Packed collections resolve at chunk granularity: a chunk's gindex maps
    /// to the index of its first element, and bits below that are rejected.
    /// Union values cannot be descended into without the runtime selector.
    pub fn path_from_gindex(&self, gindex: Gindex) -> Result<Path> {
        if gindex < ROOT_GINDEX {
            return Err(Error::Navigation { gindex });
        }
        let mut path = self.path();
        let mut ty = self.clone();
        let mut remaining = gindex_depth(gindex);

        while remaining > 0 {
            // Peel as many levels as this type spans in one step.
            let mut take = |levels: u32| -> Result<u64> {
                if levels > remaining {
                    return Err(Error::Navigation { gindex });
                }
                remaining -= levels;
                Ok((gindex >> remaining) & ((1 << levels) - 1))
            };

            let elem = match &ty {
                SszType::Container(c) => {
                    let i = take(ty.depth())?;
                    if i as usize >= c.fields.len() {
                        return Err(Error::Navigation { gindex });
                    }
                    PathElement::Field(c.fields[i as usize].0.clone())
                }
                SszType::Vector(_) | SszType::Bitvector(_) | SszType::ByteVector(_) => {
                    let i = take(ty.depth())?;
                    PathElement::Index(chunk_start(&ty, i))
                }
                SszType::List(_) | SszType::Bitlist(_) | SszType::ByteList(_) => {
                    if take(1)? == 1 {
                        PathElement::Length
                    } else {
                        let i = take(ty.contents_depth())?;
                        PathElement::Index(chunk_start(&ty, i))
                    }
                }
                SszType::Union(_) => {
                    if take(1)? == 1 {
                        PathElement::Selector
                    } else {
                        // The value's type depends on the runtime selector.
                        return Err(Error::Navigation { gindex });
                    }
                }
                SszType::Bool | SszType::Uint(_) => {
                    return Err(Error::Navigation { gindex })
                }
            };
            path = path.then(elem)?;
            ty = path.leaf_type().clone();

            // Packed elements terminate at their chunk.
            if ty.is_basic() && remaining > 0 {
                return Err(Error::Navigation { gindex });
            }
        }
        Ok(path)
    }
}

/// The element index addressed by content leaf `i`, honoring packing.
fn chunk_start(ty: &SszType, leaf: u64) -> u64 {
    match ty.packing_factor() {
        Some(factor) => leaf * factor as u64,
        None => leaf,
    }
}

impl Path {
    /// Extend with one validated step.
    pub fn then(mut self, elem: PathElement) -> Result<Path> {
        let (child, local) = self
            .leaf_type()
            .step(&elem)
            .map_err(|e| self.at_current_position(e))?;
        self.steps.push((elem, child, local));
        Ok(self)
    }

    pub fn field(self, name: &str) -> Result<Path> {
        self.then(PathElement::Field(name.into()))
    }

    pub fn index(self, i: u64) -> Result<Path> {
        self.then(PathElement::Index(i))
    }

    pub fn variant(self, k: u8) -> Result<Path> {
        self.then(PathElement::Variant(k))
    }

    pub fn length(self) -> Result<Path> {
        self.then(PathElement::Length)
    }

    pub fn selector(self) -> Result<Path> {
        self.then(PathElement::Selector)
    }

    /// The absolute generalized index this path resolves to.
    pub fn gindex(&self) -> Gindex {
        self.steps
            .iter()
            .fold(ROOT_GINDEX, |acc, (_, _, local)| {
                concat_gindices(acc, *local)
            })
    }

    pub fn root_type(&self) -> &SszType {
        &self.root
    }

    /// The type a value at the end of this path has.
    pub fn leaf_type(&self) -> &SszType {
        self.steps.last().map(|(_, ty, _)| ty).unwrap_or(&self.root)
    }

    pub fn elements(&self) -> impl Iterator<Item = &PathElement> {
        self.steps.iter().map(|(elem, _, _)| elem)
    }

    fn at_current_position(&self, e: Error) -> Error {
        match e {
            Error::Navigation { .. } => Error::Navigation {
                gindex: self.gindex(),
            },
            other => other,
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.root)?;
        for elem in self.elements() {
            write!(f, "/{}", elem)?;
        }
        Ok(())
    }
}

/// Resolve `path` against a raw tree. Partial backings fail where the required
/// subtree is absent.
pub fn apply_path(tree: &Arc<Node>, path: &Path) -> Result<Arc<Node>> {
    Ok(tree.getter(path.gindex())?)
}

impl View {
    /// The sub-view `path` denotes, hooked through every intermediate parent so
    /// mutations of the result propagate back to this view.
    pub fn navigate(&self, path: &Path) -> Result<View> {
        if path.root_type() != self.ty() {
            return Err(Error::type_mismatch(path.root_type(), self.ty()));
        }
        let mut view = self.clone();
        for (elem, ty, local) in &path.steps {
            view = match elem {
                PathElement::Field(name) => view.field(name)?,
                PathElement::Index(i) => view.get(*i as usize)?,
                PathElement::Variant(k) => {
                    if view.selector()? != *k {
                        return Err(Error::type_mismatch(
                            format!("variant {}", k),
                            format!("variant {}", view.selector()?),
                        ));
                    }
                    view.selected()?
                        .expect("valued variants were validated by the path")
                }
                PathElement::Length | PathElement::Selector => {
                    View::from_backing(ty.clone(), view.backing().getter(*local)?)
                }
            };
        }
        Ok(view)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checkpoint() -> SszType {
        SszType::container("Checkpoint")
            .field("epoch", SszType::uint64())
            .field("root", SszType::byte_vector(32).unwrap())
            .build()
            .unwrap()
    }

    #[test]
    fn field_paths_fold_to_gindices() {
        let ty = checkpoint();
        // Two fields: depth 1, leaves at 2 and 3.
        assert_eq!(ty.path().field("epoch").unwrap().gindex(), 2);
        assert_eq!(ty.path().field("root").unwrap().gindex(), 3);
        assert_eq!(
            ty.path().field("slot").err(),
            Some(Error::UnknownField("slot".into()))
        );
    }

    #[test]
    fn nested_paths_concatenate() {
        let outer = SszType::container("Outer")
            .field("a", SszType::uint8())
            .field("b", checkpoint())
            .build()
            .unwrap();

        let path = outer.path().field("b").unwrap().field("root").unwrap();
        // b sits at 3; root within b at local 3: 3 -> 7.
        assert_eq!(path.gindex(), 7);
        assert_eq!(path.leaf_type(), &SszType::byte_vector(32).unwrap());
    }

    #[test]
    fn list_paths_address_chunks_and_length() {
        let ty = SszType::list(SszType::uint64(), 16);
        // 16 u64 are 4 chunks, contents depth 2, full depth 3.
        assert_eq!(ty.path().length().unwrap().gindex(), 3);
        // Elements 0..4 share chunk 0 at gindex 8.
        assert_eq!(ty.path().index(0).unwrap().gindex(), 8);
        assert_eq!(ty.path().index(3).unwrap().gindex(), 8);
        assert_eq!(ty.path().index(4).unwrap().gindex(), 9);
        assert_eq!(
            ty.path().index(16).err(),
            Some(Error::OutOfBounds { i: 16, len: 16 })
        );
    }

    #[test]
    fn union_paths() {
        let ty = SszType::union(vec![None, Some(SszType::uint32())]).unwrap();
        assert_eq!(ty.path().selector().unwrap().gindex(), 3);
        assert_eq!(ty.path().variant(1).unwrap().gindex(), 2);
        assert!(ty.path().variant(0).is_err());
        assert!(ty.path().variant(2).is_err());
    }

    #[test]
    fn stepping_into_a_leaf_fails() {
        let ty = checkpoint();
        let path = ty.path().field("epoch").unwrap();
        assert_eq!(
            path.field("anything").err(),
            Some(Error::Navigation { gindex: 2 })
        );
    }

    #[test]
    fn gindex_inversion() {
        let outer = SszType::container("Outer")
            .field("a", SszType::uint8())
            .field("b", checkpoint())
            .build()
            .unwrap();

        let path = outer.path().field("b").unwrap().field("epoch").unwrap();
        let recovered = outer.path_from_gindex(path.gindex()).unwrap();
        assert_eq!(recovered, path);

        // The root maps to the empty path.
        assert_eq!(outer.path_from_gindex(1).unwrap(), outer.path());

        // Descending below a leaf field is rejected.
        assert!(outer.path_from_gindex(path.gindex() * 2).is_err());
    }

    #[test]
    fn gindex_inversion_for_lists() {
        let ty = SszType::list(SszType::uint64(), 16);
        assert_eq!(
            ty.path_from_gindex(3).unwrap(),
            ty.path().length().unwrap()
        );
        // Chunk 1 starts at element 4.
        assert_eq!(
            ty.path_from_gindex(9).unwrap(),
            ty.path().index(4).unwrap()
        );
    }

    #[test]
    fn navigation_reads_and_writes_through() {
        let outer = SszType::container("Outer")
            .field("a", SszType::uint8())
            .field("b", checkpoint())
            .build()
            .unwrap();
        let value = outer.default_view();

        let path = outer.path().field("b").unwrap().field("epoch").unwrap();
        let epoch = value.navigate(&path).unwrap();
        assert_eq!(epoch.as_u64().unwrap(), 0);

        // Navigated views are hooked: writing the nested field updates the root.
        let b = value.navigate(&outer.path().field("b").unwrap()).unwrap();
        b.set_field("epoch", &View::uint64(9)).unwrap();
        assert_eq!(value.navigate(&path).unwrap().as_u64().unwrap(), 9);

        // And the backing at the path's gindex agrees with the view.
        let node = apply_path(&value.backing(), &path).unwrap();
        assert_eq!(node.root(), value.navigate(&path).unwrap().hash_tree_root());
    }

    #[test]
    fn navigation_needs_matching_root_type() {
        let ty = checkpoint();
        let other = SszType::list(SszType::uint8(), 4);
        let value = other.default_view();
        assert!(matches!(
            value.navigate(&ty.path().field("epoch").unwrap()),
            Err(Error::TypeMismatch { .. })
        ));
    }

    #[test]
    fn length_navigation_reads_the_length_leaf() {
        let ty = SszType::list(SszType::uint8(), 16);
        let list = ty.default_view();
        list.append(&View::uint8(1)).unwrap();
        list.append(&View::uint8(2)).unwrap();

        let length = list.navigate(&ty.path().length().unwrap()).unwrap();
        assert_eq!(
            length.as_u256().unwrap(),
            ethereum_types::U256::from(2)
        );
    }
}
