//! Serialization and deserialization, driven by type descriptors.
//!
//! Encoding walks a backing tree directly; decoding validates the wire bytes
//! first and then builds a backing bottom-up, so the new value's root is only
//! computed if somebody asks for it.

use crate::error::{Error, Result};
use crate::types::SszType;
use crate::view::{chunk_bytes, length_leaf, read_length, read_selector, View};
use backing_tree::{
    subtree_fill_to_contents, to_gindex, zero_node, Node, Subtree, BYTES_PER_CHUNK, LEFT_GINDEX,
    ROOT_GINDEX,
};
use ssz_codec::{
    split_composite, split_variable_length_items, DecodeError, ItemLayout, SszEncoder,
    BYTES_PER_LENGTH_OFFSET, BYTES_PER_UNION_SELECTOR,
};
use std::io::{Read, Write};
use std::sync::Arc;

impl View {
    /// The canonical SSZ encoding of this value.
    pub fn encode_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = vec![];
        encode_node(self.ty(), &self.backing(), &mut buf)?;
        Ok(buf)
    }

    /// Stream the canonical encoding into `writer`, returning the byte count.
    pub fn serialize<W: Write>(&self, writer: &mut W) -> Result<usize> {
        let bytes = self.encode_bytes()?;
        writer
            .write_all(&bytes)
            .map_err(|e| Error::Io(e.to_string()))?;
        Ok(bytes.len())
    }

    /// The exact encoded length, without serializing.
    pub fn byte_length(&self) -> Result<usize> {
        byte_length_node(self.ty(), &self.backing())
    }

    /// Decode a value of type `ty` from `bytes`, which must span it exactly.
    pub fn decode_bytes(ty: &SszType, bytes: &[u8]) -> Result<View> {
        Ok(View::from_backing(ty.clone(), decode_node(ty, bytes)?))
    }

    /// Read exactly `scope` bytes from `reader` and decode them as `ty`.
    pub fn deserialize<R: Read>(ty: &SszType, reader: &mut R, scope: usize) -> Result<View> {
        let mut bytes = vec![0; scope];
        reader
            .read_exact(&mut bytes)
            .map_err(|e| Error::Io(e.to_string()))?;
        Self::decode_bytes(ty, &bytes)
    }
}

fn encode_node(ty: &SszType, node: &Arc<Node>, buf: &mut Vec<u8>) -> Result<()> {
    match ty {
        SszType::Bool | SszType::Uint(_) => {
            let size = ty.fixed_size().expect("basic types are fixed-size");
            let chunk = chunk_bytes(node, ROOT_GINDEX)?;
            buf.extend_from_slice(&chunk[..size]);
            Ok(())
        }
        SszType::Container(c) => {
            let types: Vec<&SszType> = c.fields.iter().map(|(_, fty)| fty).collect();
            encode_composite(node, ty.depth(), &types, buf)
        }
        SszType::Vector(v) => match v.elem.basic_len() {
            Some(size) => {
                let bytes = read_packed(node, ty.depth(), v.length * size)?;
                buf.extend_from_slice(&bytes);
                Ok(())
            }
            None => {
                let types = vec![&v.elem; v.length];
                encode_composite(node, ty.depth(), &types, buf)
            }
        },
        SszType::List(l) => {
            let len = read_length(node)? as usize;
            match l.elem.basic_len() {
                Some(size) => {
                    let bytes = read_packed(node, ty.depth(), len * size)?;
                    buf.extend_from_slice(&bytes);
                    Ok(())
                }
                None => {
                    let types = vec![&l.elem; len];
                    encode_composite(node, ty.depth(), &types, buf)
                }
            }
        }
        SszType::Bitvector(n) => {
            let bytes = read_packed(node, ty.depth(), (n + 7) / 8)?;
            buf.extend_from_slice(&bytes);
            Ok(())
        }
        SszType::Bitlist(_) => {
            let len = read_length(node)? as usize;
            let mut bytes = read_packed(node, ty.depth(), (len + 7) / 8)?;
            bytes.resize(len / 8 + 1, 0);
            bytes[len / 8] |= 1 << (len % 8);
            buf.extend_from_slice(&bytes);
            Ok(())
        }
        SszType::ByteVector(n) => {
            let bytes = read_packed(node, ty.depth(), *n)?;
            buf.extend_from_slice(&bytes);
            Ok(())
        }
        SszType::ByteList(_) => {
            let len = read_length(node)? as usize;
            let bytes = read_packed(node, ty.depth(), len)?;
            buf.extend_from_slice(&bytes);
            Ok(())
        }
        SszType::Union(u) => {
            let selector = read_selector(node, u)?;
            buf.push(selector);
            match &u.variants[selector as usize] {
                Some(variant) => encode_node(variant, &node.getter(LEFT_GINDEX)?, buf),
                None => Ok(()),
            }
        }
    }
}

/// Two-pass encoding of a composite's children, one type per child position.
fn encode_composite(
    node: &Arc<Node>,
    depth: u32,
    types: &[&SszType],
    buf: &mut Vec<u8>,
) -> Result<()> {
    let fixed_len = types
        .iter()
        .map(|ty| ty.fixed_size().unwrap_or(BYTES_PER_LENGTH_OFFSET))
        .sum();
    let mut encoder = SszEncoder::container(buf, fixed_len);
    for (i, child_ty) in types.iter().enumerate() {
        let child = node.getter(to_gindex(i as u64, depth))?;
        let mut bytes = vec![];
        encode_node(child_ty, &child, &mut bytes)?;
        if child_ty.is_fixed_size() {
            encoder.append_fixed(&bytes);
        } else {
            encoder.append_variable(&bytes);
        }
    }
    encoder.finalize();
    Ok(())
}

/// Concatenated chunk data: the first `byte_len` bytes of the contents leaves.
fn read_packed(node: &Arc<Node>, depth: u32, byte_len: usize) -> Result<Vec<u8>> {
    let chunks = (byte_len + BYTES_PER_CHUNK - 1) / BYTES_PER_CHUNK;
    let mut bytes = Vec::with_capacity(chunks * BYTES_PER_CHUNK);
    for i in 0..chunks {
        bytes.extend_from_slice(&chunk_bytes(node, to_gindex(i as u64, depth))?);
    }
    bytes.truncate(byte_len);
    Ok(bytes)
}

fn byte_length_node(ty: &SszType, node: &Arc<Node>) -> Result<usize> {
    if let Some(size) = ty.fixed_size() {
        return Ok(size);
    }
    match ty {
        SszType::Container(c) => {
            let mut total = 0;
            for (i, (_, fty)) in c.fields.iter().enumerate() {
                total += match fty.fixed_size() {
                    Some(size) => size,
                    None => {
                        let child = node.getter(to_gindex(i as u64, ty.depth()))?;
                        BYTES_PER_LENGTH_OFFSET + byte_length_node(fty, &child)?
                    }
                };
            }
            Ok(total)
        }
        SszType::Vector(v) => {
            let mut total = 0;
            for i in 0..v.length {
                let child = node.getter(to_gindex(i as u64, ty.depth()))?;
                total += BYTES_PER_LENGTH_OFFSET + byte_length_node(&v.elem, &child)?;
            }
            Ok(total)
        }
        SszType::List(l) => {
            let len = read_length(node)? as usize;
            match l.elem.fixed_size() {
                Some(size) => Ok(len * size),
                None => {
                    let mut total = 0;
                    for i in 0..len {
                        let child = node.getter(to_gindex(i as u64, ty.depth()))?;
                        total += BYTES_PER_LENGTH_OFFSET + byte_length_node(&l.elem, &child)?;
                    }
                    Ok(total)
                }
            }
        }
        SszType::Bitlist(_) => Ok(read_length(node)? as usize / 8 + 1),
        SszType::ByteList(_) => Ok(read_length(node)? as usize),
        SszType::Union(u) => {
            let selector = read_selector(node, u)?;
            Ok(BYTES_PER_UNION_SELECTOR
                + match &u.variants[selector as usize] {
                    Some(variant) => byte_length_node(variant, &node.getter(LEFT_GINDEX)?)?,
                    None => 0,
                })
        }
        _ => unreachable!("remaining types are fixed-size"),
    }
}

fn decode_node(ty: &SszType, bytes: &[u8]) -> Result<Arc<Node>> {
    if let Some(expected) = ty.fixed_size() {
        if bytes.len() != expected {
            return Err(Error::LengthMismatch {
                len: bytes.len(),
                expected,
            });
        }
    }
    match ty {
        SszType::Bool => match bytes[0] {
            byte @ (0 | 1) => Ok(Node::leaf_from_bytes(&[byte])),
            byte => Err(Error::InvalidBoolean(byte)),
        },
        SszType::Uint(_) => Ok(Node::leaf_from_bytes(bytes)),
        SszType::Container(c) => {
            let layouts: Vec<ItemLayout> = c.fields.iter().map(|(_, fty)| layout_of(fty)).collect();
            let items = split_composite(bytes, &layouts)?;
            let mut children = Vec::with_capacity(c.fields.len());
            for ((_, fty), item) in c.fields.iter().zip(items) {
                children.push(decode_node(fty, item)?);
            }
            Ok(subtree_fill_to_contents(&children, ty.depth())?)
        }
        SszType::Vector(v) => match v.elem.basic_len() {
            Some(_) => {
                validate_packed_booleans(&v.elem, bytes)?;
                packed_contents(bytes, ty.depth())
            }
            None => {
                let children = match v.elem.fixed_size() {
                    // Scope was prechecked to `length * size`.
                    Some(size) => decode_each(&v.elem, bytes.chunks(size))?,
                    None => {
                        // An offset per element; a wrong element count shows up
                        // as a misplaced first offset.
                        let items =
                            split_composite(bytes, &vec![ItemLayout::Variable; v.length])?;
                        decode_each(&v.elem, items.into_iter())?
                    }
                };
                Ok(subtree_fill_to_contents(&children, ty.depth())?)
            }
        },
        SszType::List(l) => {
            let contents_depth = ty.contents_depth();
            match l.elem.basic_len() {
                Some(size) => {
                    if bytes.len() % size != 0 {
                        return Err(Error::Decode(DecodeError::InvalidByteLength {
                            len: bytes.len(),
                            expected: bytes.len() - bytes.len() % size,
                        }));
                    }
                    let count = bytes.len() / size;
                    check_limit(count, l.limit)?;
                    validate_packed_booleans(&l.elem, bytes)?;
                    Ok(Node::pair(
                        packed_contents(bytes, contents_depth)?,
                        length_leaf(count as u64),
                    ))
                }
                None => {
                    let children = match l.elem.fixed_size() {
                        Some(size) => {
                            if bytes.len() % size != 0 {
                                return Err(Error::Decode(DecodeError::InvalidByteLength {
                                    len: bytes.len(),
                                    expected: bytes.len() - bytes.len() % size,
                                }));
                            }
                            decode_each(&l.elem, bytes.chunks(size))?
                        }
                        None => decode_each(&l.elem, split_variable_length_items(bytes)?.into_iter())?,
                    };
                    check_limit(children.len(), l.limit)?;
                    let count = children.len() as u64;
                    Ok(Node::pair(
                        subtree_fill_to_contents(&children, contents_depth)?,
                        length_leaf(count),
                    ))
                }
            }
        }
        SszType::Bitvector(n) => {
            // Scope was prechecked to `ceil(n / 8)`.
            if n % 8 != 0 && bytes[bytes.len() - 1] >> (n % 8) != 0 {
                return Err(Error::InvalidBitfield(
                    "padding bits above the bitvector length must be zero",
                ));
            }
            packed_contents(bytes, ty.depth())
        }
        SszType::Bitlist(limit) => {
            let last = match bytes.last().copied() {
                Some(0) | None => {
                    return Err(Error::InvalidBitfield("bitlist requires a delimiting bit"))
                }
                Some(last) => last,
            };
            let high_bit = 7 - last.leading_zeros() as usize;
            let bit_len = (bytes.len() - 1) * 8 + high_bit;
            if bit_len > *limit {
                return Err(Error::InvalidBitfield("bitlist is longer than its limit"));
            }
            let mut content = bytes.to_vec();
            let last_index = content.len() - 1;
            content[last_index] ^= 1 << high_bit;
            content.truncate((bit_len + 7) / 8);
            Ok(Node::pair(
                packed_contents(&content, ty.contents_depth())?,
                length_leaf(bit_len as u64),
            ))
        }
        SszType::ByteVector(_) => packed_contents(bytes, ty.depth()),
        SszType::ByteList(limit) => {
            check_limit(bytes.len(), *limit)?;
            Ok(Node::pair(
                packed_contents(bytes, ty.contents_depth())?,
                length_leaf(bytes.len() as u64),
            ))
        }
        SszType::Union(u) => {
            let selector = bytes
                .first()
                .copied()
                .ok_or(Error::Decode(DecodeError::InvalidByteLength {
                    len: 0,
                    expected: BYTES_PER_UNION_SELECTOR,
                }))?;
            // Variant counts are capped at `MAX_UNION_SELECTOR + 1` when the
            // type is built, so this also rejects the reserved selector range.
            if selector as usize >= u.variants.len() {
                return Err(Error::Decode(DecodeError::UnionSelectorInvalid(selector)));
            }
            let body = &bytes[BYTES_PER_UNION_SELECTOR..];
            match &u.variants[selector as usize] {
                None => {
                    if !body.is_empty() {
                        return Err(Error::Decode(DecodeError::InvalidByteLength {
                            len: bytes.len(),
                            expected: BYTES_PER_UNION_SELECTOR,
                        }));
                    }
                    Ok(Node::pair(zero_node(0), zero_node(0)))
                }
                Some(variant) => Ok(Node::pair(
                    decode_node(variant, body)?,
                    Node::leaf_from_bytes(&[selector]),
                )),
            }
        }
    }
}

fn decode_each<'a>(
    ty: &SszType,
    items: impl Iterator<Item = &'a [u8]>,
) -> Result<Vec<Arc<Node>>> {
    items.map(|item| decode_node(ty, item)).collect()
}

fn layout_of(ty: &SszType) -> ItemLayout {
    match ty.fixed_size() {
        Some(len) => ItemLayout::Fixed(len),
        None => ItemLayout::Variable,
    }
}

/// Packed boolean collections still require canonical `0x00`/`0x01` bytes.
fn validate_packed_booleans(elem: &SszType, bytes: &[u8]) -> Result<()> {
    if matches!(elem, SszType::Bool) {
        if let Some(byte) = bytes.iter().find(|byte| **byte > 1) {
            return Err(Error::InvalidBoolean(*byte));
        }
    }
    Ok(())
}

fn check_limit(count: usize, limit: usize) -> Result<()> {
    if count > limit {
        Err(Error::Decode(DecodeError::BytesInvalid(format!(
            "{} items exceed the list limit {}",
            count, limit
        ))))
    } else {
        Ok(())
    }
}

/// Pack raw bytes into chunk leaves and build the contents tree.
fn packed_contents(bytes: &[u8], depth: u32) -> Result<Arc<Node>> {
    let chunks: Vec<Arc<Node>> = bytes
        .chunks(BYTES_PER_CHUNK)
        .map(Node::leaf_from_bytes)
        .collect();
    Ok(subtree_fill_to_contents(&chunks, depth)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(view: &View) {
        let encoded = view.encode_bytes().unwrap();
        assert_eq!(view.byte_length().unwrap(), encoded.len());
        let decoded = View::decode_bytes(view.ty(), &encoded).unwrap();
        assert_eq!(&decoded, view);
    }

    #[test]
    fn uint64_wire_format() {
        let view = View::uint64(1);
        assert_eq!(view.encode_bytes().unwrap(), vec![1, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(
            View::decode_bytes(&SszType::uint64(), &[1, 0, 0, 0, 0, 0, 0, 0])
                .unwrap()
                .as_u64()
                .unwrap(),
            1
        );
        round_trip(&view);
    }

    #[test]
    fn uint_scope_is_exact() {
        assert_eq!(
            View::decode_bytes(&SszType::uint32(), &[1, 0, 0]).err(),
            Some(Error::LengthMismatch {
                len: 3,
                expected: 4
            })
        );
    }

    #[test]
    fn boolean_wire_format() {
        assert_eq!(View::boolean(true).encode_bytes().unwrap(), vec![1]);
        assert_eq!(View::boolean(false).encode_bytes().unwrap(), vec![0]);
        assert_eq!(
            View::decode_bytes(&SszType::Bool, &[2]).err(),
            Some(Error::InvalidBoolean(2))
        );
    }

    #[test]
    fn packed_list_wire_format() {
        let ty = SszType::list(SszType::uint16(), 4);
        let list = ty.default_view();
        list.append(&View::uint16(1)).unwrap();
        list.append(&View::uint16(2)).unwrap();

        assert_eq!(list.encode_bytes().unwrap(), vec![1, 0, 2, 0]);
        round_trip(&list);
    }

    #[test]
    fn list_decode_respects_limit() {
        let ty = SszType::list(SszType::uint16(), 2);
        assert!(matches!(
            View::decode_bytes(&ty, &[1, 0, 2, 0, 3, 0]).err(),
            Some(Error::Decode(DecodeError::BytesInvalid(_)))
        ));
    }

    #[test]
    fn list_decode_rejects_ragged_bytes() {
        let ty = SszType::list(SszType::uint16(), 4);
        assert_eq!(
            View::decode_bytes(&ty, &[1, 0, 2]).err(),
            Some(Error::Decode(DecodeError::InvalidByteLength {
                len: 3,
                expected: 2
            }))
        );
    }

    #[test]
    fn fixed_container_wire_format() {
        let ty = SszType::container("Fixed")
            .field("a", SszType::uint16())
            .field("b", SszType::uint64())
            .field("c", SszType::uint32())
            .build()
            .unwrap();
        let value = ty.default_view();
        value.set_field("a", &View::uint16(1)).unwrap();
        value.set_field("b", &View::uint64(2)).unwrap();
        value.set_field("c", &View::uint32(3)).unwrap();

        assert_eq!(
            value.encode_bytes().unwrap(),
            vec![1, 0, 2, 0, 0, 0, 0, 0, 0, 0, 3, 0, 0, 0]
        );
        round_trip(&value);
    }

    #[test]
    fn variable_container_wire_format() {
        let ty = SszType::container("Variable")
            .field("a", SszType::uint8())
            .field("b", SszType::list(SszType::uint8(), 4))
            .build()
            .unwrap();
        let value = ty.default_view();
        value.set_field("a", &View::uint8(1)).unwrap();
        let b = value.field("b").unwrap();
        b.append(&View::uint8(2)).unwrap();
        b.append(&View::uint8(3)).unwrap();

        // Fixed `a`, a 4-byte offset to `b`, then `b`'s payload.
        assert_eq!(
            value.encode_bytes().unwrap(),
            vec![1, 5, 0, 0, 0, 2, 3]
        );
        round_trip(&value);
    }

    #[test]
    fn container_offset_errors_surface() {
        let ty = SszType::container("Variable")
            .field("a", SszType::uint8())
            .field("b", SszType::list(SszType::uint8(), 4))
            .build()
            .unwrap();

        assert_eq!(
            View::decode_bytes(&ty, &[1, 4, 0, 0, 0, 2, 3]).err(),
            Some(Error::Decode(DecodeError::OffsetIntoFixedPortion(4)))
        );
        assert_eq!(
            View::decode_bytes(&ty, &[1, 6, 0, 0, 0, 2, 3]).err(),
            Some(Error::Decode(DecodeError::OffsetSkipsVariableBytes(6)))
        );
    }

    #[test]
    fn bitvector_wire_format() {
        let ty = SszType::bitvector(4).unwrap();
        let bits = ty.default_view();
        bits.set(0, &View::boolean(true)).unwrap();
        bits.set(1, &View::boolean(true)).unwrap();

        assert_eq!(bits.encode_bytes().unwrap(), vec![0x03]);
        round_trip(&bits);

        // A bit set above position 3 is invalid padding.
        assert_eq!(
            View::decode_bytes(&ty, &[0x13]).err(),
            Some(Error::InvalidBitfield(
                "padding bits above the bitvector length must be zero"
            ))
        );
    }

    #[test]
    fn bitlist_wire_format() {
        let ty = SszType::bitlist(8);
        let bits = ty.default_view();
        for bit in [true, false, true] {
            bits.append(&View::boolean(bit)).unwrap();
        }

        // Bits 1 0 1 plus the delimiter at position 3.
        assert_eq!(bits.encode_bytes().unwrap(), vec![0x0d]);
        round_trip(&bits);

        assert_eq!(
            View::decode_bytes(&ty, &[0x00]).err(),
            Some(Error::InvalidBitfield("bitlist requires a delimiting bit"))
        );
        assert_eq!(
            View::decode_bytes(&ty, &[]).err(),
            Some(Error::InvalidBitfield("bitlist requires a delimiting bit"))
        );
        // Delimiter at bit 9 exceeds the 8-bit limit.
        assert_eq!(
            View::decode_bytes(&ty, &[0xff, 0x02]).err(),
            Some(Error::InvalidBitfield("bitlist is longer than its limit"))
        );
    }

    #[test]
    fn empty_bitlist_is_a_lone_delimiter() {
        let ty = SszType::bitlist(8);
        let bits = ty.default_view();
        assert_eq!(bits.encode_bytes().unwrap(), vec![0x01]);

        let decoded = View::decode_bytes(&ty, &[0x01]).unwrap();
        assert_eq!(decoded.len().unwrap(), 0);
        assert_eq!(decoded.hash_tree_root(), bits.hash_tree_root());
    }

    #[test]
    fn union_wire_format() {
        let ty = SszType::union(vec![None, Some(SszType::uint32())]).unwrap();
        let value = ty.default_view();
        value.change(1, Some(&View::uint32(7))).unwrap();

        assert_eq!(value.encode_bytes().unwrap(), vec![1, 7, 0, 0, 0]);
        round_trip(&value);

        let none = ty.default_view();
        assert_eq!(none.encode_bytes().unwrap(), vec![0]);
        round_trip(&none);

        // Selector 0 carries no payload; selector 2 does not exist.
        assert!(View::decode_bytes(&ty, &[0, 9]).is_err());
        assert_eq!(
            View::decode_bytes(&ty, &[2, 7, 0, 0, 0]).err(),
            Some(Error::Decode(DecodeError::UnionSelectorInvalid(2)))
        );
    }

    #[test]
    fn vector_of_variable_elements() {
        let elem = SszType::list(SszType::uint8(), 4);
        let ty = SszType::vector(elem.clone(), 2).unwrap();
        let value = ty.default_view();
        let first = value.get(0).unwrap();
        first.append(&View::uint8(9)).unwrap();

        // Two offsets, then the payloads: [9] and [].
        assert_eq!(value.encode_bytes().unwrap(), vec![8, 0, 0, 0, 9, 0, 0, 0, 9]);
        round_trip(&value);
    }

    #[test]
    fn byte_vector_and_byte_list() {
        let bytes_ty = SszType::byte_vector(3).unwrap();
        let value = View::decode_bytes(&bytes_ty, &[1, 2, 3]).unwrap();
        assert_eq!(value.encode_bytes().unwrap(), vec![1, 2, 3]);
        assert_eq!(value.get(2).unwrap().as_u8().unwrap(), 3);
        round_trip(&value);

        let list_ty = SszType::byte_list(5);
        let list = View::decode_bytes(&list_ty, &[4, 5]).unwrap();
        assert_eq!(list.len().unwrap(), 2);
        round_trip(&list);
        assert!(View::decode_bytes(&list_ty, &[0; 6]).is_err());
    }

    #[test]
    fn streaming_matches_buffered() {
        let ty = SszType::list(SszType::uint64(), 8);
        let list = ty.default_view();
        list.append(&View::uint64(11)).unwrap();
        list.append(&View::uint64(12)).unwrap();

        let mut buf = vec![];
        let written = list.serialize(&mut buf).unwrap();
        assert_eq!(written, buf.len());
        assert_eq!(buf, list.encode_bytes().unwrap());

        let mut reader = &buf[..];
        let decoded = View::deserialize(&ty, &mut reader, buf.len()).unwrap();
        assert_eq!(decoded, list);
    }

    #[test]
    fn decode_is_lazy_about_roots() {
        // Decoding builds the backing bottom-up; the root is only computed on
        // demand and then matches a mutation-built equivalent.
        let ty = SszType::list(SszType::uint16(), 4);
        let decoded = View::decode_bytes(&ty, &[1, 0, 2, 0]).unwrap();

        let built = ty.default_view();
        built.append(&View::uint16(1)).unwrap();
        built.append(&View::uint16(2)).unwrap();

        assert_eq!(decoded.hash_tree_root(), built.hash_tree_root());
    }
}
