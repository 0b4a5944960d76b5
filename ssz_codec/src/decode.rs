//! Splitting SSZ composites into per-item slices.
//!
//! A composite serializes as a fixed section (fixed-size items inline, a
//! 4-byte offset per variable-size item) followed by the variable payloads in
//! order. Decoding reverses that: the caller describes the layout of each item
//! and gets back one byte slice per item. The offset table is validated
//! against the SSZ rules before any slice is handed out: the first offset
//! must land exactly at the end of the fixed section, offsets never decrease,
//! and no offset escapes the buffer.

use crate::BYTES_PER_LENGTH_OFFSET;
use smallvec::SmallVec;

type SmallVec8<T> = SmallVec<[T; 8]>;

/// Returned when SSZ decoding fails.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum DecodeError {
    /// The buffer is shorter or longer than the layout allows.
    InvalidByteLength { len: usize, expected: usize },
    /// An offset points back into the fixed section, double-decoding bytes.
    OffsetIntoFixedPortion(usize),
    /// The first offset leaves a gap after the fixed section.
    OffsetSkipsVariableBytes(usize),
    /// An offset is smaller than the one before it.
    OffsetsAreDecreasing(usize),
    /// An offset points past the end of the buffer.
    OffsetOutOfBounds(usize),
    /// A homogeneous sequence's offset table is empty or not a whole number of
    /// offsets.
    InvalidListFixedBytesLen(usize),
    /// The union selector byte does not name a variant.
    UnionSelectorInvalid(u8),
    /// The bytes were invalid for an application-level reason.
    BytesInvalid(String),
}

/// How one item of a composite sits in the fixed section.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ItemLayout {
    /// Serialized inline, occupying exactly this many bytes.
    Fixed(usize),
    /// Serialized behind an offset, payload in the variable section.
    Variable,
}

impl ItemLayout {
    /// Bytes this item contributes to the fixed section.
    fn fixed_len(self) -> usize {
        match self {
            ItemLayout::Fixed(len) => len,
            ItemLayout::Variable => BYTES_PER_LENGTH_OFFSET,
        }
    }
}

/// Split a composite into one slice per item, in layout order.
///
/// Purely fixed layouts must consume the buffer exactly; layouts with variable
/// items claim the remainder of the buffer through their offsets.
pub fn split_composite<'a>(
    bytes: &'a [u8],
    layouts: &[ItemLayout],
) -> Result<Vec<&'a [u8]>, DecodeError> {
    let fixed_len = layouts.iter().map(|layout| layout.fixed_len()).sum();
    if bytes.len() < fixed_len {
        return Err(DecodeError::InvalidByteLength {
            len: bytes.len(),
            expected: fixed_len,
        });
    }

    // One walk over the fixed section: fixed items slice out directly,
    // variable items note which slot their payload belongs in.
    let mut items: Vec<&[u8]> = Vec::with_capacity(layouts.len());
    let mut slots: SmallVec8<usize> = SmallVec::new();
    let mut starts: SmallVec8<usize> = SmallVec::new();
    let mut cursor = 0;
    for layout in layouts {
        match layout {
            ItemLayout::Fixed(len) => {
                items.push(&bytes[cursor..cursor + len]);
                cursor += len;
            }
            ItemLayout::Variable => {
                slots.push(items.len());
                starts.push(offset_at(bytes, cursor)?);
                items.push(&[]);
                cursor += BYTES_PER_LENGTH_OFFSET;
            }
        }
    }

    if starts.is_empty() {
        if bytes.len() != fixed_len {
            return Err(DecodeError::InvalidByteLength {
                len: bytes.len(),
                expected: fixed_len,
            });
        }
        return Ok(items);
    }

    validate_offsets(&starts, fixed_len, bytes.len())?;
    for (k, &slot) in slots.iter().enumerate() {
        let end = starts.get(k + 1).copied().unwrap_or(bytes.len());
        items[slot] = &bytes[starts[k]..end];
    }
    Ok(items)
}

/// Split the encoding of a homogeneous sequence of variable-size items.
///
/// The item count is not encoded anywhere; it is recovered from the first
/// offset, which by construction equals the size of the offset table.
pub fn split_variable_length_items(bytes: &[u8]) -> Result<Vec<&[u8]>, DecodeError> {
    if bytes.is_empty() {
        return Ok(vec![]);
    }

    let table_len = offset_at(bytes, 0)?;
    if table_len == 0 || table_len % BYTES_PER_LENGTH_OFFSET != 0 {
        return Err(DecodeError::InvalidListFixedBytesLen(table_len));
    }

    let count = table_len / BYTES_PER_LENGTH_OFFSET;
    let mut starts = Vec::with_capacity(count);
    for i in 0..count {
        starts.push(offset_at(bytes, i * BYTES_PER_LENGTH_OFFSET)?);
    }
    validate_offsets(&starts, table_len, bytes.len())?;

    Ok(starts
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let end = starts.get(i + 1).copied().unwrap_or(bytes.len());
            &bytes[start..end]
        })
        .collect())
}

/// The little-endian offset stored at `pos`.
fn offset_at(bytes: &[u8], pos: usize) -> Result<usize, DecodeError> {
    let end = pos + BYTES_PER_LENGTH_OFFSET;
    let slice = bytes.get(pos..end).ok_or(DecodeError::InvalidByteLength {
        len: bytes.len(),
        expected: end,
    })?;
    let mut raw = [0; BYTES_PER_LENGTH_OFFSET];
    raw.copy_from_slice(slice);
    Ok(u32::from_le_bytes(raw) as usize)
}

/// The offset-table rules: the first offset lands exactly at `fixed_len`, the
/// rest never decrease, and none escapes `total_len`.
fn validate_offsets(
    offsets: &[usize],
    fixed_len: usize,
    total_len: usize,
) -> Result<(), DecodeError> {
    let mut previous: Option<usize> = None;
    for &offset in offsets {
        if previous.is_none() && offset < fixed_len {
            return Err(DecodeError::OffsetIntoFixedPortion(offset));
        }
        if previous.is_none() && offset > fixed_len {
            return Err(DecodeError::OffsetSkipsVariableBytes(offset));
        }
        if offset > total_len {
            return Err(DecodeError::OffsetOutOfBounds(offset));
        }
        if previous.map_or(false, |p| offset < p) {
            return Err(DecodeError::OffsetsAreDecreasing(offset));
        }
        previous = Some(offset);
    }
    Ok(())
}
