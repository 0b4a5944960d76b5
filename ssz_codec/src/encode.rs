use crate::BYTES_PER_LENGTH_OFFSET;

/// Encode `len` as a little-endian offset, the form used throughout SSZ.
///
/// `len` must be representable in `BYTES_PER_LENGTH_OFFSET` bytes.
pub fn encode_length(len: usize) -> [u8; BYTES_PER_LENGTH_OFFSET] {
    debug_assert!(len <= crate::MAX_LENGTH_VALUE);
    (len as u32).to_le_bytes()
}

/// Assembles an SSZ composite in two passes: fixed bytes and offset
/// placeholders first, variable payloads appended on `finalize`.
///
/// ## Example
///
/// ```rust
/// use ssz_codec::SszEncoder;
///
/// let mut buf = vec![];
/// // One u16 field and one variable field: fixed section is 2 + 4 bytes.
/// let mut encoder = SszEncoder::container(&mut buf, 2 + 4);
/// encoder.append_fixed(&1u16.to_le_bytes());
/// encoder.append_variable(&[3, 4]);
/// encoder.finalize();
///
/// assert_eq!(buf, vec![1, 0, 6, 0, 0, 0, 3, 4]);
/// ```
pub struct SszEncoder<'a> {
    offset: usize,
    buf: &'a mut Vec<u8>,
    variable_bytes: Vec<u8>,
}

impl<'a> SszEncoder<'a> {
    /// Instantiate a new encoder for encoding a value with the given fixed
    /// section length (every fixed item's length plus an offset's width per
    /// variable item).
    pub fn container(buf: &'a mut Vec<u8>, num_fixed_bytes: usize) -> Self {
        buf.reserve(num_fixed_bytes);
        Self {
            offset: num_fixed_bytes,
            buf,
            variable_bytes: vec![],
        }
    }

    /// Append the encoding of a fixed-length item.
    pub fn append_fixed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Append the encoding of a variable-length item: its offset is written now,
    /// the payload when the encoder is finalized.
    pub fn append_variable(&mut self, bytes: &[u8]) {
        self.buf
            .extend_from_slice(&encode_length(self.offset + self.variable_bytes.len()));
        self.variable_bytes.extend_from_slice(bytes);
    }

    /// Write the variable payloads to `buf`, completing the serialization.
    pub fn finalize(&mut self) -> &mut Vec<u8> {
        self.buf.append(&mut self.variable_bytes);
        self.buf
    }
}
