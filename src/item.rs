use byteorder::{LittleEndian, ReadBytesExt};

use crate::error::{KasError, Result};
use crate::types::ElementType;

/// A read-only, non-owning view over one item's array bytes.
///
/// Matches the (array_ref, array_len, type_code) triple returned by
/// [`crate::Store::get`]. The raw bytes are always available with no
/// copying; the typed accessors below decode on demand and are a
/// convenience, not the zero-copy path.
#[derive(Debug, Clone, Copy)]
pub struct ArrayView<'a> {
    bytes: &'a [u8],
    element_type: ElementType,
    len: u64,
}

impl<'a> ArrayView<'a> {
    pub(crate) fn new(bytes: &'a [u8], element_type: ElementType, len: u64) -> Self {
        debug_assert_eq!(bytes.len() as u64, len * element_type.width());
        Self {
            bytes,
            element_type,
            len,
        }
    }

    /// The raw, undecoded array bytes. Dereferencing a zero-length
    /// array's bytes is forbidden by the format contract even though the
    /// slice is technically valid (it is simply empty).
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    pub fn element_type(&self) -> ElementType {
        self.element_type
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Decode as `i8`. Fails with [`KasError::BadType`] if the item's
    /// element type is not `int8`.
    pub fn as_i8(&self) -> Result<Vec<i8>> {
        self.expect(ElementType::Int8)?;
        Ok(self.bytes.iter().map(|&b| b as i8).collect())
    }

    /// Decode as `u8`.
    pub fn as_u8(&self) -> Result<Vec<u8>> {
        self.expect(ElementType::Uint8)?;
        Ok(self.bytes.to_vec())
    }

    /// Decode as little-endian `i32`.
    pub fn as_i32(&self) -> Result<Vec<i32>> {
        self.expect(ElementType::Int32)?;
        self.decode_chunks(4, |mut c| c.read_i32::<LittleEndian>())
    }

    /// Decode as little-endian `u32`.
    pub fn as_u32(&self) -> Result<Vec<u32>> {
        self.expect(ElementType::Uint32)?;
        self.decode_chunks(4, |mut c| c.read_u32::<LittleEndian>())
    }

    /// Decode as little-endian `i64`.
    pub fn as_i64(&self) -> Result<Vec<i64>> {
        self.expect(ElementType::Int64)?;
        self.decode_chunks(8, |mut c| c.read_i64::<LittleEndian>())
    }

    /// Decode as little-endian `u64`.
    pub fn as_u64(&self) -> Result<Vec<u64>> {
        self.expect(ElementType::Uint64)?;
        self.decode_chunks(8, |mut c| c.read_u64::<LittleEndian>())
    }

    /// Decode as little-endian `f32`.
    pub fn as_f32(&self) -> Result<Vec<f32>> {
        self.expect(ElementType::Float32)?;
        self.decode_chunks(4, |mut c| c.read_f32::<LittleEndian>())
    }

    /// Decode as little-endian `f64`.
    pub fn as_f64(&self) -> Result<Vec<f64>> {
        self.expect(ElementType::Float64)?;
        self.decode_chunks(8, |mut c| c.read_f64::<LittleEndian>())
    }

    fn expect(&self, wanted: ElementType) -> Result<()> {
        if self.element_type == wanted {
            Ok(())
        } else {
            Err(KasError::BadType(self.element_type.code()))
        }
    }

    fn decode_chunks<T>(
        &self,
        width: usize,
        mut read_one: impl FnMut(&[u8]) -> std::io::Result<T>,
    ) -> Result<Vec<T>> {
        self.bytes
            .chunks_exact(width)
            .map(|chunk| read_one(chunk).map_err(KasError::Io))
            .collect()
    }
}

/// An in-memory (key, type, array) record, fully resolved: key and array
/// both borrowed from the store's buffer, offsets taken straight from
/// the descriptor table. This is what read mode holds and what `get`
/// hands back.
#[derive(Debug, Clone, Copy)]
pub struct Item<'a> {
    pub key: &'a [u8],
    pub element_type: ElementType,
    pub array: &'a [u8],
    pub array_len: u64,
    pub key_start: u64,
    pub array_start: u64,
}

impl<'a> Item<'a> {
    pub fn array_view(&self) -> ArrayView<'a> {
        ArrayView::new(self.array, self.element_type, self.array_len)
    }
}

/// A `put`-accumulated record, pending a write-mode `close`.
///
/// The key is privately owned (copied at `put` time, per the spec's
/// write-side key copy rule) so later caller mutation of their own
/// buffer cannot corrupt the file; the array is borrowed with a
/// lifetime the store shares, so it must outlive the store itself.
/// `key_start`/`array_start` are `0` until [`crate::packer::pack`]
/// assigns them at close time.
#[derive(Debug, Clone)]
pub struct PendingItem<'a> {
    pub key: Box<[u8]>,
    pub element_type: ElementType,
    pub array: &'a [u8],
    pub array_len: u64,
    pub key_start: u64,
    pub array_start: u64,
}

impl<'a> PendingItem<'a> {
    pub fn new(key: &[u8], element_type: ElementType, array: &'a [u8], array_len: u64) -> Self {
        Self {
            key: key.to_vec().into_boxed_slice(),
            element_type,
            array,
            array_len,
            key_start: 0,
            array_start: 0,
        }
    }
}

/// Total order used for both duplicate detection and the sorted
/// descriptor table: byte-wise comparison over the shorter of the two
/// keys, ties broken by shorter-key-first.
pub fn key_cmp(a: &[u8], b: &[u8]) -> std::cmp::Ordering {
    let n = a.len().min(b.len());
    match a[..n].cmp(&b[..n]) {
        std::cmp::Ordering::Equal => a.len().cmp(&b.len()),
        other => other,
    }
}
